// api.rs - Idiomatic Rust API for Ferrexp.
//
// Result views (Match, Captures, MatchResult) over the engine's capture
// buffers, the match-result template, and a self-contained Regex wrapper
// that owns its own execution domain.

use std::borrow::Cow;
use std::ops::Range;
use std::rc::Rc;

use crate::error::RegexError;
use crate::input::{Chars, LinearString};
use crate::matchpairs::{MatchPair, VectorMatchPairs};
use crate::regflags::{parse_regexp_flags, regexp_to_string, RegExpFlag};
use crate::regparse::parse;
use crate::regshared::{RegExpGuard, RegExpRunStatus};
use crate::runtime::{RegExpRuntime, RuntimeOptions};

// === MatchResultTemplate ===

pub const MATCH_RESULT_INDEX_SLOT: usize = 0;
pub const MATCH_RESULT_INPUT_SLOT: usize = 1;

/// Shape shared by every match result of a domain: the named fields, in
/// slot order. Carries no pattern-specific data.
#[derive(Debug, PartialEq, Eq)]
pub struct MatchResultTemplate {
    fields: [&'static str; 2],
}

impl MatchResultTemplate {
    pub fn new() -> Self {
        MatchResultTemplate {
            fields: ["index", "input"],
        }
    }

    pub fn fields(&self) -> &[&'static str] {
        &self.fields
    }

    /// Slot of the field called `name`.
    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| *f == name)
    }
}

impl Default for MatchResultTemplate {
    fn default() -> Self {
        Self::new()
    }
}

// === Match ===

/// One capture's span within the searched input. Offsets are code units.
#[derive(Debug, Clone, Copy)]
pub struct Match<'t> {
    input: Chars<'t>,
    start: usize,
    end: usize,
}

impl<'t> Match<'t> {
    fn from_pair(input: Chars<'t>, pair: MatchPair) -> Option<Match<'t>> {
        if pair.is_undefined() {
            return None;
        }
        Some(Match {
            input,
            start: pair.start as usize,
            end: pair.limit as usize,
        })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The matched text. Unpaired surrogates become U+FFFD.
    pub fn to_string_lossy(&self) -> String {
        self.input.to_string_lossy(self.start, self.end)
    }
}

// === Captures ===

/// All capture groups of one match. Group 0 is the whole match.
#[derive(Clone)]
pub struct Captures<'t> {
    input: Chars<'t>,
    pairs: Cow<'t, [MatchPair]>,
}

impl<'t> Captures<'t> {
    /// Group `i`, or `None` if it did not participate.
    pub fn get(&self, i: usize) -> Option<Match<'t>> {
        let pair = *self.pairs.get(i)?;
        Match::from_pair(self.input, pair)
    }

    /// Number of groups, including group 0.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> CapturesIter<'_, 't> {
        CapturesIter {
            captures: self,
            index: 0,
        }
    }

    pub fn pairs(&self) -> &[MatchPair] {
        &self.pairs
    }
}

impl std::fmt::Debug for Captures<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_list();
        for m in self.iter() {
            list.entry(&m.map(|m| m.range()));
        }
        list.finish()
    }
}

/// Iterator over the groups of a [`Captures`].
pub struct CapturesIter<'c, 't> {
    captures: &'c Captures<'t>,
    index: usize,
}

impl<'t> Iterator for CapturesIter<'_, 't> {
    type Item = Option<Match<'t>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.captures.len() {
            return None;
        }
        let m = self.captures.get(self.index);
        self.index += 1;
        Some(m)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.captures.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CapturesIter<'_, '_> {}

// === MatchResult ===

/// Value of one template field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResultField<'a> {
    Index(usize),
    Input(&'a LinearString),
}

/// Owned result of `RegExpObject::exec`: the template-described fields plus
/// every capture.
#[derive(Debug, Clone)]
pub struct MatchResult {
    template: Rc<MatchResultTemplate>,
    input: LinearString,
    pairs: Vec<MatchPair>,
}

impl MatchResult {
    pub(crate) fn new(template: Rc<MatchResultTemplate>, input: LinearString, pairs: Vec<MatchPair>) -> Self {
        debug_assert!(!pairs.is_empty() && !pairs[0].is_undefined());
        MatchResult {
            template,
            input,
            pairs,
        }
    }

    /// Offset where the whole match starts.
    pub fn index(&self) -> usize {
        self.pairs[0].start as usize
    }

    pub fn input(&self) -> &LinearString {
        &self.input
    }

    pub fn template(&self) -> &MatchResultTemplate {
        &self.template
    }

    /// Look up a template field by name.
    pub fn field(&self, name: &str) -> Option<MatchResultField<'_>> {
        match self.template.slot_of(name)? {
            MATCH_RESULT_INDEX_SLOT => Some(MatchResultField::Index(self.index())),
            MATCH_RESULT_INPUT_SLOT => Some(MatchResultField::Input(&self.input)),
            _ => None,
        }
    }

    pub fn captures(&self) -> Captures<'_> {
        Captures {
            input: self.input.chars(),
            pairs: Cow::Borrowed(&self.pairs),
        }
    }

    pub fn get(&self, i: usize) -> Option<Match<'_>> {
        Match::from_pair(self.input.chars(), *self.pairs.get(i)?)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

// === Regex ===

/// A compiled pattern with its own execution domain.
///
/// # Examples
///
/// ```
/// use ferrexp::api::Regex;
/// use ferrexp::input::LinearString;
///
/// let re = Regex::new(r"\d+").unwrap();
/// let text = LinearString::from("hello 42");
/// let m = re.find(&text).unwrap().unwrap();
/// assert_eq!(m.range(), 6..8);
/// assert_eq!(m.to_string_lossy(), "42");
/// ```
pub struct Regex {
    guard: RegExpGuard,
    capture_count: usize,
    runtime: RegExpRuntime,
}

impl Regex {
    pub fn new(pattern: &str) -> Result<Regex, RegexError> {
        RegexBuilder::new(pattern).build()
    }

    /// Compile with a flag string such as `"im"`.
    pub fn with_flags(pattern: &str, flags: &str) -> Result<Regex, RegexError> {
        let flags = parse_regexp_flags(flags)?;
        RegexBuilder::new(pattern).flags(flags).build()
    }

    pub fn builder(pattern: &str) -> RegexBuilder {
        RegexBuilder::new(pattern)
    }

    pub fn source(&self) -> &str {
        self.guard.source()
    }

    pub fn flags(&self) -> RegExpFlag {
        self.guard.flags()
    }

    /// Number of capture groups, excluding group 0.
    pub fn captures_len(&self) -> usize {
        self.capture_count
    }

    fn search_at<'t>(
        &self,
        text: &'t LinearString,
        start: usize,
    ) -> Result<Option<Captures<'t>>, RegexError> {
        let mut pairs = VectorMatchPairs::new();
        match self
            .runtime
            .execute(&self.guard, text.chars(), start, Some(&mut pairs))?
        {
            RegExpRunStatus::NotFound => Ok(None),
            RegExpRunStatus::Success => Ok(Some(Captures {
                input: text.chars(),
                pairs: Cow::Owned(pairs.into_vec()),
            })),
        }
    }

    pub fn is_match(&self, text: &LinearString) -> Result<bool, RegexError> {
        let status = self.runtime.execute(&self.guard, text.chars(), 0, None)?;
        Ok(status == RegExpRunStatus::Success)
    }

    /// Leftmost match in `text`.
    pub fn find<'t>(&self, text: &'t LinearString) -> Result<Option<Match<'t>>, RegexError> {
        Ok(self.search_at(text, 0)?.and_then(|caps| caps.get(0)))
    }

    /// Leftmost match in `text` with all capture groups.
    pub fn captures<'t>(&self, text: &'t LinearString) -> Result<Option<Captures<'t>>, RegexError> {
        self.search_at(text, 0)
    }

    /// Successive matches; an empty match advances the search by one unit.
    pub fn find_iter<'r, 't>(&'r self, text: &'t LinearString) -> FindIter<'r, 't> {
        FindIter {
            regex: self,
            text,
            last_end: 0,
            done: false,
        }
    }

    /// The underlying execution domain.
    pub fn runtime(&self) -> &RegExpRuntime {
        &self.runtime
    }
}

impl std::fmt::Display for Regex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&regexp_to_string(self.source(), self.flags()))
    }
}

impl std::fmt::Debug for Regex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Regex")
            .field("source", &self.source())
            .field("flags", &self.flags())
            .finish_non_exhaustive()
    }
}

// === RegexBuilder ===

/// Builder for a [`Regex`] with explicit flags and runtime options.
///
/// # Examples
///
/// ```
/// use ferrexp::api::Regex;
/// use ferrexp::input::LinearString;
///
/// let re = Regex::builder("hello world")
///     .case_insensitive(true)
///     .build()
///     .unwrap();
/// assert!(re.is_match(&LinearString::from("Hello World")).unwrap());
/// ```
pub struct RegexBuilder {
    pattern: String,
    flags: RegExpFlag,
    options: RuntimeOptions,
}

impl RegexBuilder {
    pub fn new(pattern: &str) -> Self {
        RegexBuilder {
            pattern: pattern.to_string(),
            flags: RegExpFlag::empty(),
            options: RuntimeOptions::default(),
        }
    }

    pub fn flags(mut self, flags: RegExpFlag) -> Self {
        self.flags = flags;
        self
    }

    pub fn case_insensitive(mut self, yes: bool) -> Self {
        self.flags.set(RegExpFlag::IGNORE_CASE, yes);
        self
    }

    /// `^` and `$` match at line boundaries.
    pub fn multi_line(mut self, yes: bool) -> Self {
        self.flags.set(RegExpFlag::MULTILINE, yes);
        self
    }

    pub fn sticky(mut self, yes: bool) -> Self {
        self.flags.set(RegExpFlag::STICKY, yes);
        self
    }

    pub fn options(mut self, options: RuntimeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn backtrack_limit(mut self, limit: usize) -> Self {
        self.options.backtrack_limit = limit;
        self
    }

    /// Check the pattern and set up its domain. Code is generated on first
    /// use.
    pub fn build(self) -> Result<Regex, RegexError> {
        let tree = parse(&self.pattern, self.flags)?;
        let mut runtime = RegExpRuntime::with_options(self.options);
        let guard = runtime.get_shared(&self.pattern, self.flags);
        Ok(Regex {
            guard,
            capture_count: tree.capture_count,
            runtime,
        })
    }
}

// === FindIter ===

/// Iterator over successive matches in a text.
pub struct FindIter<'r, 't> {
    regex: &'r Regex,
    text: &'t LinearString,
    last_end: usize,
    done: bool,
}

impl<'t> Iterator for FindIter<'_, 't> {
    type Item = Result<Match<'t>, RegexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.last_end > self.text.len() {
            return None;
        }
        let found = match self.regex.search_at(self.text, self.last_end) {
            Ok(found) => found.and_then(|caps| caps.get(0)),
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };
        let Some(m) = found else {
            self.done = true;
            return None;
        };
        self.last_end = if m.is_empty() { m.end() + 1 } else { m.end() };
        Some(Ok(m))
    }
}
