// regshared.rs - Shared pattern records and the execution engine.
//
// A RegExpShared is the compiled, cacheable form of one (source, flags)
// pair. Code is generated lazily, once per (mode, width) slot, and the
// record is reused by every value built from the same pattern.

use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::ops::Deref;
use std::rc::{Rc, Weak};

use memchr::memmem;

use crate::error::RegexError;
use crate::input::{CharWidth, Chars};
use crate::interrupt::{poll_interrupt, InterruptCallback, InterruptHandle, InterruptResult};
use crate::matchpairs::{MatchPair, MatchPairs};
use crate::regcomp::{CodeGenerator, RegExpCode};
use crate::regcompartment::{HeapState, Tracer};
use crate::regexec::{execute_bytecode, ExecLimits, ExecOutcome};
use crate::regflags::{regexp_to_string, RegExpFlag};
use crate::regint::*;
use crate::regnative::NativeRoutine;
use crate::regparse::parse;

/// Interned source text. Records and values share one allocation.
pub type Atom = Rc<str>;

/// Status of a completed execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegExpRunStatus {
    Success,
    NotFound,
}

/// Everything execution needs from the owning domain.
#[derive(Clone, Copy)]
pub struct ExecEnv<'a> {
    pub generator: &'a dyn CodeGenerator,
    pub limits: ExecLimits,
    pub interrupt: &'a InterruptHandle,
    pub callback: Option<&'a dyn InterruptCallback>,
}

// ============================================================================
// Literal fast path
// ============================================================================

/// Source text of a metachar-free pattern in both unit widths.
#[derive(Debug)]
struct LiteralPattern {
    /// `None` when the source has a char above U+00FF and so can never occur
    /// in narrow input.
    latin1: Option<Vec<u8>>,
    two_byte: Vec<u16>,
}

impl LiteralPattern {
    fn new(source: &str) -> LiteralPattern {
        let latin1 = if source.chars().all(|c| (c as u32) <= u8::MAX as u32) {
            Some(source.chars().map(|c| c as u8).collect())
        } else {
            None
        };
        LiteralPattern {
            latin1,
            two_byte: source.encode_utf16().collect(),
        }
    }

    fn len(&self) -> usize {
        self.two_byte.len()
    }

    /// Leftmost occurrence at or after `start`.
    fn find(&self, input: Chars<'_>, start: usize) -> Option<usize> {
        if start > input.len() {
            return None;
        }
        match input {
            Chars::Latin1(hay) => {
                let needle = self.latin1.as_deref()?;
                memmem::find(&hay[start..], needle).map(|i| start + i)
            }
            Chars::TwoByte(hay) => {
                let needle = &self.two_byte[..];
                if needle.is_empty() {
                    return Some(start);
                }
                hay[start..]
                    .windows(needle.len())
                    .position(|w| w == needle)
                    .map(|i| start + i)
            }
        }
    }

    fn heap_size(&self) -> usize {
        self.latin1.as_ref().map_or(0, Vec::capacity) + self.two_byte.capacity() * 2
    }
}

// ============================================================================
// RegExpShared
// ============================================================================

/// Compiled representation of one pattern.
///
/// Mutated only through interior cells: the capture count and code slots are
/// written during compilation, the mark bit by tracing and sweeping.
pub struct RegExpShared {
    source: Atom,
    flags: RegExpFlag,
    paren_count: Cell<usize>,
    literal: OnceCell<LiteralPattern>,
    compilation: [OnceCell<RegExpCode>; COMPILATION_SLOTS],
    marked: Cell<bool>,
    tables: RefCell<Vec<CharTable>>,
}

impl RegExpShared {
    pub(crate) fn new(source: Atom, flags: RegExpFlag) -> RegExpShared {
        RegExpShared {
            source,
            flags,
            paren_count: Cell::new(0),
            literal: OnceCell::new(),
            compilation: Default::default(),
            marked: Cell::new(false),
            tables: RefCell::new(Vec::new()),
        }
    }

    pub fn source(&self) -> &Atom {
        &self.source
    }

    pub fn flags(&self) -> RegExpFlag {
        self.flags
    }

    pub fn ignore_case(&self) -> bool {
        self.flags.ignore_case()
    }

    pub fn global(&self) -> bool {
        self.flags.global()
    }

    pub fn multiline(&self) -> bool {
        self.flags.multiline()
    }

    pub fn sticky(&self) -> bool {
        self.flags.sticky()
    }

    /// Capture groups, excluding the whole match. Zero until compiled.
    pub fn paren_count(&self) -> usize {
        self.paren_count.get()
    }

    pub fn pair_count(&self) -> usize {
        self.paren_count() + 1
    }

    /// True once compilation chose substring search over generated code.
    pub fn can_string_match(&self) -> bool {
        self.literal.get().is_some()
    }

    pub fn marked(&self) -> bool {
        self.marked.get()
    }

    pub fn mark(&self) {
        self.marked.set(true);
    }

    pub fn clear_marked(&self) {
        self.marked.set(false);
    }

    /// Whether the pattern qualifies for the literal fast path: no regex
    /// metacharacters, not case-insensitive, not sticky.
    pub fn is_literal_eligible(&self) -> bool {
        !self.ignore_case() && !self.sticky() && !string_has_regexp_meta_chars(&self.source)
    }

    pub fn is_compiled(&self, mode: CompilationMode, width: CharWidth) -> bool {
        self.can_string_match() || self.compilation[compilation_index(mode, width)].get().is_some()
    }

    /// Compiled code for a slot, if generated.
    pub fn code(&self, mode: CompilationMode, width: CharWidth) -> Option<&RegExpCode> {
        self.compilation[compilation_index(mode, width)].get()
    }

    /// Native code held by a slot, if that slot compiled to the native tier.
    pub fn native_code(&self, mode: CompilationMode, width: CharWidth) -> Option<&dyn NativeRoutine> {
        match self.code(mode, width)? {
            RegExpCode::Native(routine) => Some(routine.as_ref()),
            RegExpCode::ByteCode(_) => None,
        }
    }

    fn native_codes(&self) -> impl Iterator<Item = &dyn NativeRoutine> {
        self.compilation.iter().filter_map(|slot| match slot.get()? {
            RegExpCode::Native(routine) => Some(routine.as_ref()),
            RegExpCode::ByteCode(_) => None,
        })
    }

    // ========================================================================
    // Compilation
    // ========================================================================

    /// Compile the (mode, width) slot.
    ///
    /// Literal-eligible patterns take the substring path instead and never
    /// populate a slot. Failure leaves the slot empty; retrying fails the
    /// same way.
    pub fn compile(
        &self,
        mode: CompilationMode,
        width: CharWidth,
        generator: &dyn CodeGenerator,
    ) -> Result<(), RegexError> {
        if self.can_string_match() {
            return Ok(());
        }
        if self.is_literal_eligible() {
            self.paren_count.set(0);
            let _ = self.literal.set(LiteralPattern::new(&self.source));
            log::debug!("regexp /{}/ uses substring search", self.source);
            return Ok(());
        }

        let mut tree = parse(&self.source, self.flags)?;
        if self.sticky() {
            tree = tree.anchor_at_start();
        }

        let code = {
            let mut tables = self.tables.borrow_mut();
            generator.generate_code(&tree, mode, width, self.flags, &mut tables)?
        };
        log::debug!(
            "compiled {} for {:?}/{:?} ({} groups, {})",
            regexp_to_string(&self.source, self.flags),
            mode,
            width,
            tree.capture_count,
            if code.is_native() { "native" } else { "bytecode" }
        );
        self.paren_count.set(tree.capture_count);
        // the slot was empty on entry and nothing compiles re-entrantly
        let _ = self.compilation[compilation_index(mode, width)].set(code);
        Ok(())
    }

    pub fn compile_if_necessary(
        &self,
        mode: CompilationMode,
        width: CharWidth,
        generator: &dyn CodeGenerator,
    ) -> Result<(), RegexError> {
        if self.is_compiled(mode, width) {
            return Ok(());
        }
        self.compile(mode, width, generator)
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Search `input` from `start`.
    ///
    /// With `matches`, the buffer is sized to `pair_count()` and filled with
    /// offsets relative to `input` on success; without it only the status is
    /// produced. Sticky patterns match only at `start`.
    pub fn execute(
        &self,
        env: &ExecEnv<'_>,
        input: Chars<'_>,
        start: usize,
        mut matches: Option<&mut dyn MatchPairs>,
    ) -> Result<RegExpRunStatus, RegexError> {
        let mode = if matches.is_some() {
            CompilationMode::Normal
        } else {
            CompilationMode::MatchOnly
        };
        let width = input.width();
        self.compile_if_necessary(mode, width, env.generator)?;

        let length = input.len();
        check_input_bounds(length, start)?;

        // sticky: search a view that begins at `start`, then shift results back
        let (chars, displacement) = if self.sticky() {
            (input.slice_from(start), start)
        } else {
            (input, 0)
        };
        let search_start = start - displacement;

        if let Some(m) = matches.as_deref_mut() {
            m.init_array(self.pair_count())?;
        }

        if let Some(literal) = self.literal.get() {
            let Some(found) = literal.find(chars, search_start) else {
                return Ok(RegExpRunStatus::NotFound);
            };
            if let Some(m) = matches.as_deref_mut() {
                m.pairs_mut()[0] = MatchPair::new(found as i32, (found + literal.len()) as i32);
            }
        } else {
            let code = self.code(mode, width).ok_or_else(|| RegexError::InternalBug {
                message: "code slot empty after compilation".to_string(),
            })?;
            loop {
                let pairs = matches.as_deref_mut().map(|m| m.pairs_mut());
                let outcome = match code {
                    RegExpCode::ByteCode(bytecode) => {
                        let tables = self.tables.borrow();
                        execute_bytecode(
                            bytecode,
                            &tables,
                            chars,
                            search_start,
                            pairs,
                            env.limits,
                            env.interrupt,
                        )
                    }
                    RegExpCode::Native(routine) => {
                        routine.execute(chars, search_start, pairs, env.interrupt)
                    }
                };
                match outcome {
                    ExecOutcome::Matched => break,
                    ExecOutcome::NoMatch => return Ok(RegExpRunStatus::NotFound),
                    ExecOutcome::Interrupted => match poll_interrupt(env.interrupt, env.callback) {
                        InterruptResult::Continue => {
                            log::debug!("regexp /{}/ interrupted, retrying", self.source);
                        }
                        InterruptResult::Abort => return Err(RegexError::Interrupted),
                    },
                    ExecOutcome::Error(err) => return Err(err),
                }
            }
        }

        if let Some(m) = matches {
            m.displace(displacement);
            if !m.check_against(length) {
                debug_assert!(false, "match offsets outside input of length {}", length);
                log::error!(
                    "regexp /{}/ produced offsets outside input of length {}",
                    self.source,
                    length
                );
                return Err(RegexError::InternalBug {
                    message: "match offsets out of bounds".to_string(),
                });
            }
        }
        Ok(RegExpRunStatus::Success)
    }

    // ========================================================================
    // Tracing and sweeping
    // ========================================================================

    /// Report the record's references. A marking tracer also sets the mark
    /// bit read by the next sweep.
    pub fn trace(&self, tracer: &mut dyn Tracer) {
        if tracer.is_marking() {
            self.marked.set(true);
        }
        tracer.trace_atom(&self.source);
        for routine in self.native_codes() {
            tracer.trace_code(routine);
        }
    }

    /// Whether a sweep under `heap` keeps this record on its own merits.
    pub(crate) fn survives_sweep(&self, heap: &dyn HeapState) -> bool {
        if heap.is_compacting() {
            return true;
        }
        self.marked()
            && !heap.is_atom_about_to_be_finalized(&self.source)
            && !self
                .native_codes()
                .any(|routine| heap.is_code_about_to_be_finalized(routine))
    }

    /// Bytes owned by the record, itself included.
    pub fn size_of_including_this(&self) -> usize {
        let code: usize = self
            .compilation
            .iter()
            .filter_map(OnceCell::get)
            .map(RegExpCode::heap_size)
            .sum();
        let tables = self.tables.borrow();
        let table_bytes: usize = tables.capacity() * std::mem::size_of::<CharTable>()
            + tables.iter().map(CharTable::heap_size).sum::<usize>();
        std::mem::size_of::<RegExpShared>()
            + code
            + table_bytes
            + self.literal.get().map_or(0, LiteralPattern::heap_size)
    }
}

impl fmt::Debug for RegExpShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegExpShared")
            .field("source", &self.source)
            .field("flags", &self.flags)
            .field("paren_count", &self.paren_count.get())
            .field("can_string_match", &self.can_string_match())
            .field("marked", &self.marked.get())
            .finish()
    }
}

// ============================================================================
// RegExpGuard
// ============================================================================

/// Rooted handle to a record.
///
/// While any guard is alive the record survives sweeps, so execution that
/// holds a guard can never see its record destroyed underneath it.
#[derive(Clone, Debug)]
pub struct RegExpGuard {
    shared: Rc<RegExpShared>,
}

impl RegExpGuard {
    pub(crate) fn new(shared: Rc<RegExpShared>) -> RegExpGuard {
        RegExpGuard { shared }
    }

    /// Non-owning link for values that refer to the record.
    pub fn downgrade(&self) -> Weak<RegExpShared> {
        Rc::downgrade(&self.shared)
    }

    /// Whether two guards root the same record.
    pub fn ptr_eq(&self, other: &RegExpGuard) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }

    pub(crate) fn from_weak(weak: &Weak<RegExpShared>) -> Option<RegExpGuard> {
        weak.upgrade().map(RegExpGuard::new)
    }
}

impl Deref for RegExpGuard {
    type Target = RegExpShared;

    fn deref(&self) -> &RegExpShared {
        &self.shared
    }
}

/// Match offsets are stored as `i32`, so longer inputs are refused.
fn check_input_bounds(length: usize, start: usize) -> Result<(), RegexError> {
    if length > MAX_INPUT_LEN {
        return Err(RegexError::InvalidArgument("input longer than i32::MAX units"));
    }
    if start > length {
        return Err(RegexError::InvalidArgument("start offset past end of input"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::LinearString;
    use crate::matchpairs::{ScopedMatchPairs, VectorMatchPairs};
    use crate::regcomp::DefaultCodeGenerator;

    fn record(source: &str, flags: RegExpFlag) -> RegExpShared {
        RegExpShared::new(Atom::from(source), flags)
    }

    fn env<'a>(gen: &'a DefaultCodeGenerator, handle: &'a InterruptHandle) -> ExecEnv<'a> {
        ExecEnv {
            generator: gen,
            limits: ExecLimits::default(),
            interrupt: handle,
            callback: None,
        }
    }

    #[test]
    fn literal_path_is_chosen() {
        let gen = DefaultCodeGenerator::default();
        let shared = record("abc", RegExpFlag::empty());
        shared.compile(CompilationMode::Normal, CharWidth::Latin1, &gen).unwrap();
        assert!(shared.can_string_match());
        assert_eq!(shared.paren_count(), 0);
        assert!(shared.code(CompilationMode::Normal, CharWidth::Latin1).is_none());
        assert!(shared.is_compiled(CompilationMode::MatchOnly, CharWidth::TwoByte));
    }

    #[test]
    fn ignore_case_is_not_literal() {
        let gen = DefaultCodeGenerator::default();
        let shared = record("abc", RegExpFlag::IGNORE_CASE);
        assert!(!shared.is_literal_eligible());
        shared.compile(CompilationMode::Normal, CharWidth::Latin1, &gen).unwrap();
        assert!(!shared.can_string_match());
        assert!(shared.code(CompilationMode::Normal, CharWidth::Latin1).is_some());
        assert!(shared.code(CompilationMode::Normal, CharWidth::TwoByte).is_none());
    }

    #[test]
    fn literal_search_both_widths() {
        let gen = DefaultCodeGenerator::default();
        let handle = InterruptHandle::new();
        let shared = record("abc", RegExpFlag::empty());
        for text in [LinearString::from("xxabcxx"), LinearString::from_str_two_byte("xxabcxx")] {
            let mut pairs = VectorMatchPairs::new();
            let status = shared
                .execute(&env(&gen, &handle), text.chars(), 0, Some(&mut pairs))
                .unwrap();
            assert_eq!(status, RegExpRunStatus::Success);
            assert_eq!(pairs.get(0), MatchPair::new(2, 5));
        }
    }

    #[test]
    fn sticky_displacement() {
        let gen = DefaultCodeGenerator::default();
        let handle = InterruptHandle::new();
        let shared = record("a", RegExpFlag::STICKY);
        let text = LinearString::from("xxa");
        let mut pairs = ScopedMatchPairs::new();
        let status = shared
            .execute(&env(&gen, &handle), text.chars(), 2, Some(&mut pairs))
            .unwrap();
        assert_eq!(status, RegExpRunStatus::Success);
        assert_eq!(pairs.get(0), MatchPair::new(2, 3));

        let status = shared
            .execute(&env(&gen, &handle), text.chars(), 0, None)
            .unwrap();
        assert_eq!(status, RegExpRunStatus::NotFound);
    }

    #[test]
    fn compile_error_surfaces_every_time() {
        let gen = DefaultCodeGenerator::default();
        let handle = InterruptHandle::new();
        let shared = record("a(", RegExpFlag::empty());
        let text = LinearString::from("a(");
        for _ in 0..2 {
            let err = shared
                .execute(&env(&gen, &handle), text.chars(), 0, None)
                .unwrap_err();
            assert!(err.is_compile_error());
        }
        assert!(!shared.is_compiled(CompilationMode::MatchOnly, CharWidth::Latin1));
    }

    #[test]
    fn start_past_end_is_rejected() {
        let gen = DefaultCodeGenerator::default();
        let handle = InterruptHandle::new();
        let shared = record("a+", RegExpFlag::empty());
        let text = LinearString::from("aa");
        let err = shared
            .execute(&env(&gen, &handle), text.chars(), 3, None)
            .unwrap_err();
        assert!(matches!(err, RegexError::InvalidArgument(_)));
    }

    #[test]
    fn oversized_input_is_rejected() {
        assert!(check_input_bounds(MAX_INPUT_LEN, 0).is_ok());
        assert_eq!(
            check_input_bounds(MAX_INPUT_LEN + 1, 0),
            Err(RegexError::InvalidArgument("input longer than i32::MAX units"))
        );
    }

    #[test]
    fn size_grows_with_code() {
        let gen = DefaultCodeGenerator::default();
        let shared = record("[a-z]+(\\d)", RegExpFlag::empty());
        let before = shared.size_of_including_this();
        shared.compile(CompilationMode::Normal, CharWidth::Latin1, &gen).unwrap();
        assert!(shared.size_of_including_this() > before);
    }
}
