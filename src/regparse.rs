// regparse.rs - Pattern parser.
// Converts ECMAScript-style pattern source into a RegExpTree.
//
// Structure: scanner helpers → escapes → character classes → quantifiers →
// atoms/terms → alternatives → entry points.

use smallvec::SmallVec;

use crate::error::RegexError;
use crate::regflags::RegExpFlag;
use crate::regint::*;
use crate::regparse_types::*;

// ============================================================================
// Parser state
// ============================================================================

struct Parser {
    pattern: Vec<char>,
    p: usize,
    depth: u32,
    capture_count: usize,
    /// Total number of capturing groups in the pattern, found by a pre-scan so
    /// that forward references like `\2(a)(b)` resolve.
    total_captures: usize,
    multiline: bool,
}

type ParseResult<T> = Result<T, RegexError>;

impl Parser {
    fn new(source: &str, flags: RegExpFlag) -> Parser {
        let pattern: Vec<char> = source.chars().collect();
        let total_captures = count_capture_groups(&pattern);
        Parser {
            pattern,
            p: 0,
            depth: 0,
            capture_count: 0,
            total_captures,
            multiline: flags.multiline(),
        }
    }

    #[inline]
    fn at_end(&self) -> bool {
        self.p >= self.pattern.len()
    }

    #[inline]
    fn peek(&self) -> Option<char> {
        self.pattern.get(self.p).copied()
    }

    #[inline]
    fn peek_at(&self, n: usize) -> Option<char> {
        self.pattern.get(self.p + n).copied()
    }

    fn fetch(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.p += 1;
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.p += 1;
            true
        } else {
            false
        }
    }

    fn error<T>(&self, message: &str) -> ParseResult<T> {
        Err(RegexError::syntax(self.p, message))
    }

    // ========================================================================
    // Number scanning
    // ========================================================================

    fn scan_decimal(&mut self) -> Option<u32> {
        let start = self.p;
        let mut value: u32 = 0;
        while let Some(d) = self.peek().and_then(|c| c.to_digit(10)) {
            value = value.saturating_mul(10).saturating_add(d);
            self.p += 1;
        }
        if self.p == start {
            None
        } else {
            Some(value)
        }
    }

    /// Exactly `n` hex digits, or nothing consumed.
    fn scan_hex(&mut self, n: usize) -> Option<u32> {
        let mut value = 0u32;
        for i in 0..n {
            let d = self.peek_at(i)?.to_digit(16)?;
            value = value * 16 + d;
        }
        self.p += n;
        Some(value)
    }

    fn scan_legacy_octal(&mut self) -> u32 {
        let mut value = 0u32;
        let mut len = 0;
        while let Some(d) = self.peek().and_then(|c| c.to_digit(8)) {
            if len == 3 || value * 8 + d > 0xFF {
                break;
            }
            value = value * 8 + d;
            self.p += 1;
            len += 1;
        }
        value
    }

    // ========================================================================
    // Escapes
    // ========================================================================

    /// Escapes valid both inside and outside classes that denote one unit.
    /// Called with `p` just past the backslash and the escape letter peeked.
    fn parse_char_escape(&mut self, in_class: bool) -> ParseResult<u32> {
        let Some(c) = self.fetch() else {
            return self.error("\\ at end of pattern");
        };
        let code = match c {
            'n' => 0x0A,
            'r' => 0x0D,
            't' => 0x09,
            'v' => 0x0B,
            'f' => 0x0C,
            'b' if in_class => 0x08,
            'c' => match self.peek() {
                Some(l) if l.is_ascii_alphabetic() => {
                    self.p += 1;
                    (l as u32) % 32
                }
                Some(l) if in_class && (l.is_ascii_digit() || l == '_') => {
                    self.p += 1;
                    (l as u32) % 32
                }
                _ => {
                    // `\c` without a control letter stands for a backslash
                    self.p -= 1;
                    '\\' as u32
                }
            },
            'x' => self.scan_hex(2).unwrap_or('x' as u32),
            'u' => self.scan_hex(4).unwrap_or('u' as u32),
            '0' if !self.peek().is_some_and(|d| d.is_ascii_digit()) => 0,
            '0'..='7' => {
                self.p -= 1;
                self.scan_legacy_octal()
            }
            other => other as u32,
        };
        Ok(code)
    }

    /// Class escapes `\d \D \w \W \s \S`, if the next char is one.
    fn parse_class_escape(&mut self) -> Option<ClassNode> {
        let (ranges, negate) = match self.peek()? {
            'd' => (DIGIT_RANGES, false),
            'D' => (DIGIT_RANGES, true),
            'w' => (WORD_RANGES, false),
            'W' => (WORD_RANGES, true),
            's' => (SPACE_RANGES, false),
            'S' => (SPACE_RANGES, true),
            _ => return None,
        };
        self.p += 1;
        let ranges = if negate {
            negate_ranges(ranges)
        } else {
            ranges.to_vec()
        };
        Some(ClassNode::new(ranges, false))
    }

    // ========================================================================
    // Character classes
    // ========================================================================

    fn parse_class(&mut self) -> ParseResult<Node> {
        // '[' already consumed
        let negate = self.eat('^');
        let mut ranges: Vec<(u32, u32)> = Vec::new();
        loop {
            if self.at_end() {
                return self.error("unterminated character class");
            }
            if self.eat(']') {
                break;
            }
            let lo = self.parse_class_atom()?;
            if self.peek() == Some('-') && self.peek_at(1).is_some_and(|c| c != ']') {
                self.p += 1;
                let hi = self.parse_class_atom()?;
                match (lo, hi) {
                    (ClassAtom::Unit(lo), ClassAtom::Unit(hi)) => {
                        if lo > hi {
                            return self.error("range out of order in character class");
                        }
                        ranges.push((lo, hi));
                    }
                    (lo, hi) => {
                        lo.add_to(&mut ranges);
                        ranges.push(('-' as u32, '-' as u32));
                        hi.add_to(&mut ranges);
                    }
                }
            } else {
                lo.add_to(&mut ranges);
            }
        }
        Ok(Node::Class(ClassNode::new(ranges, negate)))
    }

    fn parse_class_atom(&mut self) -> ParseResult<ClassAtom> {
        let Some(c) = self.fetch() else {
            return self.error("unterminated character class");
        };
        if c != '\\' {
            return Ok(ClassAtom::from_char(c));
        }
        if let Some(cc) = self.parse_class_escape() {
            return Ok(ClassAtom::Set(cc.ranges));
        }
        match self.peek() {
            Some('-') => {
                self.p += 1;
                Ok(ClassAtom::Unit('-' as u32))
            }
            Some(d @ ('8' | '9')) => {
                self.p += 1;
                Ok(ClassAtom::Unit(d as u32))
            }
            _ => self.parse_char_escape(true).map(ClassAtom::Unit),
        }
    }

    // ========================================================================
    // Quantifiers
    // ========================================================================

    /// Parse `{n}`, `{n,}` or `{n,m}` at `p`. Returns `None` (nothing
    /// consumed) if the brace does not start a valid quantifier.
    fn parse_interval(&mut self) -> ParseResult<Option<(u32, Option<u32>)>> {
        let save = self.p;
        if !self.eat('{') {
            return Ok(None);
        }
        let Some(lower) = self.scan_decimal() else {
            self.p = save;
            return Ok(None);
        };
        let upper = if self.eat(',') {
            self.scan_decimal()
        } else {
            Some(lower)
        };
        if !self.eat('}') {
            self.p = save;
            return Ok(None);
        }
        if let Some(upper) = upper {
            if upper < lower {
                self.p = save;
                return self.error("numbers out of order in {} quantifier");
            }
        }
        Ok(Some((lower, upper)))
    }

    fn parse_quantifier(&mut self) -> ParseResult<Option<(u32, Option<u32>)>> {
        let q = match self.peek() {
            Some('*') => {
                self.p += 1;
                Some((0, None))
            }
            Some('+') => {
                self.p += 1;
                Some((1, None))
            }
            Some('?') => {
                self.p += 1;
                Some((0, Some(1)))
            }
            Some('{') => self.parse_interval()?,
            _ => None,
        };
        Ok(q)
    }

    // ========================================================================
    // Terms and atoms
    // ========================================================================

    fn parse_term(&mut self, out: &mut SmallVec<[Node; 8]>) -> ParseResult<()> {
        let start = self.p;
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(()),
        };
        let atom = match c {
            '^' => {
                self.p += 1;
                out.push(Node::Assert(if self.multiline {
                    AssertKind::BeginLine
                } else {
                    AssertKind::BeginInput
                }));
                return Ok(());
            }
            '$' => {
                self.p += 1;
                out.push(Node::Assert(if self.multiline {
                    AssertKind::EndLine
                } else {
                    AssertKind::EndInput
                }));
                return Ok(());
            }
            '\\' if matches!(self.peek_at(1), Some('b') | Some('B')) => {
                let kind = if self.peek_at(1) == Some('b') {
                    AssertKind::WordBoundary
                } else {
                    AssertKind::NotWordBoundary
                };
                self.p += 2;
                out.push(Node::Assert(kind));
                return Ok(());
            }
            '*' | '+' | '?' => return self.error("nothing to repeat"),
            '{' => {
                if self.parse_interval()?.is_some() {
                    self.p = start;
                    return self.error("nothing to repeat");
                }
                self.p += 1;
                Node::Char('{' as u32)
            }
            ')' => return self.error("unmatched ) in pattern"),
            '|' => return Ok(()),
            _ => self.parse_atom(out)?,
        };

        let Some((lower, upper)) = self.parse_quantifier()? else {
            out.push(atom);
            return Ok(());
        };
        let greedy = !self.eat('?');
        out.push(Node::Quant(QuantNode {
            body: Box::new(atom),
            lower,
            upper,
            greedy,
        }));
        Ok(())
    }

    fn parse_atom(&mut self, out: &mut SmallVec<[Node; 8]>) -> ParseResult<Node> {
        let Some(c) = self.fetch() else {
            return self.error("unexpected end of pattern");
        };
        match c {
            '.' => Ok(Node::AnyChar),
            '(' => self.parse_group(),
            '[' => self.parse_class(),
            '\\' => self.parse_atom_escape(),
            c if (c as u32) > MAX_UNIT => {
                // astral char: two units, a quantifier binds to the second
                let (hi, lo) = split_surrogates(c as u32);
                out.push(Node::Char(hi));
                Ok(Node::Char(lo))
            }
            c => Ok(Node::Char(c as u32)),
        }
    }

    fn parse_atom_escape(&mut self) -> ParseResult<Node> {
        if self.at_end() {
            return self.error("\\ at end of pattern");
        }
        if let Some(cc) = self.parse_class_escape() {
            return Ok(Node::Class(cc));
        }
        if let Some(d) = self.peek().filter(|c| ('1'..='9').contains(c)) {
            let save = self.p;
            let n = self.scan_decimal().unwrap_or(0) as usize;
            if n <= self.total_captures {
                return Ok(Node::BackRef(n));
            }
            self.p = save;
            if d == '8' || d == '9' {
                self.p += 1;
                return Ok(Node::Char(d as u32));
            }
        }
        self.parse_char_escape(false).map(Node::Char)
    }

    fn parse_group(&mut self) -> ParseResult<Node> {
        // '(' already consumed
        let open = self.p - 1;
        self.depth += 1;
        if self.depth > DEFAULT_PARSE_DEPTH_LIMIT {
            return self.error("regular expression too deeply nested");
        }
        let node = if self.eat('?') {
            match self.fetch() {
                Some(':') => self.parse_disjunction()?,
                Some(kind @ ('=' | '!')) => Node::Look {
                    negate: kind == '!',
                    body: Box::new(self.parse_disjunction()?),
                },
                _ => {
                    self.p = open;
                    return self.error("invalid group");
                }
            }
        } else {
            self.capture_count += 1;
            let index = self.capture_count;
            Node::Capture {
                index,
                body: Box::new(self.parse_disjunction()?),
            }
        };
        if !self.eat(')') {
            return Err(RegexError::syntax(open, "missing ) in parenthetical"));
        }
        self.depth -= 1;
        Ok(node)
    }

    // ========================================================================
    // Alternatives
    // ========================================================================

    fn parse_alternative(&mut self) -> ParseResult<Node> {
        let mut items: SmallVec<[Node; 8]> = SmallVec::new();
        while let Some(c) = self.peek() {
            if c == '|' || c == ')' {
                break;
            }
            self.parse_term(&mut items)?;
        }
        Ok(match items.len() {
            0 => Node::Empty,
            1 => items.pop().unwrap_or(Node::Empty),
            _ => Node::List(items.into_vec()),
        })
    }

    fn parse_disjunction(&mut self) -> ParseResult<Node> {
        let mut alts: SmallVec<[Node; 4]> = SmallVec::new();
        alts.push(self.parse_alternative()?);
        while self.eat('|') {
            alts.push(self.parse_alternative()?);
        }
        Ok(if alts.len() == 1 {
            alts.pop().unwrap_or(Node::Empty)
        } else {
            Node::Alt(alts.into_vec())
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

enum ClassAtom {
    Unit(u32),
    Set(Vec<(u32, u32)>),
}

impl ClassAtom {
    fn from_char(c: char) -> ClassAtom {
        let code = c as u32;
        if code > MAX_UNIT {
            let (hi, lo) = split_surrogates(code);
            ClassAtom::Set(vec![(hi, hi), (lo, lo)])
        } else {
            ClassAtom::Unit(code)
        }
    }

    fn add_to(self, ranges: &mut Vec<(u32, u32)>) {
        match self {
            ClassAtom::Unit(c) => ranges.push((c, c)),
            ClassAtom::Set(set) => ranges.extend(set),
        }
    }
}

fn split_surrogates(code: u32) -> (u32, u32) {
    let v = code - 0x10000;
    (0xD800 + (v >> 10), 0xDC00 + (v & 0x3FF))
}

/// Count capturing groups: `(` not followed by `?`, outside classes, not
/// escaped.
fn count_capture_groups(pattern: &[char]) -> usize {
    let mut count = 0;
    let mut in_class = false;
    let mut i = 0;
    while i < pattern.len() {
        match pattern[i] {
            '\\' => i += 1,
            '[' => in_class = true,
            ']' => in_class = false,
            '(' if !in_class && pattern.get(i + 1) != Some(&'?') => count += 1,
            _ => {}
        }
        i += 1;
    }
    count
}

// ============================================================================
// Entry points
// ============================================================================

/// Parse `source` under `flags`. Only the multiline flag affects the tree
/// (`^`/`$` kinds); case folding is applied by the code generator.
pub fn parse(source: &str, flags: RegExpFlag) -> Result<RegExpTree, RegexError> {
    let mut parser = Parser::new(source, flags);
    let root = parser.parse_disjunction()?;
    if !parser.at_end() {
        // only a stray ')' stops the top-level disjunction early
        return parser.error("unmatched ) in pattern");
    }
    Ok(RegExpTree {
        root,
        capture_count: parser.capture_count,
    })
}

/// Syntax check only; the tree is discarded.
pub fn parse_pattern_syntax(source: &str) -> Result<(), RegexError> {
    parse(source, RegExpFlag::empty()).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(source: &str) -> RegExpTree {
        parse(source, RegExpFlag::empty()).unwrap()
    }

    fn err(source: &str) -> RegexError {
        parse(source, RegExpFlag::empty()).unwrap_err()
    }

    #[test]
    fn literal_sequence() {
        let t = tree("ab");
        assert_eq!(t.capture_count, 0);
        assert_eq!(t.root, Node::List(vec![Node::Char(0x61), Node::Char(0x62)]));
    }

    #[test]
    fn empty_pattern() {
        assert_eq!(tree("").root, Node::Empty);
        assert_eq!(tree("a|").root, Node::Alt(vec![Node::Char(0x61), Node::Empty]));
    }

    #[test]
    fn groups_are_counted() {
        let t = tree("(a)(?:b)(c(d))");
        assert_eq!(t.capture_count, 3);
    }

    #[test]
    fn quantifiers() {
        let t = tree("a{2,3}?");
        match t.root {
            Node::Quant(q) => {
                assert_eq!((q.lower, q.upper, q.greedy), (2, Some(3), false));
            }
            other => panic!("unexpected {:?}", other),
        }
        // brace that is not a quantifier is literal
        assert_eq!(
            tree("a{,2}").root,
            Node::List(vec![
                Node::Char('a' as u32),
                Node::Char('{' as u32),
                Node::Char(',' as u32),
                Node::Char('2' as u32),
                Node::Char('}' as u32),
            ])
        );
    }

    #[test]
    fn multiline_anchors() {
        let t = parse("^a$", RegExpFlag::MULTILINE).unwrap();
        assert_eq!(
            t.root,
            Node::List(vec![
                Node::Assert(AssertKind::BeginLine),
                Node::Char(0x61),
                Node::Assert(AssertKind::EndLine),
            ])
        );
    }

    #[test]
    fn class_with_escapes() {
        match tree(r"[a-c\d-]").root {
            Node::Class(cc) => {
                assert!(!cc.negate);
                assert_eq!(cc.ranges, vec![(0x2D, 0x2D), (0x30, 0x39), (0x61, 0x63)]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn backref_vs_octal() {
        assert_eq!(
            tree(r"(a)\1").root,
            Node::List(vec![
                Node::Capture {
                    index: 1,
                    body: Box::new(Node::Char(0x61))
                },
                Node::BackRef(1),
            ])
        );
        // no group 2: legacy octal escape
        assert_eq!(tree(r"\2").root, Node::Char(2));
        assert_eq!(tree(r"\0").root, Node::Char(0));
    }

    #[test]
    fn hex_and_unicode_escapes() {
        assert_eq!(tree(r"\x41").root, Node::Char(0x41));
        assert_eq!(tree(r"α").root, Node::Char(0x3B1));
        assert_eq!(tree(r"\cJ").root, Node::Char(0x0A));
    }

    #[test]
    fn syntax_errors() {
        assert!(matches!(err("(a"), RegexError::Syntax { offset: 0, .. }));
        assert!(matches!(err("a)"), RegexError::Syntax { .. }));
        assert!(matches!(err("*a"), RegexError::Syntax { .. }));
        assert!(matches!(err("[b-a]"), RegexError::Syntax { .. }));
        assert!(matches!(err("[abc"), RegexError::Syntax { .. }));
        assert!(matches!(err("a{3,1}"), RegexError::Syntax { .. }));
        assert!(matches!(err("(?<a)"), RegexError::Syntax { .. }));
        assert!(matches!(err("ab\\"), RegexError::Syntax { .. }));
    }

    #[test]
    fn syntax_check_only() {
        assert!(parse_pattern_syntax("a(b|c)*").is_ok());
        assert!(parse_pattern_syntax("a(b").is_err());
    }
}
