// regint.rs - Internal types shared by compiler and executors.
// Config constants, BitSet, CharTable, Operation (bytecode), ByteCode,
// character predicates and case canonicalization.

use crate::input::CharWidth;

// === Config Constants ===
pub const DEFAULT_BACKTRACK_LIMIT: usize = 1 << 20;
pub const DEFAULT_MAX_PROGRAM_LEN: usize = 1 << 16;
pub const DEFAULT_INTERRUPT_CHECK_INTERVAL: u32 = 1 << 12;
pub const INIT_MATCH_STACK_SIZE: usize = 64;
pub const DEFAULT_PARSE_DEPTH_LIMIT: u32 = 256;
/// Longest input in code units; match offsets are `i32`.
pub const MAX_INPUT_LEN: usize = i32::MAX as usize;

// === Regex meta characters (literal fast path eligibility) ===
pub const META_CHARS: &[char] = &[
    '^', '$', '\\', '.', '*', '+', '?', '(', ')', '[', ']', '{', '}', '|',
];

/// True if `source` contains any character with regex meaning.
pub fn string_has_regexp_meta_chars(source: &str) -> bool {
    source.chars().any(|c| META_CHARS.contains(&c))
}

// === Compilation Mode ===

/// Whether captures are produced by the compiled code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompilationMode {
    /// Full capture extraction.
    Normal,
    /// Boolean result only.
    MatchOnly,
}

impl CompilationMode {
    pub(crate) fn index(self) -> usize {
        match self {
            CompilationMode::Normal => 0,
            CompilationMode::MatchOnly => 1,
        }
    }
}

/// Index of the code slot for a (mode, width) pair.
#[inline]
pub fn compilation_index(mode: CompilationMode, width: CharWidth) -> usize {
    mode.index() * 2 + width.index()
}

pub const COMPILATION_SLOTS: usize = 4;

// === BitSet (256 bits for Latin-1 character classes) ===
pub const SINGLE_BYTE_SIZE: usize = 256;
pub const BITS_IN_ROOM: usize = 32;
pub const BITSET_REAL_SIZE: usize = SINGLE_BYTE_SIZE / BITS_IN_ROOM;
pub type Bits = u32;
pub type BitSet = [Bits; BITSET_REAL_SIZE];

#[inline]
pub fn bs_room(pos: usize) -> usize {
    pos >> 5
}

#[inline]
pub fn bs_bit(pos: usize) -> u32 {
    1u32 << (pos & 0x1f)
}

#[inline]
pub fn bitset_at(bs: &BitSet, pos: usize) -> bool {
    (bs[bs_room(pos)] & bs_bit(pos)) != 0
}

#[inline]
pub fn bitset_set_bit(bs: &mut BitSet, pos: usize) {
    bs[bs_room(pos)] |= bs_bit(pos);
}

pub fn bitset_set_range(bs: &mut BitSet, from: usize, to: usize) {
    for pos in from..=to.min(SINGLE_BYTE_SIZE - 1) {
        bitset_set_bit(bs, pos);
    }
}

// === CharTable ===

/// Compiled character class: a bitset for units below 256 plus sorted,
/// non-overlapping ranges for everything above.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CharTable {
    pub bits: BitSet,
    pub ranges: Vec<(u32, u32)>,
}

impl CharTable {
    /// Build a table from inclusive ranges. With `narrow`, ranges above 0xFF
    /// are dropped since no Latin-1 unit can reach them.
    pub fn from_ranges(ranges: &[(u32, u32)], narrow: bool) -> CharTable {
        let mut bits: BitSet = [0; BITSET_REAL_SIZE];
        let mut wide = Vec::new();
        for &(lo, hi) in ranges {
            if (lo as usize) < SINGLE_BYTE_SIZE {
                bitset_set_range(&mut bits, lo as usize, hi as usize);
            }
            if !narrow && hi as usize >= SINGLE_BYTE_SIZE {
                wide.push((lo.max(SINGLE_BYTE_SIZE as u32), hi));
            }
        }
        wide.sort_unstable();
        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(wide.len());
        for (lo, hi) in wide {
            match merged.last_mut() {
                Some(last) if lo <= last.1.saturating_add(1) => last.1 = last.1.max(hi),
                _ => merged.push((lo, hi)),
            }
        }
        CharTable { bits, ranges: merged }
    }

    #[inline]
    pub fn contains(&self, c: u32) -> bool {
        if (c as usize) < SINGLE_BYTE_SIZE {
            return bitset_at(&self.bits, c as usize);
        }
        self.ranges
            .binary_search_by(|&(lo, hi)| {
                if hi < c {
                    std::cmp::Ordering::Less
                } else if lo > c {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Build a case-folding table holding the canonical form of every
    /// member. Query it with `contains_ic`.
    pub fn from_ranges_ic(ranges: &[(u32, u32)]) -> CharTable {
        let mut units: Vec<u32> = ranges
            .iter()
            .flat_map(|&(lo, hi)| lo..=hi.min(MAX_UNIT))
            .map(canonicalize)
            .collect();
        units.sort_unstable();
        units.dedup();
        let mut folded: Vec<(u32, u32)> = Vec::new();
        for u in units {
            match folded.last_mut() {
                Some(last) if u == last.1 + 1 => last.1 = u,
                _ => folded.push((u, u)),
            }
        }
        CharTable::from_ranges(&folded, false)
    }

    /// Membership under case folding. Only valid on tables built by
    /// `from_ranges_ic`.
    #[inline]
    pub fn contains_ic(&self, c: u32) -> bool {
        self.contains(canonicalize(c))
    }

    pub fn heap_size(&self) -> usize {
        self.ranges.capacity() * std::mem::size_of::<(u32, u32)>()
    }
}

// === Operation (Bytecode Instruction) ===

/// Anchor/assertion kinds shared by the bytecode and the native tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssertKind {
    /// `^` without multiline, or the sticky wrapper.
    BeginInput,
    /// `$` without multiline.
    EndInput,
    /// `^` with multiline.
    BeginLine,
    /// `$` with multiline.
    EndLine,
    WordBoundary,
    NotWordBoundary,
}

/// One bytecode instruction. Jump targets are absolute op indices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Successful match.
    End,
    /// Match one unit exactly.
    Char(u32),
    /// Match one unit whose canonical form equals the operand.
    CharIc(u32),
    /// Any unit except a line terminator.
    AnyChar,
    /// Unit contained (or, negated, not contained) in table `table`.
    Class { table: usize, negate: bool, ic: bool },
    Assert(AssertKind),
    /// Continue at `x`; on backtrack continue at `y`.
    Split { x: usize, y: usize },
    Jump(usize),
    /// Store the current position into capture slot `slot`.
    Save(usize),
    /// Reset capture slots `from..to` to undefined.
    ResetCaptures { from: usize, to: usize },
    /// Back-reference to capture group `group`.
    BackRef { group: usize, ic: bool },
    /// Record the current position in loop register `reg`.
    MarkPos(usize),
    /// Fail if no input was consumed since `MarkPos(reg)`.
    CheckProgress(usize),
    /// Zero-width lookahead over ops `body..next`; the body ends with
    /// `LookEnd`.
    Look { negate: bool, body: usize, next: usize },
    LookEnd,
    /// Never matches. Emitted for atoms unreachable in the narrow variant.
    Fail,
}

/// Portable compiled program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ByteCode {
    pub ops: Vec<Operation>,
    /// Number of capture groups, excluding group 0.
    pub capture_count: usize,
    /// Number of loop registers used by `MarkPos`/`CheckProgress`.
    pub num_registers: usize,
    /// Only the first start position can match.
    pub anchored: bool,
    /// Whether capture slots are written at all.
    pub captures: bool,
    /// Unit every match must begin with, if any.
    pub first_unit: Option<u32>,
}

impl ByteCode {
    pub fn heap_size(&self) -> usize {
        self.ops.capacity() * std::mem::size_of::<Operation>()
    }
}

// === Character predicates ===

#[inline]
pub fn is_line_terminator(c: u32) -> bool {
    c == 0x0A || c == 0x0D || c == 0x2028 || c == 0x2029
}

#[inline]
pub fn is_word_char(c: u32) -> bool {
    c < 128 && (c as u8 == b'_' || (c as u8).is_ascii_alphanumeric())
}

pub const DIGIT_RANGES: &[(u32, u32)] = &[(0x30, 0x39)];

pub const WORD_RANGES: &[(u32, u32)] = &[(0x30, 0x39), (0x41, 0x5A), (0x5F, 0x5F), (0x61, 0x7A)];

pub const SPACE_RANGES: &[(u32, u32)] = &[
    (0x09, 0x0D),
    (0x20, 0x20),
    (0xA0, 0xA0),
    (0x1680, 0x1680),
    (0x2000, 0x200A),
    (0x2028, 0x2029),
    (0x202F, 0x202F),
    (0x205F, 0x205F),
    (0x3000, 0x3000),
    (0xFEFF, 0xFEFF),
];

pub const MAX_UNIT: u32 = 0xFFFF;

/// Complement of sorted, non-overlapping ranges over `0..=MAX_UNIT`.
pub fn negate_ranges(ranges: &[(u32, u32)]) -> Vec<(u32, u32)> {
    let mut out = Vec::with_capacity(ranges.len() + 1);
    let mut next = 0u32;
    for &(lo, hi) in ranges {
        if lo > next {
            out.push((next, lo - 1));
        }
        next = hi + 1;
    }
    if next <= MAX_UNIT {
        out.push((next, MAX_UNIT));
    }
    out
}

// === Case folding ===

/// Upper-case a code unit when the mapping is a single unit and does not
/// move a non-ASCII unit into ASCII.
pub fn canonicalize(c: u32) -> u32 {
    if c < 128 {
        return (c as u8).to_ascii_uppercase() as u32;
    }
    let Some(ch) = char::from_u32(c) else {
        return c;
    };
    let mut upper = ch.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) if (u as u32) >= 128 && (u as u32) <= MAX_UNIT => u as u32,
        _ => c,
    }
}
