// regnative.rs - Native code tier.
//
// A NativeRoutine is code that runs directly instead of through the bytecode
// interpreter. The built-in generator lowers straight-line patterns (no
// groups, quantifiers or alternation) into a LoweredSequence, a flat list of
// unit tests checked in one pass per start position.

use std::fmt;

use crate::input::{CharWidth, Chars, CodeUnit};
use crate::interrupt::InterruptHandle;
use crate::matchpairs::MatchPair;
use crate::regexec::ExecOutcome;
use crate::regflags::RegExpFlag;
use crate::regint::*;
use crate::regparse_types::Node;

/// Directly executable compiled code.
///
/// Implementations search `input` from `start` for the leftmost match,
/// fill `pairs` (offsets relative to `input`) when given, and return
/// `Interrupted` without a result once the interrupt flag is observed.
pub trait NativeRoutine: fmt::Debug {
    fn execute(
        &self,
        input: Chars<'_>,
        start: usize,
        pairs: Option<&mut [MatchPair]>,
        interrupt: &InterruptHandle,
    ) -> ExecOutcome;

    /// Heap bytes owned by the routine.
    fn heap_size(&self) -> usize {
        0
    }
}

// ============================================================================
// LoweredSequence
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
enum SeqItem {
    Unit(u32),
    /// Canonicalized unit compared under case folding.
    UnitIc(u32),
    Any,
    Class { table: CharTable, negate: bool, ic: bool },
    Assert(AssertKind),
}

impl SeqItem {
    fn consumes(&self) -> bool {
        !matches!(self, SeqItem::Assert(_))
    }
}

/// Straight-line matcher: every item either consumes exactly one unit or is
/// a zero-width assertion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoweredSequence {
    items: Vec<SeqItem>,
    anchored: bool,
}

impl LoweredSequence {
    /// Lower `root` for inputs of `width`, or `None` if the tree is not
    /// straight-line.
    pub fn lower(root: &Node, flags: RegExpFlag, width: CharWidth) -> Option<LoweredSequence> {
        let mut items = Vec::new();
        let ic = flags.ignore_case();
        let narrow = width == CharWidth::Latin1;
        if !lower_into(root, ic, narrow, &mut items) {
            return None;
        }
        let anchored = matches!(items.first(), Some(SeqItem::Assert(AssertKind::BeginInput)));
        Some(LoweredSequence { items, anchored })
    }

    /// Number of units a match consumes.
    pub fn match_len(&self) -> usize {
        self.items.iter().filter(|item| item.consumes()).count()
    }

    fn first_unit(&self) -> Option<u32> {
        match self.items.iter().find(|item| item.consumes()) {
            Some(SeqItem::Unit(u)) => Some(*u),
            _ => None,
        }
    }

    fn matches_at<C: CodeUnit>(&self, input: &[C], at: usize) -> bool {
        let mut pos = at;
        for item in &self.items {
            let ok = match item {
                SeqItem::Assert(kind) => check_assert(input, *kind, pos),
                consuming => {
                    let Some(u) = input.get(pos).map(|u| u.to_u32()) else {
                        return false;
                    };
                    pos += 1;
                    match consuming {
                        SeqItem::Unit(c) => u == *c,
                        SeqItem::UnitIc(c) => canonicalize(u) == *c,
                        SeqItem::Any => !is_line_terminator(u),
                        SeqItem::Class { table, negate, ic } => {
                            let inside = if *ic { table.contains_ic(u) } else { table.contains(u) };
                            inside != *negate
                        }
                        SeqItem::Assert(_) => true,
                    }
                }
            };
            if !ok {
                return false;
            }
        }
        true
    }

    fn search<C: CodeUnit>(
        &self,
        input: &[C],
        start: usize,
        pairs: Option<&mut [MatchPair]>,
        interrupt: &InterruptHandle,
    ) -> ExecOutcome {
        let len = self.match_len();
        if start > input.len() {
            return ExecOutcome::NoMatch;
        }
        let last = if self.anchored {
            start
        } else {
            input.len().saturating_sub(len)
        };
        let first = self.first_unit();
        let mut s = start;
        while s <= last {
            if let Some(first) = first {
                match C::find_unit(&input[s..], first) {
                    Some(off) => s += off,
                    None => return ExecOutcome::NoMatch,
                }
                if s > last {
                    return ExecOutcome::NoMatch;
                }
            }
            if interrupt.is_requested() {
                return ExecOutcome::Interrupted;
            }
            if self.matches_at(input, s) {
                if let Some(pairs) = pairs {
                    pairs.fill(MatchPair::UNDEFINED);
                    if let Some(whole) = pairs.first_mut() {
                        *whole = MatchPair::new(s as i32, (s + len) as i32);
                    }
                }
                return ExecOutcome::Matched;
            }
            s += 1;
        }
        ExecOutcome::NoMatch
    }
}

impl NativeRoutine for LoweredSequence {
    fn execute(
        &self,
        input: Chars<'_>,
        start: usize,
        pairs: Option<&mut [MatchPair]>,
        interrupt: &InterruptHandle,
    ) -> ExecOutcome {
        match input {
            Chars::Latin1(units) => self.search(units, start, pairs, interrupt),
            Chars::TwoByte(units) => self.search(units, start, pairs, interrupt),
        }
    }

    fn heap_size(&self) -> usize {
        self.items.capacity() * std::mem::size_of::<SeqItem>()
            + self
                .items
                .iter()
                .map(|item| match item {
                    SeqItem::Class { table, .. } => table.heap_size(),
                    _ => 0,
                })
                .sum::<usize>()
    }
}

fn lower_into(node: &Node, ic: bool, narrow: bool, items: &mut Vec<SeqItem>) -> bool {
    match node {
        Node::Empty => true,
        Node::Char(c) if ic => {
            items.push(SeqItem::UnitIc(canonicalize(*c)));
            true
        }
        Node::Char(c) => {
            items.push(SeqItem::Unit(*c));
            true
        }
        Node::AnyChar => {
            items.push(SeqItem::Any);
            true
        }
        Node::Class(cc) => {
            items.push(SeqItem::Class {
                table: if ic {
                    CharTable::from_ranges_ic(&cc.ranges)
                } else {
                    CharTable::from_ranges(&cc.ranges, narrow)
                },
                negate: cc.negate,
                ic,
            });
            true
        }
        Node::Assert(kind) => {
            items.push(SeqItem::Assert(*kind));
            true
        }
        Node::List(list) => list.iter().all(|n| lower_into(n, ic, narrow, items)),
        _ => false,
    }
}

fn check_assert<C: CodeUnit>(input: &[C], kind: AssertKind, pos: usize) -> bool {
    let unit = |i: usize| input.get(i).map(|u| u.to_u32());
    match kind {
        AssertKind::BeginInput => pos == 0,
        AssertKind::EndInput => pos == input.len(),
        AssertKind::BeginLine => pos == 0 || unit(pos - 1).is_some_and(is_line_terminator),
        AssertKind::EndLine => pos == input.len() || unit(pos).is_some_and(is_line_terminator),
        AssertKind::WordBoundary | AssertKind::NotWordBoundary => {
            let before = pos > 0 && unit(pos - 1).is_some_and(is_word_char);
            let after = unit(pos).is_some_and(is_word_char);
            (before != after) == (kind == AssertKind::WordBoundary)
        }
    }
}
