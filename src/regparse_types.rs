// regparse_types.rs - AST produced by the parser and consumed by code
// generators.

use crate::regint::AssertKind;

// === Node ===
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// Matches the empty string.
    Empty,
    /// A single code unit.
    Char(u32),
    /// `.`
    AnyChar,
    /// A bracket class or class escape.
    Class(ClassNode),
    Assert(AssertKind),
    /// `\n` back-reference (1-based group index).
    BackRef(usize),
    /// Capturing group with its 1-based index.
    Capture { index: usize, body: Box<Node> },
    /// `(?=...)` / `(?!...)`
    Look { negate: bool, body: Box<Node> },
    Quant(QuantNode),
    List(Vec<Node>),
    Alt(Vec<Node>),
}

// === ClassNode ===

/// Character class as sorted, merged inclusive ranges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassNode {
    pub ranges: Vec<(u32, u32)>,
    pub negate: bool,
}

impl ClassNode {
    pub fn new(mut ranges: Vec<(u32, u32)>, negate: bool) -> ClassNode {
        ranges.sort_unstable();
        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(ranges.len());
        for (lo, hi) in ranges {
            match merged.last_mut() {
                Some(last) if lo <= last.1.saturating_add(1) => last.1 = last.1.max(hi),
                _ => merged.push((lo, hi)),
            }
        }
        ClassNode {
            ranges: merged,
            negate,
        }
    }
}

// === QuantNode ===
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuantNode {
    pub body: Box<Node>,
    pub lower: u32,
    /// `None` is unbounded.
    pub upper: Option<u32>,
    pub greedy: bool,
}

// === RegExpTree ===

/// Parse result: the AST and its capture count (excluding group 0).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegExpTree {
    pub root: Node,
    pub capture_count: usize,
}

impl RegExpTree {
    /// Rewrite the tree as `^(?:root)`, anchored at the input start
    /// regardless of multiline. Used for sticky patterns.
    pub fn anchor_at_start(self) -> RegExpTree {
        RegExpTree {
            root: Node::List(vec![Node::Assert(AssertKind::BeginInput), self.root]),
            capture_count: self.capture_count,
        }
    }
}

impl Node {
    /// Whether this subtree contains a capture group.
    pub fn has_captures(&self) -> bool {
        match self {
            Node::Capture { .. } => true,
            Node::Look { body, .. } => body.has_captures(),
            Node::Quant(q) => q.body.has_captures(),
            Node::List(items) | Node::Alt(items) => items.iter().any(Node::has_captures),
            _ => false,
        }
    }

    /// Range of capture indices `(first, last + 1)` defined inside this
    /// subtree, if any.
    pub fn capture_span(&self) -> Option<(usize, usize)> {
        let mut span: Option<(usize, usize)> = None;
        self.visit_captures(&mut |index| {
            span = Some(match span {
                None => (index, index + 1),
                Some((lo, hi)) => (lo.min(index), hi.max(index + 1)),
            });
        });
        span
    }

    fn visit_captures(&self, f: &mut dyn FnMut(usize)) {
        match self {
            Node::Capture { index, body } => {
                f(*index);
                body.visit_captures(f);
            }
            Node::Look { body, .. } => body.visit_captures(f),
            Node::Quant(q) => q.body.visit_captures(f),
            Node::List(items) | Node::Alt(items) => {
                for item in items {
                    item.visit_captures(f);
                }
            }
            _ => {}
        }
    }

    /// Whether this subtree can match without consuming input.
    pub fn can_be_empty(&self) -> bool {
        match self {
            Node::Empty | Node::Assert(_) | Node::Look { .. } | Node::BackRef(_) => true,
            Node::Char(_) | Node::AnyChar | Node::Class(_) => false,
            Node::Capture { body, .. } => body.can_be_empty(),
            Node::Quant(q) => q.lower == 0 || q.body.can_be_empty(),
            Node::List(items) => items.iter().all(Node::can_be_empty),
            Node::Alt(items) => items.iter().any(Node::can_be_empty),
        }
    }
}
