// regcomp.rs - Code generation.
// Converts a RegExpTree into RegExpCode: either portable bytecode for the
// interpreter in regexec.rs or a native routine from regnative.rs.
//
// Structure: code container → generator seam → bytecode emitter (atoms →
// groups → quantifiers → alternation) → entry point.

use std::fmt;

use crate::error::RegexError;
use crate::input::CharWidth;
use crate::regflags::RegExpFlag;
use crate::regint::*;
use crate::regnative::{LoweredSequence, NativeRoutine};
use crate::regparse_types::*;

// ============================================================================
// RegExpCode
// ============================================================================

/// Compiled code for one (mode, width) slot.
pub enum RegExpCode {
    ByteCode(ByteCode),
    Native(Box<dyn NativeRoutine>),
}

impl RegExpCode {
    pub fn is_native(&self) -> bool {
        matches!(self, RegExpCode::Native(_))
    }

    pub fn heap_size(&self) -> usize {
        match self {
            RegExpCode::ByteCode(code) => code.heap_size(),
            RegExpCode::Native(routine) => {
                std::mem::size_of_val::<dyn NativeRoutine>(routine.as_ref()) + routine.heap_size()
            }
        }
    }
}

impl fmt::Debug for RegExpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegExpCode::ByteCode(code) => f
                .debug_struct("ByteCode")
                .field("ops", &code.ops.len())
                .field("capture_count", &code.capture_count)
                .finish(),
            RegExpCode::Native(routine) => f.debug_tuple("Native").field(routine).finish(),
        }
    }
}

// ============================================================================
// Generator seam
// ============================================================================

/// Turns a parsed tree into executable code.
///
/// Character tables referenced by bytecode are appended to `tables`; the
/// owner of the code keeps them alive for as long as the code.
pub trait CodeGenerator {
    fn generate_code(
        &self,
        tree: &RegExpTree,
        mode: CompilationMode,
        width: CharWidth,
        flags: RegExpFlag,
        tables: &mut Vec<CharTable>,
    ) -> Result<RegExpCode, RegexError>;
}

/// Built-in generator: a native routine for straight-line patterns when the
/// native tier is enabled, bytecode otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DefaultCodeGenerator {
    pub native_tier: bool,
    pub max_program_len: usize,
}

impl Default for DefaultCodeGenerator {
    fn default() -> Self {
        DefaultCodeGenerator {
            native_tier: true,
            max_program_len: DEFAULT_MAX_PROGRAM_LEN,
        }
    }
}

impl CodeGenerator for DefaultCodeGenerator {
    fn generate_code(
        &self,
        tree: &RegExpTree,
        mode: CompilationMode,
        width: CharWidth,
        flags: RegExpFlag,
        tables: &mut Vec<CharTable>,
    ) -> Result<RegExpCode, RegexError> {
        if self.native_tier {
            if let Some(seq) = LoweredSequence::lower(&tree.root, flags, width) {
                return Ok(RegExpCode::Native(Box::new(seq)));
            }
        }
        compile_bytecode(tree, mode, width, flags, tables, self.max_program_len)
            .map(RegExpCode::ByteCode)
    }
}

// ============================================================================
// Bytecode emitter
// ============================================================================

struct Emitter<'t> {
    ops: Vec<Operation>,
    tables: &'t mut Vec<CharTable>,
    ic: bool,
    narrow: bool,
    captures: bool,
    num_registers: usize,
    max_len: usize,
}

impl Emitter<'_> {
    fn emit(&mut self, op: Operation) -> Result<usize, RegexError> {
        if self.ops.len() >= self.max_len {
            log::debug!("bytecode exceeds {} operations", self.max_len);
            return Err(RegexError::compile("regular expression too large"));
        }
        self.ops.push(op);
        Ok(self.ops.len() - 1)
    }

    #[inline]
    fn here(&self) -> usize {
        self.ops.len()
    }

    fn patch_split_y(&mut self, at: usize, target: usize) {
        if let Operation::Split { y, .. } = &mut self.ops[at] {
            *y = target;
        }
    }

    fn patch_split_x(&mut self, at: usize, target: usize) {
        if let Operation::Split { x, .. } = &mut self.ops[at] {
            *x = target;
        }
    }

    fn patch_jump(&mut self, at: usize, target: usize) {
        if let Operation::Jump(t) = &mut self.ops[at] {
            *t = target;
        }
    }

    // === Atoms ===

    fn compile_char(&mut self, c: u32) -> Result<(), RegexError> {
        let op = if self.ic {
            Operation::CharIc(canonicalize(c))
        } else if self.narrow && c > u8::MAX as u32 {
            // no Latin-1 unit can match
            Operation::Fail
        } else {
            Operation::Char(c)
        };
        self.emit(op)?;
        Ok(())
    }

    fn compile_class(&mut self, cc: &ClassNode) -> Result<(), RegexError> {
        let table = if self.ic {
            CharTable::from_ranges_ic(&cc.ranges)
        } else {
            CharTable::from_ranges(&cc.ranges, self.narrow)
        };
        self.tables.push(table);
        let index = self.tables.len() - 1;
        self.emit(Operation::Class {
            table: index,
            negate: cc.negate,
            ic: self.ic,
        })?;
        Ok(())
    }

    fn compile_node(&mut self, node: &Node) -> Result<(), RegexError> {
        match node {
            Node::Empty => {}
            Node::Char(c) => self.compile_char(*c)?,
            Node::AnyChar => {
                self.emit(Operation::AnyChar)?;
            }
            Node::Class(cc) => self.compile_class(cc)?,
            Node::Assert(kind) => {
                self.emit(Operation::Assert(*kind))?;
            }
            Node::BackRef(group) => {
                self.emit(Operation::BackRef {
                    group: *group,
                    ic: self.ic,
                })?;
            }
            Node::Capture { index, body } => {
                if self.captures {
                    self.emit(Operation::Save(index * 2))?;
                    self.compile_node(body)?;
                    self.emit(Operation::Save(index * 2 + 1))?;
                } else {
                    self.compile_node(body)?;
                }
            }
            Node::Look { negate, body } => {
                let at = self.here();
                self.emit(Operation::Look {
                    negate: *negate,
                    body: at + 1,
                    next: 0,
                })?;
                self.compile_node(body)?;
                self.emit(Operation::LookEnd)?;
                let next = self.here();
                if let Operation::Look { next: n, .. } = &mut self.ops[at] {
                    *n = next;
                }
            }
            Node::Quant(q) => self.compile_quant(q)?,
            Node::List(items) => {
                for item in items {
                    self.compile_node(item)?;
                }
            }
            Node::Alt(alts) => self.compile_alt(alts)?,
        }
        Ok(())
    }

    // === Quantifiers ===

    /// One loop iteration: clear the body's captures, then the body.
    fn compile_iteration(&mut self, body: &Node, reset: Option<(usize, usize)>) -> Result<(), RegexError> {
        if let Some((from, to)) = reset {
            self.emit(Operation::ResetCaptures {
                from: from * 2,
                to: to * 2,
            })?;
        }
        self.compile_node(body)
    }

    fn compile_quant(&mut self, q: &QuantNode) -> Result<(), RegexError> {
        let reset = if self.captures {
            q.body.capture_span()
        } else {
            None
        };

        for _ in 0..q.lower {
            let before = self.here();
            self.compile_iteration(&q.body, reset)?;
            if self.here() == before {
                // zero-width body, every further copy is identical
                break;
            }
        }

        match q.upper {
            None => {
                // L: Split(body, exit); [MarkPos]; body; [CheckProgress]; Jump L
                let head = self.emit(Operation::Split { x: 0, y: 0 })?;
                let reg = if q.body.can_be_empty() {
                    let reg = self.num_registers;
                    self.num_registers += 1;
                    self.emit(Operation::MarkPos(reg))?;
                    Some(reg)
                } else {
                    None
                };
                self.compile_iteration(&q.body, reset)?;
                if let Some(reg) = reg {
                    self.emit(Operation::CheckProgress(reg))?;
                }
                self.emit(Operation::Jump(head))?;
                let exit = self.here();
                self.set_split(head, q.greedy, exit);
            }
            Some(upper) => {
                let optional = upper.saturating_sub(q.lower);
                // the bound may be near u32::MAX; emit() enforces the size cap
                let mut splits = Vec::new();
                for _ in 0..optional {
                    splits.push(self.emit(Operation::Split { x: 0, y: 0 })?);
                    self.compile_iteration(&q.body, reset)?;
                }
                let exit = self.here();
                for head in splits {
                    self.set_split(head, q.greedy, exit);
                }
            }
        }
        Ok(())
    }

    /// Point a loop split at its body (the op after it) and at `exit`, in
    /// greedy or lazy order.
    fn set_split(&mut self, head: usize, greedy: bool, exit: usize) {
        if greedy {
            self.patch_split_x(head, head + 1);
            self.patch_split_y(head, exit);
        } else {
            self.patch_split_x(head, exit);
            self.patch_split_y(head, head + 1);
        }
    }

    // === Alternation ===

    fn compile_alt(&mut self, alts: &[Node]) -> Result<(), RegexError> {
        let mut jumps = Vec::with_capacity(alts.len());
        let (last, rest) = match alts.split_last() {
            Some(split) => split,
            None => return Ok(()),
        };
        for alt in rest {
            let split = self.emit(Operation::Split { x: 0, y: 0 })?;
            self.patch_split_x(split, split + 1);
            self.compile_node(alt)?;
            jumps.push(self.emit(Operation::Jump(0))?);
            let next = self.here();
            self.patch_split_y(split, next);
        }
        self.compile_node(last)?;
        let exit = self.here();
        for jump in jumps {
            self.patch_jump(jump, exit);
        }
        Ok(())
    }
}

// ============================================================================
// Analysis helpers
// ============================================================================

fn has_backrefs(node: &Node) -> bool {
    match node {
        Node::BackRef(_) => true,
        Node::Capture { body, .. } | Node::Look { body, .. } => has_backrefs(body),
        Node::Quant(q) => has_backrefs(&q.body),
        Node::List(items) | Node::Alt(items) => items.iter().any(has_backrefs),
        _ => false,
    }
}

/// Unit every match of `node` must start with, if one is known.
fn first_unit(node: &Node) -> Option<u32> {
    match node {
        Node::Char(c) => Some(*c),
        Node::Capture { body, .. } => first_unit(body),
        Node::Quant(q) if q.lower > 0 => first_unit(&q.body),
        Node::List(items) => {
            for item in items {
                match item {
                    Node::Assert(_) | Node::Look { .. } | Node::Empty => continue,
                    _ if item.can_be_empty() => return None,
                    _ => return first_unit(item),
                }
            }
            None
        }
        _ => None,
    }
}

fn starts_at_input_begin(node: &Node) -> bool {
    match node {
        Node::Assert(AssertKind::BeginInput) => true,
        Node::List(items) => items.first().is_some_and(starts_at_input_begin),
        Node::Capture { body, .. } => starts_at_input_begin(body),
        _ => false,
    }
}

// ============================================================================
// Entry point
// ============================================================================

/// Compile `tree` to bytecode for inputs of `width`.
///
/// In `MatchOnly` mode capture slots are only written when a back-reference
/// needs them.
pub fn compile_bytecode(
    tree: &RegExpTree,
    mode: CompilationMode,
    width: CharWidth,
    flags: RegExpFlag,
    tables: &mut Vec<CharTable>,
    max_program_len: usize,
) -> Result<ByteCode, RegexError> {
    let captures = mode == CompilationMode::Normal || has_backrefs(&tree.root);
    let mut emitter = Emitter {
        ops: Vec::new(),
        tables,
        ic: flags.ignore_case(),
        narrow: width == CharWidth::Latin1,
        captures,
        num_registers: 0,
        max_len: max_program_len,
    };
    emitter.compile_node(&tree.root)?;
    emitter.emit(Operation::End)?;

    let first_unit = if flags.ignore_case() {
        None
    } else {
        first_unit(&tree.root)
    };
    Ok(ByteCode {
        ops: emitter.ops,
        capture_count: tree.capture_count,
        num_registers: emitter.num_registers,
        anchored: starts_at_input_begin(&tree.root),
        captures,
        first_unit,
    })
}
