// regexec.rs - Bytecode interpreter.
// Backtracking VM: stack frames → matcher state → opcode dispatch →
// search loop.
//
// The VM is generic over the code unit so the same loop serves Latin-1 and
// UTF-16 inputs. Matching starts at a caller-given offset; offsets written to
// the capture buffer are relative to the start of `input`.

use crate::error::RegexError;
use crate::input::{Chars, CodeUnit};
use crate::interrupt::InterruptHandle;
use crate::matchpairs::MatchPair;
use crate::regint::*;

// ============================================================================
// Outcome and limits
// ============================================================================

/// Result of running one compiled program once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecOutcome {
    Matched,
    NoMatch,
    /// The interrupt flag was observed; no result was produced.
    Interrupted,
    Error(RegexError),
}

/// Execution limits shared by all backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecLimits {
    /// Maximum backtrack stack depth before failing with `OverRecursed`.
    pub backtrack_limit: usize,
    /// Backtracks between two interrupt flag checks.
    pub interrupt_check_interval: u32,
}

impl Default for ExecLimits {
    fn default() -> Self {
        ExecLimits {
            backtrack_limit: DEFAULT_BACKTRACK_LIMIT,
            interrupt_check_interval: DEFAULT_INTERRUPT_CHECK_INTERVAL,
        }
    }
}

// ============================================================================
// Stack frames
// ============================================================================

enum Frame {
    /// Alternative to resume on failure.
    Branch { pc: usize, pos: usize },
    /// Capture slot value to restore.
    Slot { slot: usize, value: i32 },
    /// Loop register value to restore.
    Register { reg: usize, value: usize },
    /// Whole capture state to restore when backtracking past a lookahead.
    Snapshot(Box<[i32]>),
}

enum Stop {
    Interrupted,
    OverRecursed,
}

impl From<Stop> for ExecOutcome {
    fn from(stop: Stop) -> Self {
        match stop {
            Stop::Interrupted => ExecOutcome::Interrupted,
            Stop::OverRecursed => ExecOutcome::Error(RegexError::OverRecursed),
        }
    }
}

type Step<T> = Result<T, Stop>;

const NO_POS: usize = usize::MAX;

// ============================================================================
// Matcher
// ============================================================================

struct Matcher<'a, C: CodeUnit> {
    code: &'a ByteCode,
    tables: &'a [CharTable],
    input: &'a [C],
    slots: Vec<i32>,
    registers: Vec<usize>,
    stack: Vec<Frame>,
    limits: ExecLimits,
    interrupt: &'a InterruptHandle,
    backtracks: u32,
}

impl<'a, C: CodeUnit> Matcher<'a, C> {
    fn new(
        code: &'a ByteCode,
        tables: &'a [CharTable],
        input: &'a [C],
        limits: ExecLimits,
        interrupt: &'a InterruptHandle,
    ) -> Self {
        Matcher {
            code,
            tables,
            input,
            slots: vec![-1; (code.capture_count + 1) * 2],
            registers: vec![NO_POS; code.num_registers],
            stack: Vec::with_capacity(INIT_MATCH_STACK_SIZE),
            limits,
            interrupt,
            backtracks: 0,
        }
    }

    #[inline]
    fn unit(&self, pos: usize) -> Option<u32> {
        self.input.get(pos).map(|u| u.to_u32())
    }

    fn push(&mut self, frame: Frame) -> Step<()> {
        if self.stack.len() >= self.limits.backtrack_limit {
            return Err(Stop::OverRecursed);
        }
        self.stack.push(frame);
        Ok(())
    }

    fn set_slot(&mut self, slot: usize, pos: usize) -> Step<()> {
        let value = self.slots[slot];
        self.push(Frame::Slot { slot, value })?;
        self.slots[slot] = pos as i32;
        Ok(())
    }

    /// Unwind to the most recent branch above `base`. Returns `None` once
    /// the stack is back at `base`.
    fn backtrack(&mut self, base: usize) -> Step<Option<(usize, usize)>> {
        self.backtracks += 1;
        if self.backtracks >= self.limits.interrupt_check_interval.max(1) {
            self.backtracks = 0;
            if self.interrupt.is_requested() {
                return Err(Stop::Interrupted);
            }
        }
        while self.stack.len() > base {
            match self.stack.pop() {
                Some(Frame::Branch { pc, pos }) => return Ok(Some((pc, pos))),
                Some(Frame::Slot { slot, value }) => self.slots[slot] = value,
                Some(Frame::Register { reg, value }) => self.registers[reg] = value,
                Some(Frame::Snapshot(saved)) => self.slots.copy_from_slice(&saved),
                None => break,
            }
        }
        Ok(None)
    }

    fn is_word_at(&self, pos: usize) -> bool {
        self.unit(pos).is_some_and(is_word_char)
    }

    fn check_assert(&self, kind: AssertKind, pos: usize) -> bool {
        let len = self.input.len();
        match kind {
            AssertKind::BeginInput => pos == 0,
            AssertKind::EndInput => pos == len,
            AssertKind::BeginLine => pos == 0 || self.unit(pos - 1).is_some_and(is_line_terminator),
            AssertKind::EndLine => pos == len || self.unit(pos).is_some_and(is_line_terminator),
            AssertKind::WordBoundary | AssertKind::NotWordBoundary => {
                let before = pos > 0 && self.is_word_at(pos - 1);
                let boundary = before != self.is_word_at(pos);
                boundary == (kind == AssertKind::WordBoundary)
            }
        }
    }

    /// Length consumed by a back-reference at `pos`, or `None` on mismatch.
    /// An unset group matches the empty string.
    fn backref_len(&self, group: usize, ic: bool, pos: usize) -> Option<usize> {
        let start = self.slots[group * 2];
        let end = self.slots[group * 2 + 1];
        if start < 0 || end < start {
            return Some(0);
        }
        let (start, end) = (start as usize, end as usize);
        let n = end - start;
        if pos + n > self.input.len() {
            return None;
        }
        let same = (0..n).all(|i| {
            let a = self.input[start + i].to_u32();
            let b = self.input[pos + i].to_u32();
            a == b || (ic && canonicalize(a) == canonicalize(b))
        });
        if same {
            Some(n)
        } else {
            None
        }
    }

    /// Run from `pc` at `pos` until `End`/`LookEnd` (returns the end
    /// position) or until every alternative pushed by this call failed.
    fn run(&mut self, mut pc: usize, mut pos: usize) -> Step<Option<usize>> {
        let base = self.stack.len();
        let code = self.code;
        let tables = self.tables;
        loop {
            let ok = match &code.ops[pc] {
                Operation::End | Operation::LookEnd => return Ok(Some(pos)),
                Operation::Char(c) => {
                    let hit = self.unit(pos) == Some(*c);
                    pos += hit as usize;
                    hit
                }
                Operation::CharIc(c) => {
                    let hit = self.unit(pos).is_some_and(|u| canonicalize(u) == *c);
                    pos += hit as usize;
                    hit
                }
                Operation::AnyChar => {
                    let hit = self.unit(pos).is_some_and(|u| !is_line_terminator(u));
                    pos += hit as usize;
                    hit
                }
                Operation::Class { table, negate, ic } => {
                    let hit = self.unit(pos).is_some_and(|u| {
                        let t = &tables[*table];
                        let inside = if *ic { t.contains_ic(u) } else { t.contains(u) };
                        inside != *negate
                    });
                    pos += hit as usize;
                    hit
                }
                Operation::Assert(kind) => self.check_assert(*kind, pos),
                Operation::Split { x, y } => {
                    self.push(Frame::Branch { pc: *y, pos })?;
                    pc = *x;
                    continue;
                }
                Operation::Jump(target) => {
                    pc = *target;
                    continue;
                }
                Operation::Save(slot) => {
                    self.set_slot(*slot, pos)?;
                    true
                }
                Operation::ResetCaptures { from, to } => {
                    for slot in *from..*to {
                        if self.slots[slot] != -1 {
                            let value = self.slots[slot];
                            self.push(Frame::Slot { slot, value })?;
                            self.slots[slot] = -1;
                        }
                    }
                    true
                }
                Operation::BackRef { group, ic } => match self.backref_len(*group, *ic, pos) {
                    Some(n) => {
                        pos += n;
                        true
                    }
                    None => false,
                },
                Operation::MarkPos(reg) => {
                    let value = self.registers[*reg];
                    self.push(Frame::Register { reg: *reg, value })?;
                    self.registers[*reg] = pos;
                    true
                }
                Operation::CheckProgress(reg) => self.registers[*reg] != pos,
                Operation::Look { negate, body, next } => {
                    let saved: Box<[i32]> = self.slots.clone().into_boxed_slice();
                    let look_base = self.stack.len();
                    let found = self.run(*body, pos)?.is_some();
                    self.stack.truncate(look_base);
                    if *negate {
                        self.slots.copy_from_slice(&saved);
                        if !found {
                            pc = *next;
                            continue;
                        }
                        false
                    } else if found {
                        self.push(Frame::Snapshot(saved))?;
                        pc = *next;
                        continue;
                    } else {
                        false
                    }
                }
                Operation::Fail => false,
            };

            if ok {
                pc += 1;
                continue;
            }
            match self.backtrack(base)? {
                Some((next_pc, next_pos)) => {
                    pc = next_pc;
                    pos = next_pos;
                }
                None => return Ok(None),
            }
        }
    }

    fn try_at(&mut self, start: usize) -> Step<Option<usize>> {
        self.stack.clear();
        self.slots.fill(-1);
        self.registers.fill(NO_POS);
        self.slots[0] = start as i32;
        let end = self.run(0, start)?;
        if let Some(end) = end {
            self.slots[1] = end as i32;
        }
        Ok(end)
    }

    fn write_pairs(&self, pairs: &mut [MatchPair]) {
        for (i, pair) in pairs.iter_mut().enumerate() {
            let start = self.slots.get(i * 2).copied().unwrap_or(-1);
            let limit = self.slots.get(i * 2 + 1).copied().unwrap_or(-1);
            *pair = if start >= 0 && limit >= start {
                MatchPair::new(start, limit)
            } else {
                MatchPair::UNDEFINED
            };
        }
    }
}

// ============================================================================
// Search
// ============================================================================

fn search<C: CodeUnit>(
    code: &ByteCode,
    tables: &[CharTable],
    input: &[C],
    start: usize,
    pairs: Option<&mut [MatchPair]>,
    limits: ExecLimits,
    interrupt: &InterruptHandle,
) -> ExecOutcome {
    if start > input.len() {
        return ExecOutcome::NoMatch;
    }
    let mut matcher = Matcher::new(code, tables, input, limits, interrupt);
    let last = if code.anchored { start } else { input.len() };
    let mut s = start;
    while s <= last {
        if let Some(first) = code.first_unit {
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
        match matcher.try_at(s) {
            Ok(Some(_)) => {
                if let Some(pairs) = pairs {
                    matcher.write_pairs(pairs);
                }
                return ExecOutcome::Matched;
            }
            Ok(None) => s += 1,
            Err(stop) => return stop.into(),
        }
    }
    ExecOutcome::NoMatch
}

/// Run `code` over `input` looking for the leftmost match at or after
/// `start`. With `pairs`, capture offsets are written on success.
pub fn execute_bytecode(
    code: &ByteCode,
    tables: &[CharTable],
    input: Chars<'_>,
    start: usize,
    pairs: Option<&mut [MatchPair]>,
    limits: ExecLimits,
    interrupt: &InterruptHandle,
) -> ExecOutcome {
    match input {
        Chars::Latin1(units) => search(code, tables, units, start, pairs, limits, interrupt),
        Chars::TwoByte(units) => search(code, tables, units, start, pairs, limits, interrupt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(ops: Vec<Operation>, capture_count: usize) -> ByteCode {
        ByteCode {
            ops,
            capture_count,
            num_registers: 1,
            anchored: false,
            captures: true,
            first_unit: None,
        }
    }

    fn run(code: &ByteCode, text: &[u8], start: usize) -> (ExecOutcome, Vec<MatchPair>) {
        let mut pairs = vec![MatchPair::UNDEFINED; code.capture_count + 1];
        let outcome = execute_bytecode(
            code,
            &[],
            Chars::Latin1(text),
            start,
            Some(&mut pairs),
            ExecLimits::default(),
            &InterruptHandle::new(),
        );
        (outcome, pairs)
    }

    #[test]
    fn finds_leftmost() {
        // b
        let code = program(vec![Operation::Char('b' as u32), Operation::End], 0);
        let (outcome, pairs) = run(&code, b"abcb", 0);
        assert_eq!(outcome, ExecOutcome::Matched);
        assert_eq!(pairs[0], MatchPair::new(1, 2));

        let (_, pairs) = run(&code, b"abcb", 2);
        assert_eq!(pairs[0], MatchPair::new(3, 4));
    }

    #[test]
    fn alternation_backtracks() {
        // (a|ab)c
        let code = program(
            vec![
                Operation::Save(2),
                Operation::Split { x: 2, y: 4 },
                Operation::Char('a' as u32),
                Operation::Jump(6),
                Operation::Char('a' as u32),
                Operation::Char('b' as u32),
                Operation::Save(3),
                Operation::Char('c' as u32),
                Operation::End,
            ],
            1,
        );
        let (outcome, pairs) = run(&code, b"xabc", 0);
        assert_eq!(outcome, ExecOutcome::Matched);
        assert_eq!(pairs[0], MatchPair::new(1, 4));
        assert_eq!(pairs[1], MatchPair::new(1, 3));
    }

    #[test]
    fn no_match_past_end() {
        let code = program(vec![Operation::End], 0);
        let (outcome, _) = run(&code, b"ab", 3);
        assert_eq!(outcome, ExecOutcome::NoMatch);
        let (outcome, pairs) = run(&code, b"ab", 2);
        assert_eq!(outcome, ExecOutcome::Matched);
        assert_eq!(pairs[0], MatchPair::new(2, 2));
    }

    #[test]
    fn stack_limit_reports_over_recursed() {
        // (?:a|a)* over a long input keeps one branch per iteration
        let code = program(
            vec![
                Operation::Split { x: 1, y: 3 },
                Operation::Char('a' as u32),
                Operation::Jump(0),
                Operation::End,
            ],
            0,
        );
        let text = vec![b'a'; 64];
        let limits = ExecLimits {
            backtrack_limit: 8,
            ..ExecLimits::default()
        };
        let outcome = execute_bytecode(
            &code,
            &[],
            Chars::Latin1(&text),
            0,
            None,
            limits,
            &InterruptHandle::new(),
        );
        assert_eq!(outcome, ExecOutcome::Error(RegexError::OverRecursed));
    }

    #[test]
    fn pending_interrupt_stops_search() {
        let code = program(vec![Operation::Fail], 0);
        let handle = InterruptHandle::new();
        handle.request();
        let outcome = execute_bytecode(
            &code,
            &[],
            Chars::Latin1(b"abc"),
            0,
            None,
            ExecLimits::default(),
            &handle,
        );
        assert_eq!(outcome, ExecOutcome::Interrupted);
    }
}
