// regobject.rs - Pattern-bearing values.
//
// A RegExpObject is what calling code holds: source, flags and lastIndex,
// plus a weak link to its shared record. The link is re-established from the
// registry whenever it was dropped by tracing or sweeping.

use std::fmt;
use std::rc::Weak;

use crate::api::MatchResult;
use crate::error::RegexError;
use crate::input::LinearString;
use crate::matchpairs::{MatchPair, MatchPairs, VectorMatchPairs};
use crate::regcompartment::Tracer;
use crate::regflags::{parse_regexp_flags, regexp_to_string, RegExpFlag};
use crate::regparse::parse_pattern_syntax;
use crate::regshared::{Atom, RegExpGuard, RegExpRunStatus, RegExpShared};
use crate::runtime::RegExpRuntime;

/// Per-domain flags merged into every pattern created with statics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegExpStatics {
    flags: RegExpFlag,
}

impl RegExpStatics {
    pub fn flags(&self) -> RegExpFlag {
        self.flags
    }

    pub fn set_flags(&mut self, flags: RegExpFlag) {
        self.flags = flags;
    }
}

pub struct RegExpObject {
    source: Atom,
    flags: RegExpFlag,
    last_index: usize,
    shared: Weak<RegExpShared>,
}

impl RegExpObject {
    /// Create a value, merging in the domain's static flags.
    pub fn create(rt: &RegExpRuntime, source: &str, flags: RegExpFlag) -> Result<RegExpObject, RegexError> {
        Self::create_no_statics(source, flags | rt.statics().flags())
    }

    /// `create` with a textual flag string.
    pub fn create_with_flag_str(
        rt: &RegExpRuntime,
        source: &str,
        flags: &str,
    ) -> Result<RegExpObject, RegexError> {
        Self::create(rt, source, parse_regexp_flags(flags)?)
    }

    /// Create a value from exactly `flags`. The source is syntax-checked;
    /// no code is compiled until the value is first executed.
    pub fn create_no_statics(source: &str, flags: RegExpFlag) -> Result<RegExpObject, RegexError> {
        parse_pattern_syntax(source)?;
        Ok(RegExpObject {
            source: Atom::from(source),
            flags,
            last_index: 0,
            shared: Weak::new(),
        })
    }

    /// Build a value already linked to `guard`'s record.
    pub fn build_with_shared(guard: &RegExpGuard) -> RegExpObject {
        RegExpObject {
            source: guard.source().clone(),
            flags: guard.flags(),
            last_index: 0,
            shared: guard.downgrade(),
        }
    }

    /// Copy `other`. When the domain's static flags add bits `other` lacks,
    /// the copy uses the widened flags and the record for them.
    pub fn clone_object(rt: &mut RegExpRuntime, other: &mut RegExpObject) -> RegExpObject {
        let statics_flags = rt.statics().flags();
        let guard = if other.flags.contains(statics_flags) {
            other.get_shared(rt)
        } else {
            let flags = other.flags | statics_flags;
            rt.compartment_mut().get(&other.source, flags)
        };
        Self::build_with_shared(&guard)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> RegExpFlag {
        self.flags
    }

    pub fn global(&self) -> bool {
        self.flags.global()
    }

    pub fn ignore_case(&self) -> bool {
        self.flags.ignore_case()
    }

    pub fn multiline(&self) -> bool {
        self.flags.multiline()
    }

    pub fn sticky(&self) -> bool {
        self.flags.sticky()
    }

    pub fn last_index(&self) -> usize {
        self.last_index
    }

    pub fn set_last_index(&mut self, index: usize) {
        self.last_index = index;
    }

    /// Whether the value currently holds a live link to a record.
    pub fn has_shared(&self) -> bool {
        self.shared.strong_count() > 0
    }

    /// The value's record, fetched from the registry if the link is gone.
    pub fn get_shared(&mut self, rt: &mut RegExpRuntime) -> RegExpGuard {
        if let Some(guard) = RegExpGuard::from_weak(&self.shared) {
            return guard;
        }
        let guard = rt.compartment_mut().get(&self.source, self.flags);
        self.shared = guard.downgrade();
        guard
    }

    /// A marking pass that does not preserve code drops the link, so the
    /// record is reclaimed unless something else marks it. Otherwise the
    /// record is traced through.
    pub fn trace(&mut self, tracer: &mut dyn Tracer) {
        tracer.trace_atom(&self.source);
        if tracer.is_marking() && !tracer.is_preserving_code() {
            self.shared = Weak::new();
        } else if let Some(shared) = self.shared.upgrade() {
            shared.trace(tracer);
        }
    }

    // ========================================================================
    // Matching
    // ========================================================================

    /// Shared core of `exec`/`test`. Global and sticky values search from
    /// `last_index` and update it; others search from 0 and leave it alone.
    fn run(
        &mut self,
        rt: &mut RegExpRuntime,
        input: &LinearString,
        want_pairs: bool,
    ) -> Result<Option<Vec<MatchPair>>, RegexError> {
        let guard = self.get_shared(rt);
        let uses_last_index = self.global() || self.sticky();
        let start = if uses_last_index { self.last_index } else { 0 };
        if start > input.len() {
            self.last_index = 0;
            return Ok(None);
        }

        let mut pairs = VectorMatchPairs::new();
        let matches: Option<&mut dyn MatchPairs> = if want_pairs || uses_last_index {
            Some(&mut pairs)
        } else {
            None
        };
        match rt.execute(&guard, input.chars(), start, matches)? {
            RegExpRunStatus::NotFound => {
                if uses_last_index {
                    self.last_index = 0;
                }
                Ok(None)
            }
            RegExpRunStatus::Success => {
                if uses_last_index {
                    self.last_index = pairs.get(0).limit as usize;
                }
                Ok(Some(pairs.into_vec()))
            }
        }
    }

    /// Search `input`, producing a match result on success.
    pub fn exec(&mut self, rt: &mut RegExpRuntime, input: &LinearString) -> Result<Option<MatchResult>, RegexError> {
        let Some(pairs) = self.run(rt, input, true)? else {
            return Ok(None);
        };
        let template = rt.compartment_mut().get_or_create_match_result_template();
        Ok(Some(MatchResult::new(template, input.clone(), pairs)))
    }

    /// Whether `input` matches. Skips capture extraction when lastIndex is
    /// not involved.
    pub fn test(&mut self, rt: &mut RegExpRuntime, input: &LinearString) -> Result<bool, RegexError> {
        Ok(self.run(rt, input, false)?.is_some())
    }
}

impl fmt::Display for RegExpObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&regexp_to_string(&self.source, self.flags))
    }
}

impl fmt::Debug for RegExpObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegExpObject")
            .field("source", &self.source)
            .field("flags", &self.flags)
            .field("last_index", &self.last_index)
            .field("linked", &self.has_shared())
            .finish()
    }
}
