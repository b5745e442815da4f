// regcompartment.rs - Per-domain pattern registry.
//
// Deduplicates RegExpShared records by (source, flags), reclaims them in
// sweep passes driven by the host's tracing, and owns the lazily created
// match-result template.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::api::MatchResultTemplate;
use crate::error::RegexError;
use crate::regflags::{parse_regexp_flags, RegExpFlag};
use crate::regnative::NativeRoutine;
use crate::regshared::{Atom, RegExpGuard, RegExpShared};

// ============================================================================
// Tracing seams
// ============================================================================

/// Visitor for the references a record holds.
pub trait Tracer {
    /// A marking pass: visited records count as reachable.
    fn is_marking(&self) -> bool;

    /// Whether compiled code must survive this pass.
    fn is_preserving_code(&self) -> bool {
        false
    }

    fn trace_atom(&mut self, atom: &Atom);

    fn trace_code(&mut self, code: &dyn NativeRoutine);
}

/// Tracer for a root-scan marking pass.
#[derive(Debug, Default)]
pub struct MarkingTracer {
    pub preserving_code: bool,
    pub atoms_traced: usize,
    pub code_traced: usize,
}

impl MarkingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preserving_code() -> Self {
        MarkingTracer {
            preserving_code: true,
            ..Self::default()
        }
    }
}

impl Tracer for MarkingTracer {
    fn is_marking(&self) -> bool {
        true
    }

    fn is_preserving_code(&self) -> bool {
        self.preserving_code
    }

    fn trace_atom(&mut self, _atom: &Atom) {
        self.atoms_traced += 1;
    }

    fn trace_code(&mut self, _code: &dyn NativeRoutine) {
        self.code_traced += 1;
    }
}

/// What the host heap knows at sweep time.
pub trait HeapState {
    /// A compaction pass is running; nothing is reclaimed.
    fn is_compacting(&self) -> bool;

    fn is_atom_about_to_be_finalized(&self, atom: &Atom) -> bool;

    fn is_code_about_to_be_finalized(&self, code: &dyn NativeRoutine) -> bool;
}

/// Explicit heap state for one sweep.
#[derive(Debug, Default)]
pub struct SweepPhase {
    compacting: bool,
    dying_atoms: HashSet<Atom>,
    dying_code: HashSet<usize>,
}

fn code_address(code: &dyn NativeRoutine) -> usize {
    std::ptr::from_ref(code).cast::<()>() as usize
}

impl SweepPhase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compacting() -> Self {
        SweepPhase {
            compacting: true,
            ..Self::default()
        }
    }

    /// Declare `atom` unreachable for this sweep.
    pub fn finalize_atom(&mut self, atom: &Atom) {
        self.dying_atoms.insert(atom.clone());
    }

    /// Declare `code` unreachable for this sweep.
    pub fn finalize_code(&mut self, code: &dyn NativeRoutine) {
        self.dying_code.insert(code_address(code));
    }
}

impl HeapState for SweepPhase {
    fn is_compacting(&self) -> bool {
        self.compacting
    }

    fn is_atom_about_to_be_finalized(&self, atom: &Atom) -> bool {
        self.dying_atoms.contains(atom)
    }

    fn is_code_about_to_be_finalized(&self, code: &dyn NativeRoutine) -> bool {
        self.dying_code.contains(&code_address(code))
    }
}

// ============================================================================
// RegExpCompartment
// ============================================================================

/// Identity of a pattern. Equal by source content and flags.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RegExpKey {
    pub source: Atom,
    pub flags: RegExpFlag,
}

/// Statistics from one sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub kept: usize,
    pub removed: usize,
}

#[derive(Debug, Default)]
pub struct RegExpCompartment {
    set: HashMap<RegExpKey, Rc<RegExpShared>>,
    match_result_template: Option<Rc<MatchResultTemplate>>,
    incremental_barrier: bool,
}

impl RegExpCompartment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Turn the incremental-marking barrier on or off. While on, every record
    /// handed out by `get` is marked so an in-progress marking pass cannot
    /// miss it.
    pub fn set_incremental_barrier(&mut self, on: bool) {
        self.incremental_barrier = on;
    }

    pub fn needs_barrier(&self) -> bool {
        self.incremental_barrier
    }

    /// Return the record for (source, flags), creating it on a miss.
    pub fn get(&mut self, source: &Atom, flags: RegExpFlag) -> RegExpGuard {
        let key = RegExpKey {
            source: source.clone(),
            flags,
        };
        let shared = match self.set.get(&key) {
            Some(shared) => {
                log::trace!("regexp cache hit for /{}/{}", source, flags);
                shared.clone()
            }
            None => {
                log::debug!("regexp cache miss for /{}/{}", source, flags);
                let shared = Rc::new(RegExpShared::new(source.clone(), flags));
                self.set.insert(key, shared.clone());
                shared
            }
        };
        if self.incremental_barrier {
            shared.mark();
        }
        RegExpGuard::new(shared)
    }

    /// `get` with a textual flag string.
    pub fn get_with_flag_str(&mut self, source: &Atom, flags: &str) -> Result<RegExpGuard, RegexError> {
        let flags = parse_regexp_flags(flags)?;
        Ok(self.get(source, flags))
    }

    /// Lookup without creation.
    pub fn lookup(&self, source: &str, flags: RegExpFlag) -> Option<RegExpGuard> {
        let key = RegExpKey {
            source: Atom::from(source),
            flags,
        };
        self.set.get(&key).cloned().map(RegExpGuard::new)
    }

    /// Reclaim records that were not marked since the last sweep, or whose
    /// source or native code is about to be finalized. Records rooted by a
    /// live guard, and every record while the heap is compacting, are kept.
    /// Survivors have their mark cleared.
    pub fn sweep(&mut self, heap: &dyn HeapState) -> SweepStats {
        let mut stats = SweepStats::default();
        self.set.retain(|_, shared| {
            let in_use = Rc::strong_count(shared) > 1;
            let keep = in_use || shared.survives_sweep(heap);
            if keep {
                shared.clear_marked();
                stats.kept += 1;
            } else {
                stats.removed += 1;
            }
            keep
        });

        if self
            .match_result_template
            .as_ref()
            .is_some_and(|t| Rc::strong_count(t) == 1 && !heap.is_compacting())
        {
            self.match_result_template = None;
        }

        log::debug!(
            "regexp sweep kept {} removed {} records",
            stats.kept,
            stats.removed
        );
        stats
    }

    /// Template describing match-result shape, created on first request.
    pub fn get_or_create_match_result_template(&mut self) -> Rc<MatchResultTemplate> {
        self.match_result_template
            .get_or_insert_with(|| Rc::new(MatchResultTemplate::new()))
            .clone()
    }

    pub fn has_match_result_template(&self) -> bool {
        self.match_result_template.is_some()
    }

    /// Bytes used by the registry's own tables. Records are reported through
    /// `RegExpShared::size_of_including_this`.
    pub fn size_of_excluding_this(&self) -> usize {
        self.set.capacity()
            * (std::mem::size_of::<RegExpKey>() + std::mem::size_of::<Rc<RegExpShared>>())
    }

    /// Iterate over every registered record.
    pub fn records(&self) -> impl Iterator<Item = &RegExpShared> {
        self.set.values().map(|rc| rc.as_ref())
    }
}

impl Drop for RegExpCompartment {
    fn drop(&mut self) {
        if !self.set.is_empty() {
            log::debug!("destroying {} regexp records", self.set.len());
        }
        self.set.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(s: &str) -> Atom {
        Atom::from(s)
    }

    #[test]
    fn same_key_same_record() {
        let mut comp = RegExpCompartment::new();
        let a = comp.get(&atom("a+b"), RegExpFlag::GLOBAL);
        let b = comp.get(&atom("a+b"), RegExpFlag::GLOBAL);
        assert!(a.ptr_eq(&b));
        let c = comp.get(&atom("a+b"), RegExpFlag::empty());
        assert!(!a.ptr_eq(&c));
        assert_eq!(comp.len(), 2);
    }

    #[test]
    fn flag_string_errors() {
        let mut comp = RegExpCompartment::new();
        assert!(comp.get_with_flag_str(&atom("x"), "gim").is_ok());
        assert_eq!(
            comp.get_with_flag_str(&atom("x"), "gg").unwrap_err(),
            RegexError::DuplicateFlag('g')
        );
    }

    #[test]
    fn sweep_removes_unmarked() {
        let mut comp = RegExpCompartment::new();
        drop(comp.get(&atom("a"), RegExpFlag::empty()));
        let stats = comp.sweep(&SweepPhase::new());
        assert_eq!(stats, SweepStats { kept: 0, removed: 1 });
        assert!(comp.is_empty());
    }

    #[test]
    fn sweep_keeps_guarded_and_marked() {
        let mut comp = RegExpCompartment::new();
        let held = comp.get(&atom("held"), RegExpFlag::empty());
        let marked = comp.get(&atom("marked"), RegExpFlag::empty());
        marked.trace(&mut MarkingTracer::new());
        drop(marked);
        comp.sweep(&SweepPhase::new());
        assert_eq!(comp.len(), 2);

        let kept = comp.lookup("marked", RegExpFlag::empty()).unwrap();
        assert!(!kept.marked());
        drop(kept);
        // not re-marked, so the next sweep reclaims it
        comp.sweep(&SweepPhase::new());
        assert!(comp.lookup("marked", RegExpFlag::empty()).is_none());
        assert!(comp.lookup("held", RegExpFlag::empty()).is_some());
        drop(held);
    }

    #[test]
    fn dying_source_is_reclaimed() {
        let mut comp = RegExpCompartment::new();
        let source = atom("src");
        let guard = comp.get(&source, RegExpFlag::empty());
        guard.mark();
        drop(guard);
        let mut phase = SweepPhase::new();
        phase.finalize_atom(&source);
        comp.sweep(&phase);
        assert!(comp.is_empty());
    }

    #[test]
    fn compacting_keeps_everything() {
        let mut comp = RegExpCompartment::new();
        drop(comp.get(&atom("a"), RegExpFlag::empty()));
        comp.sweep(&SweepPhase::compacting());
        assert_eq!(comp.len(), 1);
    }

    #[test]
    fn barrier_marks_on_get() {
        let mut comp = RegExpCompartment::new();
        comp.set_incremental_barrier(true);
        assert!(comp.needs_barrier());
        let guard = comp.get(&atom("a"), RegExpFlag::empty());
        assert!(guard.marked());
    }

    #[test]
    fn template_is_lazy_and_swept() {
        let mut comp = RegExpCompartment::new();
        assert!(!comp.has_match_result_template());
        let t1 = comp.get_or_create_match_result_template();
        let t2 = comp.get_or_create_match_result_template();
        assert!(Rc::ptr_eq(&t1, &t2));
        drop(t2);
        comp.sweep(&SweepPhase::new());
        assert!(comp.has_match_result_template());
        drop(t1);
        comp.sweep(&SweepPhase::new());
        assert!(!comp.has_match_result_template());
    }
}
