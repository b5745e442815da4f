// compat_cache.rs - Registry identity, sweeping, pattern values and serialization.

use ferrexp::prelude::*;
use ferrexp::regcompartment::{MarkingTracer, SweepPhase, SweepStats};
use ferrexp::regint::CompilationMode;
use ferrexp::xdr::{clone_script_regexp, decode_regexp, encode_regexp};

fn flags(s: &str) -> RegExpFlag {
    parse_regexp_flags(s).unwrap_or_else(|e| panic!("bad flag string {:?}: {}", s, e))
}

// ============================================================================
// Identity
// ============================================================================

#[test]
fn same_key_same_record() {
    let mut rt = RegExpRuntime::new();
    let a = rt.get_shared("a+b", flags("g"));
    let b = rt.get_shared(&String::from("a+b"), flags("g"));
    assert!(a.ptr_eq(&b), "equal (source, flags) must share one record");
    assert_eq!(rt.compartment().len(), 1);
}

#[test]
fn different_flags_different_records() {
    let mut rt = RegExpRuntime::new();
    let a = rt.get_shared("a", flags(""));
    let b = rt.get_shared("a", flags("i"));
    let c = rt.get_shared("b", flags(""));
    assert!(!a.ptr_eq(&b));
    assert!(!a.ptr_eq(&c));
    assert_eq!(rt.compartment().len(), 3);
}

#[test]
fn flag_string_validation() {
    let mut rt = RegExpRuntime::new();
    assert_eq!(rt.get_shared_with_flag_str("a", "gg").unwrap_err(), RegexError::DuplicateFlag('g'));
    assert_eq!(rt.get_shared_with_flag_str("a", "q").unwrap_err(), RegexError::InvalidFlag('q'));
    assert!(rt.compartment().is_empty());
    let g = rt.get_shared_with_flag_str("a", "ymig").unwrap();
    assert_eq!(g.flags().to_string(), "gimy");
}

#[test]
fn lookup_does_not_create() {
    let mut rt = RegExpRuntime::new();
    assert!(rt.compartment().lookup("x", flags("")).is_none());
    let g = rt.get_shared("x", flags(""));
    let found = rt.compartment().lookup("x", flags("")).unwrap();
    assert!(found.ptr_eq(&g));
}

#[test]
fn compiled_code_is_shared() {
    let mut rt = RegExpRuntime::new();
    let a = rt.get_shared("a.c", flags(""));
    let text = LinearString::from("xabc");
    rt.execute(&a, text.chars(), 0, None).unwrap();
    let b = rt.get_shared("a.c", flags(""));
    assert!(b.is_compiled(CompilationMode::MatchOnly, CharWidth::Latin1));
    assert!(!b.is_compiled(CompilationMode::MatchOnly, CharWidth::TwoByte));
}

// ============================================================================
// Sweeping
// ============================================================================

#[test]
fn unmarked_records_are_reclaimed() {
    let mut rt = RegExpRuntime::new();
    drop(rt.get_shared("a", flags("")));
    let stats = rt.sweep(&SweepPhase::new());
    assert_eq!(stats, SweepStats { kept: 0, removed: 1 });
    assert!(rt.compartment().is_empty());
}

#[test]
fn guarded_records_survive() {
    let mut rt = RegExpRuntime::new();
    let guard = rt.get_shared("a", flags(""));
    let stats = rt.sweep(&SweepPhase::new());
    assert_eq!(stats.kept, 1);

    // a finalized atom does not override a live guard
    let mut phase = SweepPhase::new();
    phase.finalize_atom(guard.source());
    assert_eq!(rt.sweep(&phase).kept, 1);
}

#[test]
fn marked_records_survive_once() {
    let mut rt = RegExpRuntime::new();
    {
        let guard = rt.get_shared("a", flags(""));
        guard.trace(&mut MarkingTracer::new());
        assert!(guard.marked());
    }
    assert_eq!(rt.sweep(&SweepPhase::new()).kept, 1);
    let survivor = rt.compartment().records().next().map(|r| r.marked());
    assert_eq!(survivor, Some(false), "sweep clears the mark on survivors");
    assert_eq!(rt.sweep(&SweepPhase::new()).removed, 1);
}

#[test]
fn dying_atom_or_code_reclaims_marked_record() {
    let mut rt = RegExpRuntime::new();
    let text = LinearString::from("abc");
    let atom = {
        let guard = rt.get_shared("a.c", flags(""));
        rt.execute(&guard, text.chars(), 0, None).unwrap();
        guard.trace(&mut MarkingTracer::new());
        guard.source().clone()
    };
    let mut phase = SweepPhase::new();
    phase.finalize_atom(&atom);
    assert_eq!(rt.sweep(&phase).removed, 1);

    let mut phase = SweepPhase::new();
    {
        let guard = rt.get_shared("a.c", flags(""));
        rt.execute(&guard, text.chars(), 0, None).unwrap();
        guard.trace(&mut MarkingTracer::new());
        let code = guard
            .native_code(CompilationMode::MatchOnly, CharWidth::Latin1)
            .expect("straight-line pattern should get native code");
        phase.finalize_code(code);
    }
    assert_eq!(rt.sweep(&phase).removed, 1);
}

#[test]
fn compacting_keeps_everything() {
    let mut rt = RegExpRuntime::new();
    drop(rt.get_shared("a", flags("")));
    drop(rt.get_shared("b", flags("")));
    let stats = rt.sweep(&SweepPhase::compacting());
    assert_eq!(stats, SweepStats { kept: 2, removed: 0 });
}

#[test]
fn incremental_barrier_marks_on_get() {
    let mut rt = RegExpRuntime::new();
    rt.compartment_mut().set_incremental_barrier(true);
    assert!(rt.compartment().needs_barrier());
    drop(rt.get_shared("a", flags("")));
    assert_eq!(rt.sweep(&SweepPhase::new()).kept, 1);
}

#[test]
fn match_result_template_lifecycle() {
    let mut rt = RegExpRuntime::new();
    assert!(!rt.compartment().has_match_result_template());
    let first = rt.compartment_mut().get_or_create_match_result_template();
    let second = rt.compartment_mut().get_or_create_match_result_template();
    assert!(std::rc::Rc::ptr_eq(&first, &second));
    assert_eq!(first.fields(), &["index", "input"]);

    rt.sweep(&SweepPhase::new());
    assert!(rt.compartment().has_match_result_template(), "held template survives");
    drop(first);
    drop(second);
    rt.sweep(&SweepPhase::compacting());
    assert!(rt.compartment().has_match_result_template(), "compaction keeps template");
    rt.sweep(&SweepPhase::new());
    assert!(!rt.compartment().has_match_result_template());
}

#[test]
fn memory_reporting_grows() {
    let mut rt = RegExpRuntime::new();
    let guard = rt.get_shared("(a|b)*c", flags(""));
    let before = guard.size_of_including_this();
    let text = LinearString::from("abac");
    rt.execute(&guard, text.chars(), 0, None).unwrap();
    assert!(guard.size_of_including_this() > before);
    assert!(rt.compartment().size_of_excluding_this() > 0);
}

// ============================================================================
// Pattern values
// ============================================================================

#[test]
fn object_links_lazily() {
    let mut rt = RegExpRuntime::new();
    let mut obj = RegExpObject::create(&rt, "b+", flags("")).unwrap();
    assert!(!obj.has_shared());
    assert!(rt.compartment().is_empty());
    assert!(obj.test(&mut rt, &LinearString::from("abbc")).unwrap());
    assert!(obj.has_shared());
}

#[test]
fn object_creation_checks_syntax() {
    let rt = RegExpRuntime::new();
    let err = RegExpObject::create(&rt, "a(", flags("")).unwrap_err();
    assert!(matches!(err, RegexError::Syntax { .. }));
    assert!(RegExpObject::create_with_flag_str(&rt, "a", "z").is_err());
}

#[test]
fn statics_flags_are_merged() {
    let mut rt = RegExpRuntime::new();
    rt.statics_mut().set_flags(RegExpFlag::MULTILINE);
    let obj = RegExpObject::create(&rt, "a", flags("g")).unwrap();
    assert_eq!(obj.to_string(), "/a/gm");
    let plain = RegExpObject::create_no_statics("a", flags("g")).unwrap();
    assert_eq!(plain.to_string(), "/a/g");
}

#[test]
fn clone_widens_to_statics() {
    let mut rt = RegExpRuntime::new();
    let mut original = RegExpObject::create(&rt, "a", flags("")).unwrap();
    let same = RegExpObject::clone_object(&mut rt, &mut original);
    assert_eq!(same.flags(), flags(""));

    rt.statics_mut().set_flags(RegExpFlag::MULTILINE);
    let widened = RegExpObject::clone_object(&mut rt, &mut original);
    assert_eq!(widened.flags(), flags("m"));
    assert!(widened.has_shared());
    assert_eq!(rt.compartment().len(), 2);
}

#[test]
fn global_exec_walks_last_index() {
    let mut rt = RegExpRuntime::new();
    let mut obj = RegExpObject::create(&rt, r"\d", flags("g")).unwrap();
    let text = LinearString::from("a1b2");
    let first = obj.exec(&mut rt, &text).unwrap().unwrap();
    assert_eq!(first.index(), 1);
    assert_eq!(obj.last_index(), 2);
    let second = obj.exec(&mut rt, &text).unwrap().unwrap();
    assert_eq!(second.index(), 3);
    assert!(obj.exec(&mut rt, &text).unwrap().is_none());
    assert_eq!(obj.last_index(), 0);
}

#[test]
fn non_global_ignores_last_index() {
    let mut rt = RegExpRuntime::new();
    let mut obj = RegExpObject::create(&rt, "a", flags("")).unwrap();
    obj.set_last_index(5);
    assert!(obj.test(&mut rt, &LinearString::from("ba")).unwrap());
    assert!(!obj.test(&mut rt, &LinearString::from("b")).unwrap());
    assert_eq!(obj.last_index(), 5);
}

#[test]
fn sticky_exec_requires_position() {
    let mut rt = RegExpRuntime::new();
    let mut obj = RegExpObject::create(&rt, "b", flags("y")).unwrap();
    let text = LinearString::from("abb");
    assert!(obj.exec(&mut rt, &text).unwrap().is_none());
    obj.set_last_index(1);
    let m = obj.exec(&mut rt, &text).unwrap().unwrap();
    assert_eq!(m.index(), 1);
    assert_eq!(obj.last_index(), 2);
}

#[test]
fn marking_trace_unlinks_object() {
    let mut rt = RegExpRuntime::new();
    let mut obj = RegExpObject::create(&rt, "a", flags("")).unwrap();
    let _ = obj.get_shared(&mut rt);
    assert!(obj.has_shared());

    obj.trace(&mut MarkingTracer::preserving_code());
    assert!(obj.has_shared());

    let mut tracer = MarkingTracer::new();
    obj.trace(&mut tracer);
    assert_eq!(tracer.atoms_traced, 1);
    rt.sweep(&SweepPhase::new());
    assert!(!obj.has_shared());
    // relinks on demand
    assert!(obj.test(&mut rt, &LinearString::from("a")).unwrap());
}

#[test]
fn match_result_fields() {
    let mut rt = RegExpRuntime::new();
    let mut obj = RegExpObject::create(&rt, r"(\w)(\d)?", flags("")).unwrap();
    let text = LinearString::from("--x");
    let m = obj.exec(&mut rt, &text).unwrap().unwrap();
    assert_eq!(m.len(), 3);
    assert_eq!(m.index(), 2);
    assert_eq!(m.get(1).unwrap().to_string_lossy(), "x");
    assert!(m.get(2).is_none());
    assert_eq!(m.template().slot_of("input"), Some(1));
    assert!(m.field("groups").is_none());
}

// ============================================================================
// Serialization
// ============================================================================

#[test]
fn xdr_stream_of_patterns() {
    let rt = RegExpRuntime::new();
    let a = RegExpObject::create(&rt, "x+", flags("gi")).unwrap();
    let b = RegExpObject::create(&rt, "\u{3b1}|\u{3b2}", flags("y")).unwrap();
    let mut buf = Vec::new();
    encode_regexp(&a, &mut buf).unwrap();
    encode_regexp(&b, &mut buf).unwrap();

    let mut input = &buf[..];
    let a2 = decode_regexp(&mut input).unwrap();
    let b2 = decode_regexp(&mut input).unwrap();
    assert!(input.is_empty());
    assert_eq!(a2.to_string(), "/x+/gi");
    assert_eq!(b2.to_string(), "/\u{3b1}|\u{3b2}/y");
}

#[test]
fn script_clone_ignores_statics() {
    let mut rt = RegExpRuntime::new();
    rt.statics_mut().set_flags(RegExpFlag::MULTILINE);
    let obj = RegExpObject::create_no_statics("a", flags("i")).unwrap();
    let copy = clone_script_regexp(&obj).unwrap();
    assert_eq!(copy.flags(), flags("i"));
    assert!(!copy.has_shared());
}
