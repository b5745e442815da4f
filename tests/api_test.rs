// api_test.rs - Integration tests for the Regex wrapper and interruption.

use std::cell::Cell;
use std::rc::Rc;

use ferrexp::api::{Regex, RegexBuilder};
use ferrexp::error::RegexError;
use ferrexp::prelude::*;

fn text(s: &str) -> LinearString {
    LinearString::from(s)
}

// === Regex::new ===

#[test]
fn simple_pattern() {
    let re = Regex::new(r"\d+").unwrap();
    let t = text("abc 123 def");
    let m = re.find(&t).unwrap().unwrap();
    assert_eq!(m.to_string_lossy(), "123");
    assert_eq!(m.range(), 4..7);
}

#[test]
fn wide_text() {
    let re = Regex::new("\u{305b}+").unwrap();
    let t = text("hello \u{305b}\u{305b} world");
    let m = re.find(&t).unwrap().unwrap();
    assert_eq!(m.to_string_lossy(), "\u{305b}\u{305b}");
    assert_eq!(m.start(), 6);
}

#[test]
fn no_match_returns_none() {
    let re = Regex::new("xyz").unwrap();
    assert!(re.find(&text("abc")).unwrap().is_none());
    assert!(!re.is_match(&text("abc")).unwrap());
}

#[test]
fn empty_pattern() {
    let re = Regex::new("").unwrap();
    let t = text("hello");
    let m = re.find(&t).unwrap().unwrap();
    assert_eq!(m.start(), 0);
    assert_eq!(m.end(), 0);
    assert!(m.is_empty());
}

#[test]
fn invalid_pattern_syntax_error() {
    let err = Regex::new("(unclosed").unwrap_err();
    assert!(matches!(err, RegexError::Syntax { offset: 0, .. }), "got {:?}", err);
    assert!(err.is_compile_error());
}

#[test]
fn invalid_flags() {
    assert_eq!(Regex::with_flags("a", "x").unwrap_err(), RegexError::InvalidFlag('x'));
    assert!(Regex::with_flags("a", "ii").unwrap_err().is_flag_error());
}

#[test]
fn display_and_accessors() {
    let re = Regex::with_flags("a(b)(c)?", "mi").unwrap();
    assert_eq!(re.to_string(), "/a(b)(c)?/im");
    assert_eq!(re.source(), "a(b)(c)?");
    assert_eq!(re.captures_len(), 2);
}

#[test]
fn huge_repeat_bound_fails_to_compile() {
    let re = Regex::new("a{0,4294967295}").unwrap();
    let err = re.find(&text("aaa")).unwrap_err();
    assert!(matches!(err, RegexError::Compile { .. }), "got {:?}", err);
}

// === Captures ===

#[test]
fn captures_groups() {
    let re = Regex::new(r"(\d{4})-(\d{2})-(\d{2})").unwrap();
    let t = text("Date: 2026-02-12");
    let caps = re.captures(&t).unwrap().unwrap();
    assert_eq!(caps.len(), 4);
    assert_eq!(caps.get(1).unwrap().to_string_lossy(), "2026");
    assert_eq!(caps.get(2).unwrap().to_string_lossy(), "02");
    assert_eq!(caps.get(3).unwrap().to_string_lossy(), "12");
    assert!(caps.get(4).is_none());
}

#[test]
fn captures_unset_group() {
    let re = Regex::new("(a)|(b)").unwrap();
    let t = text("b");
    let caps = re.captures(&t).unwrap().unwrap();
    assert!(caps.get(1).is_none());
    assert_eq!(caps.get(2).unwrap().range(), 0..1);
    let collected: Vec<bool> = caps.iter().map(|m| m.is_some()).collect();
    assert_eq!(collected, vec![true, false, true]);
}

// === find_iter ===

#[test]
fn find_iter_collects_all() {
    let re = Regex::new(r"\d+").unwrap();
    let t = text("a1bb22ccc333");
    let found: Vec<String> = re
        .find_iter(&t)
        .map(|m| m.unwrap().to_string_lossy())
        .collect();
    assert_eq!(found, vec!["1", "22", "333"]);
}

#[test]
fn find_iter_empty_matches_advance() {
    let re = Regex::new("a*").unwrap();
    let t = text("baa");
    let ranges: Vec<_> = re.find_iter(&t).map(|m| m.unwrap().range()).collect();
    assert_eq!(ranges, vec![0..0, 1..3, 3..3]);
}

// === RegexBuilder ===

#[test]
fn builder_flags() {
    let re = RegexBuilder::new("^world$")
        .multi_line(true)
        .case_insensitive(true)
        .build()
        .unwrap();
    assert!(re.is_match(&text("hello\nWORLD")).unwrap());
    assert_eq!(re.flags(), RegExpFlag::MULTILINE | RegExpFlag::IGNORE_CASE);
}

#[test]
fn builder_sticky() {
    let re = Regex::builder("b").sticky(true).build().unwrap();
    assert!(re.find(&text("ab")).unwrap().is_none());
    assert!(re.is_match(&text("ba")).unwrap());
}

#[test]
fn builder_backtrack_limit() {
    let re = Regex::builder("(x|y)*z").backtrack_limit(500).build().unwrap();
    let err = re.is_match(&text(&"x".repeat(2000))).unwrap_err();
    assert_eq!(err, RegexError::OverRecursed);
    let re = Regex::new("(x|y)*z").unwrap();
    assert!(!re.is_match(&text(&"x".repeat(2000))).unwrap());
}

// === Interruption ===

#[test]
fn pending_interrupt_continues_by_default() {
    let mut rt = RegExpRuntime::new();
    let guard = rt.get_shared("(a|b)+c", RegExpFlag::empty());
    rt.interrupt_handle().request();
    let t = text("ababc");
    let status = rt.execute(&guard, t.chars(), 0, None).unwrap();
    assert_eq!(status, RegExpRunStatus::Success);
    assert!(!rt.interrupt_handle().is_requested());
}

#[test]
fn interrupt_callback_aborts() {
    let mut rt = RegExpRuntime::new();
    let calls = Rc::new(Cell::new(0));
    let seen = calls.clone();
    rt.set_interrupt_callback(move || {
        seen.set(seen.get() + 1);
        InterruptResult::Abort
    });
    let guard = rt.get_shared("(a|b)+c", RegExpFlag::empty());
    rt.interrupt_handle().request();
    let t = text("ababc");
    assert_eq!(rt.execute(&guard, t.chars(), 0, None).unwrap_err(), RegexError::Interrupted);
    assert_eq!(calls.get(), 1);

    // the record is still usable after an abort
    assert_eq!(rt.execute(&guard, t.chars(), 0, None).unwrap(), RegExpRunStatus::Success);
}

#[test]
fn interrupt_from_another_thread() {
    let rt = RegExpRuntime::new();
    let handle = rt.interrupt_handle();
    std::thread::spawn(move || handle.request()).join().unwrap();
    assert!(rt.interrupt_handle().is_requested());
}

#[test]
fn start_past_end_is_rejected() {
    let mut rt = RegExpRuntime::new();
    let guard = rt.get_shared("a", RegExpFlag::empty());
    let t = text("ab");
    assert!(rt.execute(&guard, t.chars(), 2, None).is_ok());
    assert!(matches!(
        rt.execute(&guard, t.chars(), 3, None),
        Err(RegexError::InvalidArgument(_))
    ));
}
