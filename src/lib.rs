//! # Ferrexp
//!
//! Regular-expression engine core: pattern compilation, a per-domain cache
//! of shared compiled patterns, and match execution over Latin-1 or UTF-16
//! input, with a native tier for straight-line patterns and a backtracking
//! bytecode interpreter for everything else.
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrexp::prelude::*;
//!
//! let re = Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap();
//! let text = LinearString::from("Date: 2026-02-12");
//! let m = re.find(&text).unwrap().unwrap();
//! assert_eq!(m.to_string_lossy(), "2026-02-12");
//! assert_eq!(m.start(), 6);
//! ```
//!
//! ## Engine-Level API
//!
//! Shared records are obtained from a runtime's registry and executed
//! directly against a capture buffer:
//!
//! ```rust
//! use ferrexp::prelude::*;
//!
//! let mut rt = RegExpRuntime::new();
//! let guard = rt.get_shared_with_flag_str("a", "y").unwrap();
//! let text = LinearString::from("xxa");
//!
//! let mut pairs = ScopedMatchPairs::new();
//! let status = rt.execute(&guard, text.chars(), 2, Some(&mut pairs)).unwrap();
//! assert_eq!(status, RegExpRunStatus::Success);
//! assert_eq!(pairs.get(0), MatchPair::new(2, 3));
//! ```
//!
//! ## Module Structure
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`regflags`] | Flag bitset, flag-string parsing, `/source/flags` rendering |
//! | [`matchpairs`] | Capture offset buffers (scoped and growable) |
//! | [`input`] | Latin-1 / UTF-16 input views |
//! | [`regparse`] | Pattern parser |
//! | [`regcomp`] | Code generation (native tier or bytecode) |
//! | [`regexec`] | Bytecode interpreter |
//! | [`regnative`] | Native routines |
//! | [`regint`] | Internal types, opcodes and config constants |
//! | [`regshared`] | Shared pattern records and the execution engine |
//! | [`regcompartment`] | Pattern registry, tracing and sweeping |
//! | [`regobject`] | Pattern-bearing values with lastIndex semantics |
//! | [`runtime`] | Execution domain and options |
//! | [`interrupt`] | Cooperative interruption |
//! | [`xdr`] | Pattern serialization |
//! | [`api`] | Match results and the `Regex` wrapper |

pub mod api;
pub mod error;
pub mod input;
pub mod interrupt;
pub mod matchpairs;
pub mod prelude;
pub mod regcomp;
pub mod regcompartment;
pub mod regexec;
pub mod regflags;
pub mod regint;
pub mod regnative;
pub mod regobject;
pub mod regparse;
pub mod regparse_types;
pub mod regshared;
pub mod runtime;
pub mod xdr;
