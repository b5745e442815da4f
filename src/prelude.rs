// prelude.rs - Convenient re-exports.
//
//! # Prelude
//!
//! ```
//! use ferrexp::prelude::*;
//!
//! let re = Regex::new(r"\d+").unwrap();
//! let text = LinearString::from("answer: 42");
//! let m = re.find(&text).unwrap().unwrap();
//! assert_eq!(m.to_string_lossy(), "42");
//! ```

pub use crate::api::{Captures, FindIter, Match, MatchResult, Regex, RegexBuilder};
pub use crate::error::RegexError;
pub use crate::input::{CharWidth, Chars, LinearString};
pub use crate::interrupt::{InterruptHandle, InterruptResult};
pub use crate::matchpairs::{MatchPair, MatchPairs, ScopedMatchPairs, VectorMatchPairs};
pub use crate::regflags::{parse_regexp_flags, RegExpFlag};
pub use crate::regobject::RegExpObject;
pub use crate::regshared::{RegExpGuard, RegExpRunStatus};
pub use crate::runtime::{RegExpRuntime, RuntimeOptions};
