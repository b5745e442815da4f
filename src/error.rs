// error.rs - Error types for Ferrexp.
//
// Compile-time, flag-parse and execution failures share one enum. Interrupt
// aborts that the engine retries never surface here.

use std::fmt;

/// Error type for flag parsing, pattern compilation and match execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegexError {
    /// Memory allocation failure.
    Memory,
    /// Malformed pattern source.
    Syntax { offset: usize, message: String },
    /// Code generation failed (e.g. the program grew past its size cap).
    Compile { message: String },
    /// A flag letter outside `g`, `i`, `m`, `y`.
    InvalidFlag(char),
    /// A flag letter given twice.
    DuplicateFlag(char),
    /// The matcher ran out of backtrack stack.
    OverRecursed,
    /// The interrupt callback asked for termination.
    Interrupted,
    /// Invalid argument passed to a function (bad offset, corrupt encoding).
    InvalidArgument(&'static str),
    /// Internal engine bug (should not occur in correct usage).
    InternalBug { message: String },
}

impl RegexError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        RegexError::Syntax {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn compile(message: impl Into<String>) -> Self {
        RegexError::Compile {
            message: message.into(),
        }
    }

    /// True for errors raised while turning a pattern into code.
    ///
    /// These are not transient: compiling the same pattern again fails the
    /// same way.
    pub fn is_compile_error(&self) -> bool {
        matches!(self, RegexError::Syntax { .. } | RegexError::Compile { .. })
    }

    /// True for flag-string errors.
    pub fn is_flag_error(&self) -> bool {
        matches!(self, RegexError::InvalidFlag(_) | RegexError::DuplicateFlag(_))
    }
}

impl fmt::Display for RegexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegexError::Memory => write!(f, "memory allocation failed"),
            RegexError::Syntax { offset, message } => {
                write!(f, "syntax error at offset {}: {}", offset, message)
            }
            RegexError::Compile { message } => write!(f, "compile error: {}", message),
            RegexError::InvalidFlag(c) => write!(f, "invalid regular expression flag {}", c),
            RegexError::DuplicateFlag(c) => {
                write!(f, "duplicate regular expression flag {}", c)
            }
            RegexError::OverRecursed => write!(f, "too much recursion"),
            RegexError::Interrupted => write!(f, "execution interrupted"),
            RegexError::InvalidArgument(what) => write!(f, "invalid argument: {}", what),
            RegexError::InternalBug { message } => write!(f, "internal error: {}", message),
        }
    }
}

impl std::error::Error for RegexError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_display() {
        let err = RegexError::syntax(3, "unterminated group");
        assert!(err.is_compile_error());
        assert_eq!(err.to_string(), "syntax error at offset 3: unterminated group");
    }

    #[test]
    fn flag_errors_report_char() {
        let err = RegexError::DuplicateFlag('g');
        assert!(err.is_flag_error());
        assert!(!err.is_compile_error());
        assert_eq!(err.to_string(), "duplicate regular expression flag g");
        assert_eq!(
            RegexError::InvalidFlag('x').to_string(),
            "invalid regular expression flag x"
        );
    }

    #[test]
    fn compile_error_is_compile_error() {
        assert!(RegexError::compile("program too large").is_compile_error());
        assert!(!RegexError::OverRecursed.is_compile_error());
    }

    #[test]
    fn error_trait() {
        let err: Box<dyn std::error::Error> = Box::new(RegexError::OverRecursed);
        assert_eq!(err.to_string(), "too much recursion");
    }
}
