// runtime.rs - Execution domain.
//
// A RegExpRuntime owns everything one mutator needs to compile and run
// patterns: options, the pattern registry, the interrupt flag and callback,
// the code generator and the per-domain statics. Creating it is the domain's
// init hook; dropping it tears the registry down.

use std::fmt;

use crate::error::RegexError;
use crate::input::Chars;
use crate::interrupt::{InterruptCallback, InterruptHandle};
use crate::matchpairs::MatchPairs;
use crate::regcomp::{CodeGenerator, DefaultCodeGenerator};
use crate::regcompartment::{HeapState, RegExpCompartment, SweepStats};
use crate::regexec::ExecLimits;
use crate::regflags::RegExpFlag;
use crate::regint::*;
use crate::regobject::RegExpStatics;
use crate::regshared::{Atom, ExecEnv, RegExpGuard, RegExpRunStatus};

// ============================================================================
// RuntimeOptions
// ============================================================================

/// Tunables for one execution domain.
///
/// # Examples
///
/// ```
/// use ferrexp::runtime::{RegExpRuntime, RuntimeOptions};
///
/// let options = RuntimeOptions::default()
///     .with_backtrack_limit(10_000)
///     .with_native_tier(false);
/// let rt = RegExpRuntime::with_options(options);
/// assert_eq!(rt.options().backtrack_limit, 10_000);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeOptions {
    /// Backtrack stack entries allowed before a match fails with
    /// `OverRecursed`.
    pub backtrack_limit: usize,
    /// Upper bound on generated bytecode length.
    pub max_program_len: usize,
    /// Let the code generator emit native routines.
    pub native_tier: bool,
    /// Backtracks between interrupt checks inside one match attempt.
    pub interrupt_check_interval: u32,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        RuntimeOptions {
            backtrack_limit: DEFAULT_BACKTRACK_LIMIT,
            max_program_len: DEFAULT_MAX_PROGRAM_LEN,
            native_tier: true,
            interrupt_check_interval: DEFAULT_INTERRUPT_CHECK_INTERVAL,
        }
    }
}

impl RuntimeOptions {
    pub fn with_backtrack_limit(mut self, limit: usize) -> Self {
        self.backtrack_limit = limit;
        self
    }

    pub fn with_max_program_len(mut self, len: usize) -> Self {
        self.max_program_len = len;
        self
    }

    pub fn with_native_tier(mut self, yes: bool) -> Self {
        self.native_tier = yes;
        self
    }

    pub fn with_interrupt_check_interval(mut self, interval: u32) -> Self {
        self.interrupt_check_interval = interval;
        self
    }

    pub fn limits(&self) -> ExecLimits {
        ExecLimits {
            backtrack_limit: self.backtrack_limit,
            interrupt_check_interval: self.interrupt_check_interval,
        }
    }
}

// ============================================================================
// RegExpRuntime
// ============================================================================

pub struct RegExpRuntime {
    options: RuntimeOptions,
    compartment: RegExpCompartment,
    interrupt: InterruptHandle,
    callback: Option<Box<dyn InterruptCallback>>,
    generator: Box<dyn CodeGenerator>,
    statics: RegExpStatics,
}

impl RegExpRuntime {
    pub fn new() -> Self {
        Self::with_options(RuntimeOptions::default())
    }

    pub fn with_options(options: RuntimeOptions) -> Self {
        let generator = DefaultCodeGenerator {
            native_tier: options.native_tier,
            max_program_len: options.max_program_len,
        };
        RegExpRuntime {
            options,
            compartment: RegExpCompartment::new(),
            interrupt: InterruptHandle::new(),
            callback: None,
            generator: Box::new(generator),
            statics: RegExpStatics::default(),
        }
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// Replace the code generator. Records compiled earlier keep their code.
    pub fn set_code_generator(&mut self, generator: Box<dyn CodeGenerator>) {
        self.generator = generator;
    }

    /// Install the hook consulted when a match is interrupted. Without one,
    /// interrupted matches are always retried.
    pub fn set_interrupt_callback(&mut self, callback: impl InterruptCallback + 'static) {
        self.callback = Some(Box::new(callback));
    }

    /// A handle other threads can use to interrupt this domain's matches.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    pub fn compartment(&self) -> &RegExpCompartment {
        &self.compartment
    }

    pub fn compartment_mut(&mut self) -> &mut RegExpCompartment {
        &mut self.compartment
    }

    pub fn statics(&self) -> &RegExpStatics {
        &self.statics
    }

    pub fn statics_mut(&mut self) -> &mut RegExpStatics {
        &mut self.statics
    }

    /// Shared record for (source, flags).
    pub fn get_shared(&mut self, source: &str, flags: RegExpFlag) -> RegExpGuard {
        self.compartment.get(&Atom::from(source), flags)
    }

    pub fn get_shared_with_flag_str(&mut self, source: &str, flags: &str) -> Result<RegExpGuard, RegexError> {
        self.compartment.get_with_flag_str(&Atom::from(source), flags)
    }

    pub(crate) fn env(&self) -> ExecEnv<'_> {
        ExecEnv {
            generator: self.generator.as_ref(),
            limits: self.options.limits(),
            interrupt: &self.interrupt,
            callback: self.callback.as_deref(),
        }
    }

    /// Run `guard`'s pattern over `input` from `start`. See
    /// [`RegExpShared::execute`](crate::regshared::RegExpShared::execute).
    pub fn execute(
        &self,
        guard: &RegExpGuard,
        input: Chars<'_>,
        start: usize,
        matches: Option<&mut dyn MatchPairs>,
    ) -> Result<RegExpRunStatus, RegexError> {
        guard.execute(&self.env(), input, start, matches)
    }

    pub fn sweep(&mut self, heap: &dyn HeapState) -> SweepStats {
        self.compartment.sweep(heap)
    }
}

impl Default for RegExpRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RegExpRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegExpRuntime")
            .field("options", &self.options)
            .field("compartment", &self.compartment)
            .field("statics", &self.statics)
            .finish_non_exhaustive()
    }
}
