// interrupt.rs - Cooperative interruption of running matches.
//
// Any thread may raise the flag through an InterruptHandle. Matchers poll it
// and stop with an "interrupted" outcome; the engine then services the
// request through the runtime's callback and either retries or aborts.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared interrupt flag.
#[derive(Clone, Default)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
}

impl InterruptHandle {
    pub fn new() -> Self {
        InterruptHandle {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Ask running matches to stop at their next check.
    pub fn request(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Clear the flag, returning whether it was set.
    pub(crate) fn take(&self) -> bool {
        self.flag.swap(false, Ordering::AcqRel)
    }
}

impl fmt::Debug for InterruptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptHandle")
            .field("requested", &self.is_requested())
            .finish()
    }
}

/// Decision returned by an interrupt callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterruptResult {
    /// Resume: the interrupted match is restarted.
    Continue,
    /// Terminate: the match fails with `RegexError::Interrupted`.
    Abort,
}

/// Host hook run when a pending interrupt is serviced.
pub trait InterruptCallback {
    fn on_interrupt(&self) -> InterruptResult;
}

impl<F> InterruptCallback for F
where
    F: Fn() -> InterruptResult,
{
    fn on_interrupt(&self) -> InterruptResult {
        self()
    }
}

/// Service a pending interrupt. With no pending request this is a no-op that
/// returns `Continue`.
pub fn poll_interrupt(
    handle: &InterruptHandle,
    callback: Option<&dyn InterruptCallback>,
) -> InterruptResult {
    if !handle.take() {
        return InterruptResult::Continue;
    }
    match callback {
        Some(cb) => cb.on_interrupt(),
        None => InterruptResult::Continue,
    }
}
