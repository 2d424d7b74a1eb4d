//! Scoped "typing…" indicator.
//!
//! A [`TypingGuard`] is returned by [`Session::typing`](crate::Session::typing)
//! and stops the indicator when dropped. The dispatcher holds one across each
//! handler invocation, so the indicator is closed on normal return, on a
//! handler error, on a caught panic, and when the dispatch future itself is
//! dropped.

use std::fmt;

type StopFn = Box<dyn FnOnce() + Send>;

/// Guard that keeps a typing indicator alive until dropped.
#[must_use = "the typing indicator stops as soon as the guard is dropped"]
pub struct TypingGuard {
    stop: Option<StopFn>,
}

impl TypingGuard {
    /// Creates a guard that runs `stop` exactly once when dropped.
    pub fn new(stop: impl FnOnce() + Send + 'static) -> Self {
        Self {
            stop: Some(Box::new(stop)),
        }
    }

    /// A guard for platforms without a typing indicator.
    pub fn noop() -> Self {
        Self { stop: None }
    }

    /// Returns `true` if dropping this guard will run a stop callback.
    pub fn is_active(&self) -> bool {
        self.stop.is_some()
    }
}

impl Default for TypingGuard {
    fn default() -> Self {
        Self::noop()
    }
}

impl Drop for TypingGuard {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop();
        }
    }
}

impl fmt::Debug for TypingGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypingGuard")
            .field("active", &self.is_active())
            .finish()
    }
}
