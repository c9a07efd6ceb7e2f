//! # Completion gate: one-shot, multi-waiter synchronization.
//!
//! A [`Gate`] marks "primary processing for this message is done". It starts
//! unset, is set exactly once by the handler (setting an already-set gate is
//! a no-op), and any number of waiters may observe the transition through
//! [`Gate::done`]. A set that happens before a `done()` call is observed
//! immediately.

use tokio_util::sync::CancellationToken;

/// One-shot completion signal with any number of waiters.
///
/// Cloning produces another handle to the same gate.
#[derive(Clone, Debug, Default)]
pub struct Gate {
    inner: CancellationToken,
}

impl Gate {
    /// Creates a fresh, unset gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the gate. Idempotent: repeated calls have no further effect.
    pub fn set(&self) {
        self.inner.cancel();
    }

    /// Returns true once the gate has been set.
    pub fn is_set(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Waits until the gate is set. Completes immediately if it already is.
    pub async fn done(&self) {
        self.inner.cancelled().await;
    }
}
