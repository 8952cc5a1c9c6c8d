//! Shutdown request flag shared between signal handlers and receive loops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Set once from outside the receive loop; observed at the top of every
/// loop iteration and between interrupted receive waits.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Idempotent; safe to call from any thread.
    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
