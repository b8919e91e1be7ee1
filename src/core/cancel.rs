// noveldup - core/cancel.rs
//
// Cancellation token shared between the caller and the pipeline's
// background worker thread. Mirrors the `Arc<AtomicBool>` cancel-flag
// pattern used elsewhere for interruptible background work: the flag is
// checked at stage boundaries and between blocks (§5), never inside a
// single pair evaluation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cheaply cloneable flag the caller can set to request that an in-flight
/// `analyze` call abort at its next suspension point.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
