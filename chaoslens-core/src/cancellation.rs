use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Checked by the capture engine between tiles.
pub trait CancellationChecker {
    fn is_cancelled(&self) -> bool;
}

/// For captures that always run to completion.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverCancel;

impl CancellationChecker for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Reads a shared flag, typically set from a UI or signal handler thread.
#[derive(Clone, Debug, Default)]
pub struct AtomicBoolChecker {
    flag: Arc<AtomicBool>,
}

impl AtomicBoolChecker {
    pub fn new(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }

    /// Handle for requesting cancellation.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }
}

impl CancellationChecker for AtomicBoolChecker {
    fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
