//! Single-flight guard for lifecycle operations.

use std::sync::atomic::{AtomicBool, Ordering};

/// Held while an `initialize`, a transition or a registry mutation runs.
/// Released on drop, including when an in-flight future is dropped.
pub(crate) struct Flight<'a> {
    flag: &'a AtomicBool,
}

impl<'a> Flight<'a> {
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
