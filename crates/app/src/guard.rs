//! Check-and-set flag with a guaranteed release.

use std::sync::atomic::{AtomicBool, Ordering};

/// Holds an [`AtomicBool`] set for as long as it is alive.
///
/// The flag is cleared on drop, including when the holder unwinds or its
/// future is cancelled.
#[derive(Debug)]
pub struct FlagGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> FlagGuard<'a> {
    /// Set the flag, or return `None` if somebody else holds it.
    #[must_use]
    pub fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
