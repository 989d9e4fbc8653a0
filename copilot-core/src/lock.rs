//! Poison-tolerant locking for the in-memory caches.

use std::sync::{Mutex, MutexGuard};

/// Lock `mutex`, taking over its data if an earlier holder panicked.
///
/// Every guarded value here is a cache or a flag that stays consistent
/// between statements, so the data is still usable after a poisoning panic.
pub(crate) fn lock<'a, T>(mutex: &'a Mutex<T>, name: &'static str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        tracing::warn!(lock = name, "Recovered poisoned lock");
        poisoned.into_inner()
    })
}
