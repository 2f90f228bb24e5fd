// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-key async mutexes.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A lazily-populated map of async mutexes, one per key.
pub(crate) struct KeyedLocks<K: Eq + Hash> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub(crate) fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Wait for exclusive access to `key`.
    pub(crate) async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the shard guard is released before awaiting.
        let mutex = Arc::clone(self.locks.entry(key.clone()).or_default().value());
        mutex.lock_owned().await
    }

    /// Drop the entry for `key` if nobody holds or waits on it.
    ///
    /// The strong count is checked under the shard write lock, so no new
    /// handle can be cloned out concurrently.
    pub(crate) fn release(&self, key: &K) {
        self.locks.remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}
