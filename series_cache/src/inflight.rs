//! Per-series backfill locks.
//!
//! Callers that found gaps in the same series take turns: the first one
//! backfills, the rest wait on the same lock and then re-read the store.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, Weak},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of one async lock per series key.
///
/// Entries are weak; a lock lives only while some caller holds or awaits it.
#[derive(Debug, Default)]
pub struct InflightRegistry {
    locks: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl InflightRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive backfill rights on `series`.
    pub async fn acquire(&self, series: &str) -> OwnedMutexGuard<()> {
        self.lock_for(series).lock_owned().await
    }

    fn lock_for(&self, series: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| lock.strong_count() > 0);

        if let Some(lock) = locks.get(series).and_then(Weak::upgrade) {
            return lock;
        }
        let lock = Arc::new(AsyncMutex::new(()));
        locks.insert(series.to_string(), Arc::downgrade(&lock));
        lock
    }

    /// Series that currently have a live lock.
    pub fn active(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|lock| lock.strong_count() > 0)
            .count()
    }
}
