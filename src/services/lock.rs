//! Per-article mutation locks
//!
//! Mutations of one article (update, delete, favorite toggles, comment
//! add/delete) run one at a time; different slugs proceed in parallel.
//! Reads never take these locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Table of async mutexes keyed by slug
#[derive(Debug, Default)]
pub struct SlugLocks {
    table: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SlugLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `slug`. Access is released when the
    /// guard is dropped.
    pub async fn acquire(&self, slug: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries only the table references are idle.
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
            table.entry(slug.to_string()).or_default().clone()
        };
        if let Ok(guard) = lock.clone().try_lock_owned() {
            return guard;
        }
        tracing::debug!("Waiting for lock on article '{}'", slug);
        lock.lock_owned().await
    }

    /// Number of slugs currently tracked
    pub fn tracked(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
