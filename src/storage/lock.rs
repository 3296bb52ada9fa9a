use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Hands out one write lock per collection.
///
/// Mutations hold the lock across their whole read-modify-write cycle, so two
/// writers on the same collection can never interleave. Clones share the
/// same lock table.
#[derive(Debug, Default, Clone)]
pub struct LockManager {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, collection: &str) -> Arc<AsyncMutex<()>> {
        // A poisoned table is still a valid map.
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(collection.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Waits for exclusive write access to `collection`.
    pub async fn write_lock(&self, collection: &str) -> OwnedMutexGuard<()> {
        self.lock_for(collection).lock_owned().await
    }

    /// The number of collections a lock has been created for.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
