use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// One async mutex per calendar mapping, created on demand.
#[derive(Default)]
pub struct SyncLocks {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SyncLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `mapping_id`. Held until the guard drops.
    pub async fn acquire(&self, mapping_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Drop entries nobody holds or waits on
            locks.retain(|id, lock| *id == mapping_id || Arc::strong_count(lock) > 1);
            locks
                .entry(mapping_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    pub async fn is_locked(&self, mapping_id: Uuid) -> bool {
        let locks = self.locks.lock().await;
        locks
            .get(&mapping_id)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }
}
