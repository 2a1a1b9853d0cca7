//! Per-project rebuild locks
//!
//! Rebuilds of one project run one at a time; different projects never wait
//! on each other here. Lock entries are created on first use and kept until
//! the project is deleted.

use dashmap::DashMap;
use revgantt_storage::ProjectId;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default, Clone)]
pub struct ProjectLocks {
    locks: Arc<DashMap<ProjectId, Arc<Mutex<()>>>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a project
    pub async fn acquire(&self, project_id: ProjectId) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the shard lock isn't held across the await
        let lock = self
            .locks
            .entry(project_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drop the lock entry of a deleted project
    pub fn forget(&self, project_id: ProjectId) {
        self.locks.remove(&project_id);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
