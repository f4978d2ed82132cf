use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-material mutexes serializing check-then-act sequences on stock.
///
/// Allocation holds a material's guard across its whole transaction so two
/// requests can never both observe the same free quantity.
#[derive(Clone, Default)]
pub struct MaterialLocks(Arc<DashMap<i64, Arc<Mutex<()>>>>);

impl MaterialLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, material_id: i64) -> OwnedMutexGuard<()> {
        // clone the Arc out so the shard lock is released before awaiting
        let lock = self
            .0
            .entry(material_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drops entries nobody is holding or waiting on.
    pub fn prune(&self) {
        self.0.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for MaterialLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaterialLocks")
            .field("materials", &self.0.len())
            .finish()
    }
}
