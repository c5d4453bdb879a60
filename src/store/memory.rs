use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::SnapshotStore;
use crate::utils::error::StoreError;

/// Keeps snapshots in process memory. Nothing survives a restart.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    slots: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots that exist, written or not.
    pub async fn slot_count(&self) -> usize {
        self.slots.read().await.len()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn initialize(&self, names: &[String]) -> Result<(), StoreError> {
        let mut slots = self.slots.write().await;
        for name in names {
            slots.entry(name.clone()).or_default();
        }
        Ok(())
    }

    async fn load_raw(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let slots = self.slots.read().await;
        Ok(slots.get(name).cloned())
    }

    async fn save_raw(&self, name: &str, payload: &[u8]) -> Result<(), StoreError> {
        let mut slots = self.slots.write().await;
        slots.insert(name.to_string(), payload.to_vec());
        Ok(())
    }
}
