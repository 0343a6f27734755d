//! In-memory key record store.

use crate::error::StoreResult;
use crate::store::KeyStore;
use async_trait::async_trait;
use keygate_types::{KeyId, KeyRecord};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// `KeyStore` backed by a process-local map.
///
/// Single-key operations are atomic under the inner lock, matching the
/// contract real backends provide. Nothing here serializes multi-step
/// sequences; that stays with the caller.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<KeyId, KeyRecord>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if no records are stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl KeyStore for MemoryStore {
    async fn get(&self, key_id: &KeyId) -> StoreResult<Option<KeyRecord>> {
        Ok(self.records.read().await.get(key_id).cloned())
    }

    async fn set(&self, record: KeyRecord) -> StoreResult<()> {
        self.records
            .write()
            .await
            .insert(record.key_id().clone(), record);
        Ok(())
    }

    async fn delete(&self, key_id: &KeyId) -> StoreResult<bool> {
        Ok(self.records.write().await.remove(key_id).is_some())
    }

    async fn list_keys(&self) -> StoreResult<Vec<KeyId>> {
        let mut keys: Vec<KeyId> = self.records.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn multi_get(&self, key_ids: &[KeyId]) -> StoreResult<Vec<Option<KeyRecord>>> {
        let records = self.records.read().await;
        Ok(key_ids.iter().map(|k| records.get(k).cloned()).collect())
    }
}
