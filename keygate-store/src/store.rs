//! The key record store contract.

use crate::error::StoreResult;
use async_trait::async_trait;
use keygate_types::{KeyId, KeyRecord};

/// Abstract key record store.
///
/// Backends must provide atomic single-key writes: a `set` either lands in
/// full or not at all, and a concurrent `get` sees the old or the new record,
/// never a torn one. No cross-key transactionality is assumed anywhere.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Fetches the record for a key, or `None` if absent.
    async fn get(&self, key_id: &KeyId) -> StoreResult<Option<KeyRecord>>;

    /// Writes a record, overwriting any previous record for the same key.
    async fn set(&self, record: KeyRecord) -> StoreResult<()>;

    /// Deletes the record for a key. Returns whether a record existed.
    async fn delete(&self, key_id: &KeyId) -> StoreResult<bool>;

    /// Lists the identifiers of all stored records.
    async fn list_keys(&self) -> StoreResult<Vec<KeyId>>;

    /// Fetches records for many keys in one call, position-aligned with the
    /// input; absent keys yield `None` at their position.
    async fn multi_get(&self, key_ids: &[KeyId]) -> StoreResult<Vec<Option<KeyRecord>>>;
}
