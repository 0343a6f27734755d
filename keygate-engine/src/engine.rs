//! The license state engine.
//!
//! Owns the key/device state machine: resolution, verify, bind, unbind,
//! and the admin surface. All decisions operate on [`KeyRecord`]s fetched
//! from an abstract [`KeyStore`].
//!
//! Concurrency: the engine keeps one async mutex per key and holds it
//! across every mutating operation (bind, unbind, create, delete,
//! reschedule, capacity change). Verify and list are read-only and take
//! no lock; the store's atomic single-key reads are enough for them.
//! Lock entries are pruned once no task holds them, so the map tracks
//! live contention, not every key a client ever named.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::outcome::{
    AddRejection, AdminAddResponse, AdminDelResponse, AdminListResponse, AdminSetCapacityResponse,
    AdminSetExpireResponse, BindResponse, Denial, KeySummary, UnbindResponse, VerifyResponse,
};
use chrono::Utc;
use keygate_store::{KeyStore, StoreResult};
use keygate_types::{BindOutcome, DeviceId, KeyId, KeyRecord, KeyTemplate, UnbindOutcome};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// The license state engine.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct LicenseEngine {
    store: Arc<dyn KeyStore>,
    config: EngineConfig,
    /// One mutex per key with at least one task in a mutating section.
    /// The map mutex itself is only held long enough to clone an entry
    /// out or to prune one.
    locks: Mutex<HashMap<KeyId, Arc<Mutex<()>>>>,
}

impl LicenseEngine {
    /// Creates an engine over the given store.
    pub fn new(store: Arc<dyn KeyStore>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Store access ─────────────────────────────────────────────

    /// Runs a store call under the configured deadline. A call that does
    /// not return in time is fatal for this request, never retried here.
    async fn with_deadline<T, F>(&self, call: F) -> EngineResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match timeout(self.config.store_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!(timeout = ?self.config.store_timeout, "store call timed out");
                Err(EngineError::StoreTimeout(self.config.store_timeout))
            }
        }
    }

    async fn store_get(&self, key_id: &KeyId) -> EngineResult<Option<KeyRecord>> {
        self.with_deadline(self.store.get(key_id)).await
    }

    async fn store_set(&self, record: KeyRecord) -> EngineResult<()> {
        self.with_deadline(self.store.set(record)).await
    }

    async fn store_delete(&self, key_id: &KeyId) -> EngineResult<bool> {
        self.with_deadline(self.store.delete(key_id)).await
    }

    // ── Per-key serialization ────────────────────────────────────

    async fn key_lock(&self, key_id: &KeyId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(key_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops a key's lock entry when no other task holds a clone. The
    /// caller must have released its guard first; checking under the map
    /// lock makes the count race-free against `key_lock`.
    async fn prune_key_lock(&self, key_id: &KeyId, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        // two strong refs left: ours and the map's entry
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(key_id);
        }
    }

    /// Number of per-key lock entries currently retained. Tracks live
    /// contention only; exposed for diagnostics.
    pub async fn retained_locks(&self) -> usize {
        self.locks.lock().await.len()
    }

    // ── Resolution ───────────────────────────────────────────────

    fn provisionable(&self, key_id: &KeyId) -> bool {
        self.config.auto_provision && self.config.presets.contains_key(key_id)
    }

    /// Resolution with the caller already holding the key's lock: store
    /// hit wins, otherwise a preset template (when auto-provisioning is
    /// on) materializes and persists a fresh record.
    async fn load_locked(&self, key_id: &KeyId) -> EngineResult<Option<KeyRecord>> {
        if let Some(record) = self.store_get(key_id).await? {
            return Ok(Some(record));
        }
        if !self.provisionable(key_id) {
            return Ok(None);
        }
        // contains_key above makes this lookup infallible
        let Some(template) = self.config.presets.get(key_id) else {
            return Ok(None);
        };
        let record = KeyRecord::from_template(key_id.clone(), template, Utc::now());
        self.store_set(record.clone()).await?;
        info!(
            key = %key_id,
            max_devices = record.max_devices(),
            "provisioned key from preset template"
        );
        Ok(Some(record))
    }

    /// Lock-free resolution for read-only callers. Only takes the key's
    /// lock when a provisioning write is actually needed, so the common
    /// verify path stays a single store read.
    async fn load(&self, key_id: &KeyId) -> EngineResult<Option<KeyRecord>> {
        if let Some(record) = self.store_get(key_id).await? {
            return Ok(Some(record));
        }
        if !self.provisionable(key_id) {
            return Ok(None);
        }
        let lock = self.key_lock(key_id).await;
        let guard = lock.lock().await;
        let result = self.load_locked(key_id).await;
        drop(guard);
        self.prune_key_lock(key_id, lock).await;
        result
    }

    // ── Client operations ────────────────────────────────────────

    /// Decides whether a device is currently authorized under a key.
    /// Read-only; expiry dominates every device/capacity consideration.
    pub async fn verify(
        &self,
        key_id: &KeyId,
        device_id: &DeviceId,
    ) -> EngineResult<VerifyResponse> {
        let Some(record) = self.load(key_id).await? else {
            return Ok(VerifyResponse::refused(Denial::KeyNotFound, 0, 0));
        };
        if record.is_expired(Utc::now()) {
            return Ok(VerifyResponse::refused(
                Denial::Expired,
                record.device_count(),
                record.max_devices(),
            ));
        }
        if record.is_bound(device_id) {
            Ok(VerifyResponse::authorized(&record))
        } else if record.has_capacity() {
            Ok(VerifyResponse::not_bound(&record))
        } else {
            Ok(VerifyResponse::refused(
                Denial::CapacityReached,
                record.device_count(),
                record.max_devices(),
            ))
        }
    }

    /// Registers a device against a key, consuming one unit of capacity.
    /// Re-binding an already-bound device succeeds without mutation.
    pub async fn bind(&self, key_id: &KeyId, device_id: &DeviceId) -> EngineResult<BindResponse> {
        let lock = self.key_lock(key_id).await;
        let guard = lock.lock().await;
        let result = self.bind_locked(key_id, device_id).await;
        drop(guard);
        self.prune_key_lock(key_id, lock).await;
        result
    }

    async fn bind_locked(
        &self,
        key_id: &KeyId,
        device_id: &DeviceId,
    ) -> EngineResult<BindResponse> {
        let Some(mut record) = self.load_locked(key_id).await? else {
            return Ok(BindResponse::refused(Denial::KeyNotFound, 0, 0));
        };
        if record.is_expired(Utc::now()) {
            return Ok(BindResponse::refused(
                Denial::Expired,
                record.device_count(),
                record.max_devices(),
            ));
        }
        let max = record.max_devices();
        match record.bind_device(device_id.clone()) {
            BindOutcome::Bound(count) => {
                self.store_set(record).await?;
                debug!(key = %key_id, device = %device_id, count, "device bound");
                Ok(BindResponse::bound(count, max))
            }
            BindOutcome::AlreadyBound(count) => Ok(BindResponse::bound(count, max)),
            BindOutcome::AtCapacity => Ok(BindResponse::refused(
                Denial::CapacityReached,
                record.device_count(),
                max,
            )),
        }
    }

    /// Releases a previously bound device. Unbinding a device that was
    /// never bound is a success no-op. Unknown keys are not provisioned
    /// here; there is nothing to release on a fresh record.
    pub async fn unbind(
        &self,
        key_id: &KeyId,
        device_id: &DeviceId,
    ) -> EngineResult<UnbindResponse> {
        let lock = self.key_lock(key_id).await;
        let guard = lock.lock().await;
        let result = self.unbind_locked(key_id, device_id).await;
        drop(guard);
        self.prune_key_lock(key_id, lock).await;
        result
    }

    async fn unbind_locked(
        &self,
        key_id: &KeyId,
        device_id: &DeviceId,
    ) -> EngineResult<UnbindResponse> {
        let Some(mut record) = self.store_get(key_id).await? else {
            return Ok(UnbindResponse::refused(Denial::KeyNotFound));
        };
        match record.unbind_device(device_id) {
            UnbindOutcome::Removed(count) => {
                self.store_set(record).await?;
                debug!(key = %key_id, device = %device_id, count, "device released");
                Ok(UnbindResponse::released(count))
            }
            UnbindOutcome::NotBound(count) => Ok(UnbindResponse::released(count)),
        }
    }

    // ── Admin operations ─────────────────────────────────────────

    fn check_admin(&self, secret: &str, op: &'static str) -> Option<Denial> {
        if self.config.admin_secret_matches(secret) {
            None
        } else {
            warn!(op, "admin secret mismatch");
            Some(Denial::Unauthorized)
        }
    }

    /// Creates fresh records for a batch of keys. Collisions are reported
    /// per key; one existing key never fails the whole batch.
    pub async fn admin_add(
        &self,
        secret: &str,
        key_ids: &[KeyId],
        template: KeyTemplate,
    ) -> EngineResult<AdminAddResponse> {
        if let Some(reason) = self.check_admin(secret, "admin_add") {
            return Ok(AdminAddResponse::refused(reason));
        }
        if key_ids.is_empty() || key_ids.iter().any(KeyId::is_empty) || template.max_devices == 0 {
            return Ok(AdminAddResponse::refused(Denial::InvalidInput));
        }

        let mut created = Vec::new();
        let mut rejected = Vec::new();
        for key_id in key_ids {
            let lock = self.key_lock(key_id).await;
            let guard = lock.lock().await;
            let outcome = self.create_locked(key_id, &template).await;
            drop(guard);
            self.prune_key_lock(key_id, lock).await;

            if outcome? {
                created.push(key_id.clone());
            } else {
                rejected.push(AddRejection {
                    key_id: key_id.clone(),
                    reason: Denial::AlreadyExists,
                });
            }
        }
        Ok(AdminAddResponse::done(created, rejected))
    }

    /// Creates one record under the key's lock. Returns false when a
    /// record already exists.
    async fn create_locked(&self, key_id: &KeyId, template: &KeyTemplate) -> EngineResult<bool> {
        if self.store_get(key_id).await?.is_some() {
            return Ok(false);
        }
        let record = KeyRecord::from_template(key_id.clone(), template, Utc::now());
        self.store_set(record).await?;
        info!(key = %key_id, max_devices = template.max_devices, "key created");
        Ok(true)
    }

    /// Lists every stored key with its usage and expiry state.
    pub async fn admin_list(&self, secret: &str) -> EngineResult<AdminListResponse> {
        if let Some(reason) = self.check_admin(secret, "admin_list") {
            return Ok(AdminListResponse::refused(reason));
        }
        let key_ids = self.with_deadline(self.store.list_keys()).await?;
        let records = self.with_deadline(self.store.multi_get(&key_ids)).await?;
        let now = Utc::now();
        // A key deleted between list and multi-get shows up as a hole;
        // skip it rather than failing the listing.
        let keys = records
            .iter()
            .flatten()
            .map(|record| KeySummary::of(record, now))
            .collect();
        Ok(AdminListResponse::done(keys))
    }

    /// Deletes a batch of keys. Absent keys count as not-deleted, not as
    /// errors. Each delete holds the key's lock so it cannot land inside
    /// a concurrent bind's read-modify-write and be silently re-created
    /// by the bind's persisting write.
    pub async fn admin_del(
        &self,
        secret: &str,
        key_ids: &[KeyId],
    ) -> EngineResult<AdminDelResponse> {
        if let Some(reason) = self.check_admin(secret, "admin_del") {
            return Ok(AdminDelResponse::refused(reason));
        }
        if key_ids.is_empty() {
            return Ok(AdminDelResponse::refused(Denial::InvalidInput));
        }
        let mut deleted = 0u32;
        for key_id in key_ids {
            let lock = self.key_lock(key_id).await;
            let guard = lock.lock().await;
            let removed = self.store_delete(key_id).await;
            drop(guard);
            self.prune_key_lock(key_id, lock).await;

            if removed? {
                info!(key = %key_id, "key deleted");
                deleted += 1;
            }
        }
        Ok(AdminDelResponse::done(key_ids.len() as u32, deleted))
    }

    /// Replaces a key's expiry: `expire_days` counted from now, 0 meaning
    /// the key never expires.
    pub async fn admin_set_expire(
        &self,
        secret: &str,
        key_id: &KeyId,
        expire_days: u32,
    ) -> EngineResult<AdminSetExpireResponse> {
        if let Some(reason) = self.check_admin(secret, "admin_set_expire") {
            return Ok(AdminSetExpireResponse::refused(reason));
        }
        let lock = self.key_lock(key_id).await;
        let guard = lock.lock().await;
        let result = self.reschedule_locked(key_id, expire_days).await;
        drop(guard);
        self.prune_key_lock(key_id, lock).await;
        result
    }

    async fn reschedule_locked(
        &self,
        key_id: &KeyId,
        expire_days: u32,
    ) -> EngineResult<AdminSetExpireResponse> {
        let Some(mut record) = self.store_get(key_id).await? else {
            return Ok(AdminSetExpireResponse::refused(Denial::KeyNotFound));
        };
        let expire_at = match expire_days {
            0 => None,
            days => Some(Utc::now() + chrono::Duration::days(i64::from(days))),
        };
        record.set_expire_at(expire_at);
        self.store_set(record).await?;
        info!(key = %key_id, expire_days, "key expiry rescheduled");
        Ok(AdminSetExpireResponse::done(expire_at))
    }

    /// Replaces a key's binding capacity. Refused with `InvalidInput` when
    /// the new capacity is zero or below the current bound-device count.
    pub async fn admin_set_capacity(
        &self,
        secret: &str,
        key_id: &KeyId,
        max_devices: u32,
    ) -> EngineResult<AdminSetCapacityResponse> {
        if let Some(reason) = self.check_admin(secret, "admin_set_capacity") {
            return Ok(AdminSetCapacityResponse::refused(reason));
        }
        let lock = self.key_lock(key_id).await;
        let guard = lock.lock().await;
        let result = self.resize_locked(key_id, max_devices).await;
        drop(guard);
        self.prune_key_lock(key_id, lock).await;
        result
    }

    async fn resize_locked(
        &self,
        key_id: &KeyId,
        max_devices: u32,
    ) -> EngineResult<AdminSetCapacityResponse> {
        let Some(mut record) = self.store_get(key_id).await? else {
            return Ok(AdminSetCapacityResponse::refused(Denial::KeyNotFound));
        };
        if !record.set_max_devices(max_devices) {
            return Ok(AdminSetCapacityResponse {
                success: false,
                reason: Some(Denial::InvalidInput),
                max_devices: record.max_devices(),
                device_count: record.device_count(),
            });
        }
        self.store_set(record.clone()).await?;
        info!(key = %key_id, max_devices, "key capacity changed");
        Ok(AdminSetCapacityResponse::done(&record))
    }
}
