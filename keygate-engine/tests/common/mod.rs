//! Shared test helpers for engine tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use keygate_engine::{EngineConfig, LicenseEngine};
use keygate_store::{KeyStore, MemoryStore, StoreError, StoreResult};
use keygate_types::{DeviceId, KeyId, KeyRecord, KeyTemplate};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};

/// The admin secret every test engine is configured with.
pub const SECRET: &str = "test-admin-secret";

/// Installs a test subscriber so `RUST_LOG=debug` shows engine traces.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn key(s: &str) -> KeyId {
    KeyId::new(s)
}

pub fn dev(s: &str) -> DeviceId {
    DeviceId::new(s)
}

/// Engine over a fresh in-memory store, no presets. Returns the store too
/// so tests can seed or inspect records directly.
pub fn engine() -> (Arc<MemoryStore>, LicenseEngine) {
    let store = Arc::new(MemoryStore::new());
    let config = EngineConfig {
        admin_secret: SECRET.to_string(),
        ..EngineConfig::default()
    };
    (store.clone(), LicenseEngine::new(store, config))
}

/// Engine with a preset template table and auto-provisioning on.
pub fn preset_engine(presets: Vec<(&str, KeyTemplate)>) -> (Arc<MemoryStore>, LicenseEngine) {
    let store = Arc::new(MemoryStore::new());
    let presets: HashMap<KeyId, KeyTemplate> = presets
        .into_iter()
        .map(|(k, t)| (KeyId::new(k), t))
        .collect();
    let config = EngineConfig {
        admin_secret: SECRET.to_string(),
        presets,
        auto_provision: true,
        ..EngineConfig::default()
    };
    (store.clone(), LicenseEngine::new(store, config))
}

/// Seeds a record that expired `days_ago` days ago, with the given devices
/// already bound.
pub async fn seed_expired(store: &MemoryStore, key_id: &str, max_devices: u32, devices: &[&str]) {
    let now = Utc::now();
    let mut record = KeyRecord::new(
        KeyId::new(key_id),
        max_devices,
        now - Duration::days(10),
        Some(now - Duration::days(1)),
    );
    for d in devices {
        record.bind_device(DeviceId::new(*d));
    }
    store.set(record).await.unwrap();
}

/// A memory store that can stall one write. After [`GatedStore::arm`],
/// the next `set` signals that it arrived and then parks until
/// [`GatedStore::release`]; everything else delegates straight through.
/// Lets a test freeze one task mid read-modify-write while others run.
pub struct GatedStore {
    inner: MemoryStore,
    armed: AtomicBool,
    arrived: Notify,
    release: Semaphore,
}

impl GatedStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            armed: AtomicBool::new(false),
            arrived: Notify::new(),
            release: Semaphore::new(0),
        }
    }

    /// Arms the gate for the next `set` call.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Waits until the armed `set` has started and is parked.
    pub async fn stalled(&self) {
        self.arrived.notified().await;
    }

    /// Lets the parked `set` proceed.
    pub fn release(&self) {
        self.release.add_permits(1);
    }
}

#[async_trait]
impl KeyStore for GatedStore {
    async fn get(&self, key_id: &KeyId) -> StoreResult<Option<KeyRecord>> {
        self.inner.get(key_id).await
    }

    async fn set(&self, record: KeyRecord) -> StoreResult<()> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.arrived.notify_one();
            self.release.acquire().await.unwrap().forget();
        }
        self.inner.set(record).await
    }

    async fn delete(&self, key_id: &KeyId) -> StoreResult<bool> {
        self.inner.delete(key_id).await
    }

    async fn list_keys(&self) -> StoreResult<Vec<KeyId>> {
        self.inner.list_keys().await
    }

    async fn multi_get(&self, key_ids: &[KeyId]) -> StoreResult<Vec<Option<KeyRecord>>> {
        self.inner.multi_get(key_ids).await
    }
}

/// A store whose every call fails.
pub struct FailingStore;

#[async_trait]
impl KeyStore for FailingStore {
    async fn get(&self, _key_id: &KeyId) -> StoreResult<Option<KeyRecord>> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn set(&self, _record: KeyRecord) -> StoreResult<()> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn delete(&self, _key_id: &KeyId) -> StoreResult<bool> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn list_keys(&self) -> StoreResult<Vec<KeyId>> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn multi_get(&self, _key_ids: &[KeyId]) -> StoreResult<Vec<Option<KeyRecord>>> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

/// A store whose every call hangs forever.
pub struct HangingStore;

#[async_trait]
impl KeyStore for HangingStore {
    async fn get(&self, _key_id: &KeyId) -> StoreResult<Option<KeyRecord>> {
        std::future::pending().await
    }

    async fn set(&self, _record: KeyRecord) -> StoreResult<()> {
        std::future::pending().await
    }

    async fn delete(&self, _key_id: &KeyId) -> StoreResult<bool> {
        std::future::pending().await
    }

    async fn list_keys(&self) -> StoreResult<Vec<KeyId>> {
        std::future::pending().await
    }

    async fn multi_get(&self, _key_ids: &[KeyId]) -> StoreResult<Vec<Option<KeyRecord>>> {
        std::future::pending().await
    }
}
