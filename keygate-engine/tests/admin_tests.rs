mod common;

use chrono::{Duration, Utc};
use common::{dev, engine, key, seed_expired, SECRET};
use keygate_engine::Denial;
use keygate_store::KeyStore;
use keygate_types::{KeyTemplate, Remaining};

// ── Secret gating ────────────────────────────────────────────────

#[tokio::test]
async fn wrong_secret_is_unauthorized() {
    let (_, eng) = engine();

    let resp = eng
        .admin_add("wrong", &[key("K1")], KeyTemplate::perpetual(1))
        .await
        .unwrap();
    assert!(!resp.success);
    assert_eq!(resp.reason, Some(Denial::Unauthorized));

    let resp = eng.admin_list("wrong").await.unwrap();
    assert_eq!(resp.reason, Some(Denial::Unauthorized));

    let resp = eng.admin_del("wrong", &[key("K1")]).await.unwrap();
    assert_eq!(resp.reason, Some(Denial::Unauthorized));

    let resp = eng.admin_set_expire("wrong", &key("K1"), 1).await.unwrap();
    assert_eq!(resp.reason, Some(Denial::Unauthorized));

    let resp = eng.admin_set_capacity("wrong", &key("K1"), 2).await.unwrap();
    assert_eq!(resp.reason, Some(Denial::Unauthorized));
}

#[tokio::test]
async fn unauthorized_add_creates_nothing() {
    let (store, eng) = engine();
    eng.admin_add("wrong", &[key("K1")], KeyTemplate::perpetual(1))
        .await
        .unwrap();
    assert!(store.get(&key("K1")).await.unwrap().is_none());
}

#[tokio::test]
async fn empty_configured_secret_disables_admin() {
    let store = std::sync::Arc::new(keygate_store::MemoryStore::new());
    let eng = keygate_engine::LicenseEngine::new(store, keygate_engine::EngineConfig::default());
    // Even a matching empty secret is refused
    let resp = eng.admin_list("").await.unwrap();
    assert_eq!(resp.reason, Some(Denial::Unauthorized));
}

// ── Create ───────────────────────────────────────────────────────

#[tokio::test]
async fn add_creates_batch() {
    let (store, eng) = engine();
    let resp = eng
        .admin_add(
            SECRET,
            &[key("K1"), key("K2"), key("K3")],
            KeyTemplate::perpetual(2),
        )
        .await
        .unwrap();

    assert!(resp.success);
    assert_eq!(resp.created.len(), 3);
    assert!(resp.rejected.is_empty());
    assert_eq!(store.len().await, 3);
}

#[tokio::test]
async fn add_existing_key_rejected_per_key() {
    let (_, eng) = engine();
    eng.admin_add(SECRET, &[key("K1")], KeyTemplate::perpetual(2))
        .await
        .unwrap();

    // One collision, one fresh key: partial success
    let resp = eng
        .admin_add(SECRET, &[key("K1"), key("K2")], KeyTemplate::perpetual(2))
        .await
        .unwrap();
    assert!(!resp.success);
    assert_eq!(resp.created, vec![key("K2")]);
    assert_eq!(resp.rejected.len(), 1);
    assert_eq!(resp.rejected[0].key_id, key("K1"));
    assert_eq!(resp.rejected[0].reason, Denial::AlreadyExists);
}

#[tokio::test]
async fn add_collision_leaves_existing_data_unchanged() {
    let (store, eng) = engine();
    eng.admin_add(SECRET, &[key("K2")], KeyTemplate::expiring(1, 0))
        .await
        .unwrap();
    eng.bind(&key("K2"), &dev("d1")).await.unwrap();

    let resp = eng
        .admin_add(SECRET, &[key("K2")], KeyTemplate::expiring(1, 0))
        .await
        .unwrap();
    assert!(!resp.success);
    assert_eq!(resp.rejected[0].reason, Denial::AlreadyExists);

    let record = store.get(&key("K2")).await.unwrap().unwrap();
    assert_eq!(record.device_count(), 1);
    assert!(record.is_bound(&dev("d1")));
}

#[tokio::test]
async fn add_zero_expire_days_means_never() {
    let (store, eng) = engine();
    eng.admin_add(SECRET, &[key("K1")], KeyTemplate::expiring(1, 0))
        .await
        .unwrap();
    let record = store.get(&key("K1")).await.unwrap().unwrap();
    assert_eq!(record.expire_at(), None);
}

#[tokio::test]
async fn add_expire_days_sets_deadline() {
    let (store, eng) = engine();
    let before = Utc::now();
    eng.admin_add(SECRET, &[key("K1")], KeyTemplate::expiring(1, 30))
        .await
        .unwrap();
    let record = store.get(&key("K1")).await.unwrap().unwrap();
    let expire_at = record.expire_at().unwrap();
    assert!(expire_at >= before + Duration::days(30));
    assert!(expire_at <= Utc::now() + Duration::days(30));
}

#[tokio::test]
async fn add_zero_capacity_invalid() {
    let (_, eng) = engine();
    let resp = eng
        .admin_add(SECRET, &[key("K1")], KeyTemplate::perpetual(0))
        .await
        .unwrap();
    assert_eq!(resp.reason, Some(Denial::InvalidInput));
}

#[tokio::test]
async fn add_empty_batch_invalid() {
    let (_, eng) = engine();
    let resp = eng
        .admin_add(SECRET, &[], KeyTemplate::perpetual(1))
        .await
        .unwrap();
    assert_eq!(resp.reason, Some(Denial::InvalidInput));
}

// ── List ─────────────────────────────────────────────────────────

#[tokio::test]
async fn list_reports_usage_and_expiry() {
    let (store, eng) = engine();
    eng.admin_add(SECRET, &[key("active")], KeyTemplate::expiring(3, 10))
        .await
        .unwrap();
    eng.admin_add(SECRET, &[key("forever")], KeyTemplate::perpetual(1))
        .await
        .unwrap();
    seed_expired(&store, "stale", 2, &["d1"]).await;
    eng.bind(&key("active"), &dev("d1")).await.unwrap();
    eng.bind(&key("active"), &dev("d2")).await.unwrap();

    let resp = eng.admin_list(SECRET).await.unwrap();
    assert!(resp.success);
    assert_eq!(resp.keys.len(), 3);

    let by_id = |id: &str| resp.keys.iter().find(|k| k.key_id == key(id)).unwrap();

    let active = by_id("active");
    assert_eq!(active.device_count, 2);
    assert_eq!(active.max_devices, 3);
    assert!(!active.is_expired);
    assert_eq!(active.remaining, Remaining::Days(10));

    let forever = by_id("forever");
    assert!(!forever.is_expired);
    assert_eq!(forever.remaining, Remaining::Never);
    assert_eq!(forever.expire_at, None);

    let stale = by_id("stale");
    assert!(stale.is_expired);
    assert_eq!(stale.remaining, Remaining::Expired);
    assert_eq!(stale.device_count, 1);
}

#[tokio::test]
async fn list_empty_store() {
    let (_, eng) = engine();
    let resp = eng.admin_list(SECRET).await.unwrap();
    assert!(resp.success);
    assert!(resp.keys.is_empty());
}

// ── Delete ───────────────────────────────────────────────────────

#[tokio::test]
async fn del_counts_only_existing() {
    let (store, eng) = engine();
    eng.admin_add(SECRET, &[key("K1")], KeyTemplate::perpetual(1))
        .await
        .unwrap();

    let resp = eng
        .admin_del(SECRET, &[key("K1"), key("ghost")])
        .await
        .unwrap();
    assert!(resp.success);
    assert_eq!(resp.requested, 2);
    assert_eq!(resp.deleted, 1);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn del_nonexistent_still_succeeds() {
    let (_, eng) = engine();
    let resp = eng.admin_del(SECRET, &[key("ghost")]).await.unwrap();
    assert!(resp.success);
    assert_eq!(resp.requested, 1);
    assert_eq!(resp.deleted, 0);
}

// ── Reschedule expiry ────────────────────────────────────────────

#[tokio::test]
async fn set_expire_unknown_key() {
    let (_, eng) = engine();
    let resp = eng.admin_set_expire(SECRET, &key("ghost"), 5).await.unwrap();
    assert!(!resp.success);
    assert_eq!(resp.reason, Some(Denial::KeyNotFound));
}

#[tokio::test]
async fn set_expire_replaces_deadline() {
    let (store, eng) = engine();
    eng.admin_add(SECRET, &[key("K1")], KeyTemplate::perpetual(1))
        .await
        .unwrap();

    let resp = eng.admin_set_expire(SECRET, &key("K1"), 7).await.unwrap();
    assert!(resp.success);
    let expire_at = resp.expire_at.unwrap();
    assert!(expire_at > Utc::now() + Duration::days(6));

    let record = store.get(&key("K1")).await.unwrap().unwrap();
    assert_eq!(record.expire_at(), Some(expire_at));
}

#[tokio::test]
async fn set_expire_zero_makes_perpetual() {
    let (store, eng) = engine();
    seed_expired(&store, "K1", 2, &["d1"]).await;

    let resp = eng.admin_set_expire(SECRET, &key("K1"), 0).await.unwrap();
    assert!(resp.success);
    assert_eq!(resp.expire_at, None);

    // The previously expired key is usable again, bindings intact
    let verify = eng.verify(&key("K1"), &dev("d1")).await.unwrap();
    assert!(verify.valid);
}

// ── Capacity change ──────────────────────────────────────────────

#[tokio::test]
async fn set_capacity_unknown_key() {
    let (_, eng) = engine();
    let resp = eng
        .admin_set_capacity(SECRET, &key("ghost"), 5)
        .await
        .unwrap();
    assert_eq!(resp.reason, Some(Denial::KeyNotFound));
}

#[tokio::test]
async fn set_capacity_raises_limit() {
    let (_, eng) = engine();
    eng.admin_add(SECRET, &[key("K1")], KeyTemplate::perpetual(1))
        .await
        .unwrap();
    eng.bind(&key("K1"), &dev("d1")).await.unwrap();

    let resp = eng.admin_set_capacity(SECRET, &key("K1"), 3).await.unwrap();
    assert!(resp.success);
    assert_eq!(resp.max_devices, 3);

    let bind = eng.bind(&key("K1"), &dev("d2")).await.unwrap();
    assert!(bind.success);
}

#[tokio::test]
async fn set_capacity_below_bound_count_refused() {
    let (store, eng) = engine();
    eng.admin_add(SECRET, &[key("K1")], KeyTemplate::perpetual(3))
        .await
        .unwrap();
    eng.bind(&key("K1"), &dev("d1")).await.unwrap();
    eng.bind(&key("K1"), &dev("d2")).await.unwrap();

    let resp = eng.admin_set_capacity(SECRET, &key("K1"), 1).await.unwrap();
    assert!(!resp.success);
    assert_eq!(resp.reason, Some(Denial::InvalidInput));
    assert_eq!(resp.max_devices, 3);
    assert_eq!(resp.device_count, 2);

    // Untouched in the store
    let record = store.get(&key("K1")).await.unwrap().unwrap();
    assert_eq!(record.max_devices(), 3);
}
