//! Storage layer tests for the hush local store.

use std::sync::Arc;

use hush_core::clock::ManualClock;
use hush_crypto::{KeyPair, SymmetricKey};

use super::db::{LocalStore, StoreError};
use super::models::{CachedHistory, Lookup, Namespace, StoredKeyPair, history_key};

const DAY: i64 = 24 * 60 * 60;

async fn test_store() -> (LocalStore, ManualClock) {
    let clock = ManualClock::new(1_700_000_000);
    let store = LocalStore::open_in_memory()
        .await
        .unwrap()
        .with_clock(Arc::new(clock.clone()));
    (store, clock)
}

fn keypair_row(user_id: &str) -> StoredKeyPair {
    let kp = KeyPair::generate().unwrap();
    StoredKeyPair {
        user_id: user_id.to_string(),
        public_key: kp.export_public().to_json().unwrap(),
        private_key: kp.export_private().to_json().unwrap(),
        created_at: 1_700_000_000,
    }
}

fn history(key: &str, cached_at: i64) -> CachedHistory {
    CachedHistory {
        cache_key: key.to_string(),
        messages: Vec::new(),
        cached_at,
    }
}

// === Init ===

#[tokio::test]
async fn init_is_idempotent() {
    let (store, _) = test_store().await;
    store.put_keypair(&keypair_row("u1")).await.unwrap();

    store.init().await.unwrap();
    store.init().await.unwrap();

    assert!(store.get_keypair("u1").await.unwrap().is_some());
}

#[tokio::test]
async fn open_on_disk_persists_across_handles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("hush.db");
    let row = keypair_row("u1");

    {
        let store = LocalStore::open(&path).await.unwrap();
        store.put_keypair(&row).await.unwrap();
        store.pool().close().await;
    }

    let reopened = LocalStore::open(&path).await.unwrap();
    let loaded = reopened.get_keypair("u1").await.unwrap().unwrap();
    assert_eq!(loaded.private_key, row.private_key);
    assert_eq!(loaded.public_key, row.public_key);
}

// === Generic put/get/delete ===

#[tokio::test]
async fn put_get_delete() {
    let (store, _) = test_store().await;

    store.put(Namespace::Keypairs, "k", &"v1").await.unwrap();
    store.put(Namespace::Keypairs, "k", &"v2").await.unwrap();
    let value: Option<String> = store.get(Namespace::Keypairs, "k").await.unwrap();
    assert_eq!(value.as_deref(), Some("v2"));

    assert!(store.delete(Namespace::Keypairs, "k").await.unwrap());
    assert!(!store.delete(Namespace::Keypairs, "k").await.unwrap());
    let value: Option<String> = store.get(Namespace::Keypairs, "k").await.unwrap();
    assert!(value.is_none());
}

#[tokio::test]
async fn namespaces_are_independent() {
    let (store, _) = test_store().await;

    store.put(Namespace::Keypairs, "same", &1).await.unwrap();
    store.put(Namespace::Secrets, "same", &2).await.unwrap();
    store.put(Namespace::History, "same", &3).await.unwrap();

    let values: Vec<Option<i32>> = vec![
        store.get(Namespace::Keypairs, "same").await.unwrap(),
        store.get(Namespace::Secrets, "same").await.unwrap(),
        store.get(Namespace::History, "same").await.unwrap(),
    ];
    assert_eq!(values, [Some(1), Some(2), Some(3)]);
}

#[tokio::test]
async fn wrong_shape_is_a_serialization_error() {
    let (store, _) = test_store().await;
    store.put(Namespace::Keypairs, "u1", &"not a keypair").await.unwrap();

    assert!(matches!(
        store.get_keypair("u1").await,
        Err(StoreError::Serialization(_))
    ));
}

// === Secrets ===

#[tokio::test]
async fn secrets_have_no_ttl() {
    let (store, clock) = test_store().await;
    let key = SymmetricKey::from_bytes([9; 32]);
    store.put_secret("a,b", &key.export()).await.unwrap();

    clock.advance(365 * DAY);
    let stored = store.get_secret("a,b").await.unwrap().unwrap();
    assert_eq!(SymmetricKey::import(&stored).unwrap(), key);
}

#[tokio::test]
async fn corrupt_secret_is_discarded() {
    let (store, _) = test_store().await;
    store.put(Namespace::Secrets, "a,b", &[1, 2, 3]).await.unwrap();

    assert!(store.get_secret("a,b").await.unwrap().is_none());
    assert!(!store.contains(Namespace::Secrets, "a,b").await.unwrap());
}

// === History TTL ===

#[tokio::test]
async fn history_expires_after_seven_days() {
    let (store, clock) = test_store().await;
    let key = history_key("u1", "f1");
    assert_eq!(key, "u1_f1");
    store
        .put(Namespace::History, &key, &history(&key, store.now()))
        .await
        .unwrap();

    clock.advance(8 * DAY);

    let lookup: Lookup<CachedHistory> = store.lookup(Namespace::History, &key).await.unwrap();
    assert_eq!(lookup, Lookup::Expired);
    assert!(!store.contains(Namespace::History, &key).await.unwrap());

    let again: Lookup<CachedHistory> = store.lookup(Namespace::History, &key).await.unwrap();
    assert_eq!(again, Lookup::Miss);
}

#[tokio::test]
async fn history_within_ttl_is_returned() {
    let (store, clock) = test_store().await;
    let cached = history("u1_f1", store.now());
    store.put(Namespace::History, "u1_f1", &cached).await.unwrap();

    clock.advance(7 * DAY);

    let loaded: Option<CachedHistory> = store.get(Namespace::History, "u1_f1").await.unwrap();
    assert_eq!(loaded, Some(cached));
}

#[tokio::test]
async fn rewriting_history_resets_ttl() {
    let (store, clock) = test_store().await;
    store.put(Namespace::History, "u1_f1", &history("u1_f1", 0)).await.unwrap();

    clock.advance(6 * DAY);
    store.put(Namespace::History, "u1_f1", &history("u1_f1", 0)).await.unwrap();
    clock.advance(6 * DAY);

    assert!(store.contains(Namespace::History, "u1_f1").await.unwrap());
    let loaded: Option<CachedHistory> = store.get(Namespace::History, "u1_f1").await.unwrap();
    assert!(loaded.is_some());
}

#[tokio::test]
async fn ttl_only_applies_to_history() {
    let (store, clock) = test_store().await;
    store.put_keypair(&keypair_row("u1")).await.unwrap();

    clock.advance(30 * DAY);
    assert!(store.get_keypair("u1").await.unwrap().is_some());
}

#[tokio::test]
async fn expiry_alongside_concurrent_writers_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(1_700_000_000);
    let store = LocalStore::open(&dir.path().join("hush.db"))
        .await
        .unwrap()
        .with_clock(Arc::new(clock.clone()));
    for i in 0..16 {
        let key = format!("u1_f{i}");
        store.put(Namespace::History, &key, &history(&key, 0)).await.unwrap();
    }
    clock.advance(8 * DAY);

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..16 {
        let reader = store.clone();
        tasks.spawn(async move {
            let key = format!("u1_f{i}");
            let lookup: Lookup<CachedHistory> =
                reader.lookup(Namespace::History, &key).await.unwrap();
            assert_eq!(lookup, Lookup::Expired);
        });
        let writer = store.clone();
        tasks.spawn(async move {
            let key = format!("u2_f{i}");
            writer.put(Namespace::History, &key, &history(&key, 0)).await.unwrap();
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap();
    }

    for i in 0..16 {
        assert!(!store.contains(Namespace::History, &format!("u1_f{i}")).await.unwrap());
        assert!(store.contains(Namespace::History, &format!("u2_f{i}")).await.unwrap());
    }
}

// === clear_all ===

#[tokio::test]
async fn clear_all_removes_only_the_users_rows() {
    let (store, _) = test_store().await;
    store.put_keypair(&keypair_row("u1")).await.unwrap();
    store.put_keypair(&keypair_row("u2")).await.unwrap();
    for key in ["u1_f1", "u1_f2", "u2_f1", "u10_f1"] {
        store.put(Namespace::History, key, &history(key, 0)).await.unwrap();
    }
    store
        .put_secret("u1,f1", &SymmetricKey::from_bytes([1; 32]).export())
        .await
        .unwrap();
    store
        .put_secret("u2,f1", &SymmetricKey::from_bytes([2; 32]).export())
        .await
        .unwrap();

    store.clear_all("u1").await.unwrap();

    assert!(store.get_keypair("u1").await.unwrap().is_none());
    assert!(store.get_keypair("u2").await.unwrap().is_some());
    assert!(!store.contains(Namespace::History, "u1_f1").await.unwrap());
    assert!(!store.contains(Namespace::History, "u1_f2").await.unwrap());
    assert!(store.contains(Namespace::History, "u2_f1").await.unwrap());
    assert!(store.contains(Namespace::History, "u10_f1").await.unwrap());
    assert!(!store.contains(Namespace::Secrets, "u1,f1").await.unwrap());
    assert!(!store.contains(Namespace::Secrets, "u2,f1").await.unwrap());
}

#[tokio::test]
async fn clear_all_treats_underscore_literally() {
    let (store, _) = test_store().await;
    for key in ["a_b_f1", "aXb_f1"] {
        store.put(Namespace::History, key, &history(key, 0)).await.unwrap();
    }

    store.clear_all("a_b").await.unwrap();

    assert!(!store.contains(Namespace::History, "a_b_f1").await.unwrap());
    assert!(store.contains(Namespace::History, "aXb_f1").await.unwrap());
}

#[tokio::test]
async fn clear_all_on_empty_store_succeeds() {
    let (store, _) = test_store().await;
    store.clear_all("nobody").await.unwrap();
}
