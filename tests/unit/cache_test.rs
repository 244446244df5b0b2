//! Unit tests for the expiring image caches and daily usage

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use imagegen_studio::storage::cache::{ImageCache, GALLERY_KEY, RESULTS_KEY};
use imagegen_studio::storage::clock::ManualClock;
use imagegen_studio::storage::kv::{FileStore, KeyValueStore, MemoryStore};
use imagegen_studio::storage::usage::UsageTracker;

use crate::common::T0;

const TTL: Duration = Duration::from_secs(30 * 60);
const TTL_MS: i64 = 30 * 60 * 1000;

fn stored(store: &dyn KeyValueStore, key: &str) -> Value {
    serde_json::from_str(&store.get(key).unwrap().unwrap()).unwrap()
}

#[test]
fn test_legacy_flat_list_is_upgraded() {
    let store = Arc::new(MemoryStore::new());
    store
        .set(RESULTS_KEY, json!(["url1", "url2"]).to_string())
        .unwrap();
    let clock = Arc::new(ManualClock::new(T0));
    let cache = ImageCache::results(store.clone(), TTL, clock);

    let records = cache.list_valid().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].url, "url1");
    assert_eq!(records[1].url, "url2");
    assert!(records.iter().all(|r| r.timestamp == T0 && r.expires_at == T0 + TTL_MS));

    assert_eq!(
        stored(store.as_ref(), RESULTS_KEY),
        json!([
            { "url": "url1", "timestamp": T0 },
            { "url": "url2", "timestamp": T0 }
        ])
    );
}

#[test]
fn test_mixed_legacy_and_current_entries() {
    let store = Arc::new(MemoryStore::new());
    store
        .set(
            GALLERY_KEY,
            json!(["old", { "url": "new", "timestamp": T0 - 1_000 }]).to_string(),
        )
        .unwrap();
    let clock = Arc::new(ManualClock::new(T0));
    let cache = ImageCache::gallery(store.clone(), TTL, clock);

    let records = cache.list_valid().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].timestamp, T0 - 1_000);
    assert_eq!(stored(store.as_ref(), GALLERY_KEY)[0]["expiresAt"], json!(T0 + TTL_MS));
}

#[test]
fn test_expiry_window() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(T0));
    let cache = ImageCache::results(store, TTL, clock.clone());
    assert!(cache.save("https://img.test/a.png").unwrap());
    assert!(!cache.save("https://img.test/a.png").unwrap());

    clock.set(T0 + TTL_MS - 1);
    assert_eq!(cache.list_valid().unwrap().len(), 1);

    clock.set(T0 + TTL_MS + 1);
    assert!(cache.list_valid().unwrap().is_empty());
}

#[test]
fn test_concurrent_saves_merge() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(T0));
    let cache = Arc::new(ImageCache::results(store, TTL, clock));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cache = cache.clone();
            std::thread::spawn(move || cache.save(&format!("https://img.test/{}.png", i)).unwrap())
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert_eq!(cache.list_valid().unwrap().len(), 8);
}

#[test]
fn test_gallery_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local_storage.json");
    let clock = Arc::new(ManualClock::new(T0));

    {
        let store = Arc::new(FileStore::open(&path).unwrap());
        let gallery = ImageCache::gallery(store, TTL, clock.clone());
        gallery.save("https://img.test/keep.png").unwrap();
    }

    let store = Arc::new(FileStore::open(&path).unwrap());
    let gallery = ImageCache::gallery(store, TTL, clock);
    let records = gallery.list_valid().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].url, "https://img.test/keep.png");
}

#[test]
fn test_usage_key_layout() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(T0));
    let usage = Arc::new(UsageTracker::new(store.clone(), clock, 10));

    usage.reserve("abc", 2).unwrap().commit(2).unwrap();
    usage.reserve("abc", 4).unwrap().commit(3).unwrap();
    assert_eq!(
        stored(store.as_ref(), "image_usage_abc"),
        json!({ "count": 5, "date": "2024-03-01" })
    );
    let held = tokio_test::assert_ok!(usage.reserve("abc", 5));
    assert_eq!(held.reserved(), 5);
    drop(held);
    tokio_test::assert_err!(usage.reserve("abc", 6).map(|r| r.reserved()));
}
