//! Expiring image cache over local key-value storage
//!
//! Records live as a JSON array under a single key. Every mutation is a
//! read-modify-write of the whole array performed under one lock, so
//! concurrent savers merge instead of overwriting each other. Older
//! deployments stored a flat array of URL strings; those entries are
//! upgraded in place the first time the key is read.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::storage::clock::Clock;
use crate::storage::kv::KeyValueStore;

/// Key for automatically cached generation results
pub const RESULTS_KEY: &str = "generatedImages";
/// Key for images the user explicitly saved
pub const GALLERY_KEY: &str = "gallery";

/// Cached image reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedImage {
    pub url: String,
    /// Creation time, epoch milliseconds
    pub timestamp: i64,
    /// Always `timestamp + ttl`
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
}

/// Serialized shape of a record under the cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLayout {
    /// `{url, timestamp}`
    Timestamped,
    /// `{url, timestamp, expiresAt}`
    WithExpiry,
}

/// Anything that may be found under the key
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Legacy(String),
    Record {
        url: String,
        #[serde(default)]
        timestamp: Option<i64>,
    },
}

struct Loaded {
    records: Vec<CachedImage>,
    /// Storage content differs from what `records` would serialize to
    dirty: bool,
}

pub struct ImageCache {
    store: Arc<dyn KeyValueStore>,
    key: String,
    layout: CacheLayout,
    ttl_ms: i64,
    clock: Arc<dyn Clock>,
    lock: Mutex<()>,
}

impl ImageCache {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
        layout: CacheLayout,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            layout,
            ttl_ms: ttl.as_millis() as i64,
            clock,
            lock: Mutex::new(()),
        }
    }

    /// Cache for generation results (`generatedImages`)
    pub fn results(store: Arc<dyn KeyValueStore>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self::new(store, RESULTS_KEY, CacheLayout::Timestamped, ttl, clock)
    }

    /// Cache for user-saved images (`gallery`)
    pub fn gallery(store: Arc<dyn KeyValueStore>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self::new(store, GALLERY_KEY, CacheLayout::WithExpiry, ttl, clock)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Append `url`. Returns false without writing if it is already cached.
    pub fn save(&self, url: &str) -> Result<bool> {
        let _guard = self.lock.lock();
        let now = self.clock.now_ms();
        let Loaded { mut records, .. } = self.load(now)?;

        records.retain(|r| r.expires_at > now);
        if records.iter().any(|r| r.url == url) {
            return Ok(false);
        }

        records.push(self.record(url.to_string(), now));
        self.write(&records)?;
        debug!(key = %self.key, url = %url, "Cached image");
        Ok(true)
    }

    /// Unexpired records, oldest first. Expired ones are purged from storage.
    pub fn list_valid(&self) -> Result<Vec<CachedImage>> {
        let _guard = self.lock.lock();
        let now = self.clock.now_ms();
        let Loaded { records, dirty } = self.load(now)?;

        let before = records.len();
        let valid: Vec<CachedImage> = records.into_iter().filter(|r| r.expires_at > now).collect();

        if dirty || valid.len() != before {
            self.write(&valid)?;
            if valid.len() != before {
                debug!(key = %self.key, purged = before - valid.len(), "Purged expired images");
            }
        }
        Ok(valid)
    }

    /// Remove `url` whether or not it has expired. Returns whether it was present.
    pub fn delete(&self, url: &str) -> Result<bool> {
        let _guard = self.lock.lock();
        let now = self.clock.now_ms();
        let Loaded { mut records, dirty } = self.load(now)?;

        let before = records.len();
        records.retain(|r| r.url != url);
        let removed = records.len() != before;

        if removed || dirty {
            self.write(&records)?;
        }
        Ok(removed)
    }

    /// Physically remove expired records, returning how many were dropped
    pub fn purge_expired(&self) -> Result<usize> {
        let _guard = self.lock.lock();
        let now = self.clock.now_ms();
        let Loaded { mut records, dirty } = self.load(now)?;

        let before = records.len();
        records.retain(|r| r.expires_at > now);
        let purged = before - records.len();

        if purged > 0 || dirty {
            self.write(&records)?;
        }
        Ok(purged)
    }

    fn record(&self, url: String, timestamp: i64) -> CachedImage {
        CachedImage {
            url,
            timestamp,
            expires_at: timestamp + self.ttl_ms,
        }
    }

    fn load(&self, now: i64) -> Result<Loaded> {
        let raw = match self.store.get(&self.key)? {
            Some(raw) => raw,
            None => {
                return Ok(Loaded {
                    records: Vec::new(),
                    dirty: false,
                })
            }
        };

        let values: Vec<Value> = match serde_json::from_str(&raw) {
            Ok(values) => values,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Unreadable cache contents, resetting");
                return Ok(Loaded {
                    records: Vec::new(),
                    dirty: true,
                });
            }
        };

        let mut migrated = 0;
        let mut skipped = 0;
        let mut records = Vec::with_capacity(values.len());
        for value in values {
            match serde_json::from_value::<StoredEntry>(value) {
                Ok(StoredEntry::Legacy(url)) | Ok(StoredEntry::Record { url, timestamp: None }) => {
                    migrated += 1;
                    records.push(self.record(url, now));
                }
                Ok(StoredEntry::Record {
                    url,
                    timestamp: Some(ts),
                }) => records.push(self.record(url, ts)),
                Err(e) => {
                    skipped += 1;
                    debug!(key = %self.key, error = %e, "Skipping unreadable cache entry");
                }
            }
        }

        if skipped > 0 {
            warn!(key = %self.key, skipped, "Dropped unreadable cache entries");
        }
        if migrated > 0 {
            info!(key = %self.key, migrated, "Upgraded legacy cache entries");
        }

        Ok(Loaded {
            records,
            dirty: migrated > 0 || skipped > 0,
        })
    }

    fn write(&self, records: &[CachedImage]) -> Result<()> {
        let entries: Vec<Value> = records
            .iter()
            .map(|r| match self.layout {
                CacheLayout::Timestamped => json!({ "url": r.url, "timestamp": r.timestamp }),
                CacheLayout::WithExpiry => {
                    json!({ "url": r.url, "timestamp": r.timestamp, "expiresAt": r.expires_at })
                }
            })
            .collect();
        self.store.set(&self.key, serde_json::to_string(&entries)?)
    }
}
