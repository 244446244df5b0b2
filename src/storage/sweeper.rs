//! Background expiry sweep for cached images and materialized blobs

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::storage::blob::BlobStore;
use crate::storage::cache::ImageCache;

/// Counts from one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub records: usize,
    pub blobs: usize,
}

pub struct CacheSweeper {
    caches: Vec<Arc<ImageCache>>,
    blobs: Arc<BlobStore>,
    /// Unreferenced blob files older than this are removed
    blob_max_age: Duration,
    sweep_task: RwLock<Option<JoinHandle<()>>>,
}

impl CacheSweeper {
    pub fn new(caches: Vec<Arc<ImageCache>>, blobs: Arc<BlobStore>, blob_max_age: Duration) -> Self {
        Self {
            caches,
            blobs,
            blob_max_age,
            sweep_task: RwLock::new(None),
        }
    }

    /// Run one pass over every cache and the blob directory
    pub async fn sweep_now(&self) -> SweepReport {
        sweep(&self.caches, &self.blobs, self.blob_max_age).await
    }

    /// Start the periodic sweep. A running sweep is replaced.
    pub async fn start(&self, interval: Duration) {
        let caches = self.caches.clone();
        let blobs = self.blobs.clone();
        let max_age = self.blob_max_age;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                sweep(&caches, &blobs, max_age).await;
            }
        });

        if let Some(previous) = self.sweep_task.write().await.replace(handle) {
            previous.abort();
        }
        info!(interval_secs = interval.as_secs(), "Started cache sweeper");
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.sweep_task.write().await.take() {
            handle.abort();
            info!("Stopped cache sweeper");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.sweep_task
            .read()
            .await
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

async fn sweep(caches: &[Arc<ImageCache>], blobs: &BlobStore, max_age: Duration) -> SweepReport {
    let mut report = SweepReport::default();

    for cache in caches {
        match cache.purge_expired() {
            Ok(n) => report.records += n,
            Err(e) => warn!(key = %cache.key(), error = %e, "Cache sweep failed"),
        }
    }

    // Blobs still referenced by any cache outlive their file age
    let mut referenced = HashSet::new();
    for cache in caches {
        match cache.list_valid() {
            Ok(images) => referenced.extend(images.into_iter().map(|image| image.url)),
            Err(e) => {
                warn!(key = %cache.key(), error = %e, "Could not list cached images, skipping blob cleanup");
                return report;
            }
        }
    }

    match blobs.cleanup(max_age.as_secs(), &referenced).await {
        Ok(n) => report.blobs = n,
        Err(e) => warn!(error = %e, "Blob cleanup failed"),
    }

    debug!(records = report.records, blobs = report.blobs, "Sweep completed");
    report
}
