//! Storage module - Key-value persistence, image caches, blobs and usage counters

pub mod blob;
pub mod cache;
pub mod clock;
pub mod kv;
pub mod sweeper;
pub mod usage;

pub use blob::BlobStore;
pub use cache::{CachedImage, ImageCache};
pub use clock::{Clock, SystemClock};
pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use sweeper::CacheSweeper;
pub use usage::{QuotaReservation, UsageTracker};
