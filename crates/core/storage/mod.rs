//! Layered key/value cache.
//!
//! Three tiers form a read-through chain: process memory, a small
//! capacity-bounded durable store holding compressed (and, above a threshold,
//! chunked) records, and a large durable store holding raw records. Durable
//! tiers sit on a [`DurableStore`], so the same tier logic runs against an
//! in-memory quota store or a directory of files.

use crate::error::Result;
use bytes::Bytes;
use serde::Serialize;

mod entry;
mod file;
mod large;
mod manager;
mod memory;
mod small;

pub use entry::{CacheEntry, EntryMeta, FORMAT_VERSION, StoredValue};
pub use file::FileStore;
pub use large::LargeDurableTier;
pub use manager::{CacheHit, CacheManager, CacheStats, CacheTier, Durability};
pub use memory::{MemoryStore, MemoryTier};
pub use small::SmallDurableTier;

/// Backing store of a durable cache tier.
///
/// Implementations synchronise internally; every method takes `&self` so a
/// store can be shared across request tasks behind an `Arc`.
pub trait DurableStore: Send + Sync {
    /// Get the raw bytes stored under `key`
    fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Insert or replace `key`. Fails with `QuotaExceeded` when the store is
    /// capacity-bounded and the write would not fit.
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove `key`, returning whether it existed
    fn delete(&self, key: &str) -> Result<bool>;

    /// All keys starting with `prefix`, sorted
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Current usage
    fn usage(&self) -> StorageStats;
}

/// Durable store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    /// Number of stored records (chunks count individually)
    pub key_count: usize,
    /// Bytes used by keys and values
    pub size_bytes: u64,
    /// Capacity limit, if the store has one
    pub capacity_bytes: Option<u64>,
}

impl StorageStats {
    /// Bytes still available, or `None` for unbounded stores.
    pub fn available_bytes(&self) -> Option<u64> {
        self.capacity_bytes
            .map(|cap| cap.saturating_sub(self.size_bytes))
    }
}
