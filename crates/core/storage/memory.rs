//! In-memory storage: the process-memory cache tier and a quota-bounded
//! durable store stand-in.

use super::{DurableStore, StorageStats};
use crate::error::{GridlineError, Result};
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::time::{Duration, Instant};

struct Slot<V> {
    value: V,
    inserted: Instant,
    ttl: Duration,
}

impl<V> Slot<V> {
    fn remaining(&self) -> Option<Duration> {
        let age = self.inserted.elapsed();
        (age < self.ttl).then(|| self.ttl - age)
    }
}

/// Process-memory tier: a concurrent map with a TTL per key.
///
/// Expired entries read as absent but stay in the map until
/// [`MemoryTier::cleanup_expired`] runs. There is no size limit.
pub struct MemoryTier<V> {
    map: DashMap<String, Slot<V>>,
}

impl<V: Clone> MemoryTier<V> {
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.get_with_ttl(key).map(|(value, _)| value)
    }

    /// Value plus its remaining lifetime.
    pub fn get_with_ttl(&self, key: &str) -> Option<(V, Duration)> {
        let slot = self.map.get(key)?;
        let remaining = slot.remaining()?;
        Some((slot.value.clone(), remaining))
    }

    pub fn insert(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.map.insert(
            key.into(),
            Slot {
                value,
                inserted: Instant::now(),
                ttl,
            },
        );
    }

    pub fn remove(&self, key: &str) -> bool {
        self.map.remove(key).is_some()
    }

    /// Drop expired entries, returning how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let before = self.map.len();
        self.map.retain(|_, slot| slot.remaining().is_some());
        before.saturating_sub(self.map.len())
    }

    /// Stored entries, including expired ones not yet cleaned up
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<V: Clone> Default for MemoryTier<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory [`DurableStore`] with an optional byte quota.
///
/// Stands in for quota-limited client-side storage and backs the durable
/// tiers when no cache directory is configured.
pub struct MemoryStore {
    data: RwLock<FxHashMap<String, Bytes>>,
    capacity: Option<u64>,
}

impl MemoryStore {
    /// Unbounded store
    pub fn new() -> Self {
        Self {
            data: RwLock::new(FxHashMap::default()),
            capacity: None,
        }
    }

    /// Store that refuses writes once keys and values exceed `bytes`
    pub fn with_capacity(bytes: u64) -> Self {
        Self {
            data: RwLock::new(FxHashMap::default()),
            capacity: Some(bytes),
        }
    }

    fn record_size(key: &str, value: &[u8]) -> u64 {
        (key.len() + value.len()) as u64
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut data = self.data.write();

        if let Some(capacity) = self.capacity {
            let used: u64 = data.iter().map(|(k, v)| Self::record_size(k, v)).sum();
            let replaced = data
                .get(key)
                .map(|old| Self::record_size(key, old))
                .unwrap_or(0);
            let needed = Self::record_size(key, value);
            let available = capacity.saturating_sub(used - replaced);
            if needed > available {
                return Err(GridlineError::QuotaExceeded { needed, available });
            }
        }

        data.insert(key.to_string(), Bytes::copy_from_slice(value));
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.data.write().remove(key).is_some())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .data
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn usage(&self) -> StorageStats {
        let data = self.data.read();
        StorageStats {
            key_count: data.len(),
            size_bytes: data.iter().map(|(k, v)| Self::record_size(k, v)).sum(),
            capacity_bytes: self.capacity,
        }
    }
}
