//! Read-through / write-through coordination of the cache tiers.

use super::{LargeDurableTier, MemoryTier, SmallDurableTier, StorageStats};
use crate::config::CacheConfig;
use bytes::Bytes;
use gridline_types::Feature;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Tier that answered a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTier {
    Memory,
    Small,
    Large,
}

/// Where a write should land besides process memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// Process memory only
    Memory,
    /// Memory plus the small tier, falling back to the large tier when the
    /// small tier refuses the value
    Standard,
    /// Memory plus the large tier
    Large,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHit {
    pub value: Bytes,
    pub tier: CacheTier,
}

#[derive(Default)]
struct Counters {
    memory_hits: AtomicU64,
    small_hits: AtomicU64,
    large_hits: AtomicU64,
    misses: AtomicU64,
    failed_writes: AtomicU64,
    tile_hits: AtomicU64,
    tile_misses: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Snapshot of cache activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub memory_hits: u64,
    pub small_hits: u64,
    pub large_hits: u64,
    pub misses: u64,
    pub failed_writes: u64,
    pub tile_hits: u64,
    pub tile_misses: u64,
    pub memory_entries: usize,
    pub tile_entries: usize,
    pub small: StorageStats,
    pub large: StorageStats,
}

/// Three-tier cache shared by every request handler.
///
/// Reads go memory → small → large and promote durable hits into memory.
/// Writes never fail the caller: a refused write is logged, counted and
/// reported as `false`.
pub struct CacheManager {
    memory: MemoryTier<Bytes>,
    tiles: MemoryTier<Arc<Vec<Feature>>>,
    small: SmallDurableTier,
    large: LargeDurableTier,
    tile_ttl: Duration,
    counters: Counters,
}

impl CacheManager {
    pub fn new(small: SmallDurableTier, large: LargeDurableTier, config: &CacheConfig) -> Self {
        Self {
            memory: MemoryTier::new(),
            tiles: MemoryTier::new(),
            small,
            large,
            tile_ttl: config.tile_ttl(),
            counters: Counters::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<CacheHit> {
        if let Some(value) = self.memory.get(key) {
            Counters::bump(&self.counters.memory_hits);
            return Some(CacheHit {
                value,
                tier: CacheTier::Memory,
            });
        }

        let (stored, tier) = if let Some(stored) = self.small.get(key) {
            Counters::bump(&self.counters.small_hits);
            (stored, CacheTier::Small)
        } else if let Some(stored) = self.large.get(key) {
            Counters::bump(&self.counters.large_hits);
            (stored, CacheTier::Large)
        } else {
            Counters::bump(&self.counters.misses);
            return None;
        };

        self.memory
            .insert(key, stored.value.clone(), stored.remaining_ttl);
        Some(CacheHit {
            value: stored.value,
            tier,
        })
    }

    /// Write-through store. Returns `false` when a durable tier refused the
    /// value; the memory tier is always populated.
    pub fn set(&self, key: &str, value: Bytes, ttl: Duration, durability: Durability) -> bool {
        self.memory.insert(key, value.clone(), ttl);

        let stored = match durability {
            Durability::Memory => true,
            Durability::Standard => match self.small.set(key, &value, ttl) {
                Ok(()) => true,
                Err(e) => {
                    log::debug!("Small tier refused {} ({}), trying large tier", key, e);
                    self.write_large(key, &value, ttl)
                }
            },
            Durability::Large => self.write_large(key, &value, ttl),
        };

        if !stored {
            Counters::bump(&self.counters.failed_writes);
        }
        stored
    }

    fn write_large(&self, key: &str, value: &[u8], ttl: Duration) -> bool {
        match self.large.set(key, value, ttl) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to cache {} ({} bytes): {}", key, value.len(), e);
                false
            }
        }
    }

    /// Read and deserialize a JSON value. An undecodable value is removed
    /// from every tier and reads as a miss.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let hit = self.get(key)?;
        match serde_json::from_slice(&hit.value) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Clearing undecodable cache entry {}: {}", key, e);
                self.invalidate(key);
                None
            }
        }
    }

    pub fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
        durability: Durability,
    ) -> bool {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.set(key, Bytes::from(bytes), ttl, durability),
            Err(e) => {
                log::warn!("Failed to serialize cache value for {}: {}", key, e);
                Counters::bump(&self.counters.failed_writes);
                false
            }
        }
    }

    /// Remove `key` from every tier.
    pub fn invalidate(&self, key: &str) {
        self.memory.remove(key);
        if let Err(e) = self.small.remove(key) {
            log::warn!("Failed to invalidate {} in small tier: {}", key, e);
        }
        if let Err(e) = self.large.remove(key) {
            log::warn!("Failed to invalidate {} in large tier: {}", key, e);
        }
    }

    /// Per-tile feature cache, memory only.
    pub fn get_tile(&self, key: &str) -> Option<Arc<Vec<Feature>>> {
        let hit = self.tiles.get(key);
        if hit.is_some() {
            Counters::bump(&self.counters.tile_hits);
        } else {
            Counters::bump(&self.counters.tile_misses);
        }
        hit
    }

    pub fn put_tile(&self, key: &str, features: Arc<Vec<Feature>>) {
        self.tiles.insert(key, features, self.tile_ttl);
    }

    /// Drop expired memory entries; durable tiers expire lazily on read.
    pub fn cleanup_expired(&self) -> usize {
        self.memory.cleanup_expired() + self.tiles.cleanup_expired()
    }

    pub fn stats(&self) -> CacheStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CacheStats {
            memory_hits: load(&self.counters.memory_hits),
            small_hits: load(&self.counters.small_hits),
            large_hits: load(&self.counters.large_hits),
            misses: load(&self.counters.misses),
            failed_writes: load(&self.counters.failed_writes),
            tile_hits: load(&self.counters.tile_hits),
            tile_misses: load(&self.counters.tile_misses),
            memory_entries: self.memory.len(),
            tile_entries: self.tiles.len(),
            small: self.small.usage(),
            large: self.large.usage(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DurableStore, MemoryStore};

    const HOUR: Duration = Duration::from_secs(3_600);

    fn manager_with(small_capacity: u64) -> (CacheManager, Arc<MemoryStore>, Arc<MemoryStore>) {
        let small_store = Arc::new(MemoryStore::with_capacity(small_capacity));
        let large_store = Arc::new(MemoryStore::new());
        let config = CacheConfig::default();
        let manager = CacheManager::new(
            SmallDurableTier::new(small_store.clone(), 1024, 6, config.small_tier_ttl()),
            LargeDurableTier::new(large_store.clone(), config.large_tier_ttl()),
            &config,
        );
        (manager, small_store, large_store)
    }

    #[test]
    fn test_set_then_get_hits_memory() {
        let (cache, _, _) = manager_with(1 << 20);
        assert!(cache.set("k", Bytes::from_static(b"v"), HOUR, Durability::Standard));

        let hit = cache.get("k").unwrap();
        assert_eq!(hit.value.as_ref(), b"v");
        assert_eq!(hit.tier, CacheTier::Memory);
    }

    #[test]
    fn test_durable_hit_is_promoted() {
        let (cache, small, _) = manager_with(1 << 20);
        cache.set("k", Bytes::from_static(b"value"), HOUR, Durability::Standard);
        assert!(small.get("k").unwrap().is_some());

        // Simulate a restart of the process-memory tier
        cache.memory.remove("k");
        assert_eq!(cache.get("k").unwrap().tier, CacheTier::Small);
        assert_eq!(cache.get("k").unwrap().tier, CacheTier::Memory);

        let stats = cache.stats();
        assert_eq!(stats.small_hits, 1);
        assert_eq!(stats.memory_hits, 1);
    }

    #[test]
    fn test_standard_falls_back_to_large() {
        let (cache, small, large) = manager_with(16);
        let value = Bytes::from(vec![b'x'; 4_096]);

        assert!(cache.set("big", value.clone(), HOUR, Durability::Standard));
        assert!(small.get("big").unwrap().is_none());
        assert!(large.get("big").unwrap().is_some());

        cache.memory.remove("big");
        let hit = cache.get("big").unwrap();
        assert_eq!(hit.tier, CacheTier::Large);
        assert_eq!(hit.value, value);
    }

    #[test]
    fn test_memory_durability_skips_durable_tiers() {
        let (cache, small, large) = manager_with(1 << 20);
        cache.set("m", Bytes::from_static(b"v"), HOUR, Durability::Memory);
        assert!(small.usage().key_count == 0 && large.usage().key_count == 0);
    }

    #[test]
    fn test_miss_and_invalidate() {
        let (cache, _, _) = manager_with(1 << 20);
        assert!(cache.get("absent").is_none());

        cache.set("k", Bytes::from_static(b"v"), HOUR, Durability::Large);
        cache.invalidate("k");
        assert!(cache.get("k").is_none());
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn test_json_helpers() {
        let (cache, _, _) = manager_with(1 << 20);
        let value = vec![1u32, 2, 3];
        assert!(cache.set_json("nums", &value, HOUR, Durability::Standard));
        assert_eq!(cache.get_json::<Vec<u32>>("nums"), Some(value));

        cache.set("bad", Bytes::from_static(b"not json"), HOUR, Durability::Memory);
        assert_eq!(cache.get_json::<Vec<u32>>("bad"), None);
        assert!(cache.get("bad").is_none());
    }

    #[test]
    fn test_tile_cache() {
        let (cache, _, _) = manager_with(1 << 20);
        assert!(cache.get_tile("tile:0_0").is_none());

        cache.put_tile("tile:0_0", Arc::new(vec![Feature::point(1.0, 1.0)]));
        assert_eq!(cache.get_tile("tile:0_0").unwrap().len(), 1);

        let stats = cache.stats();
        assert_eq!((stats.tile_hits, stats.tile_misses), (1, 1));
        assert_eq!(stats.tile_entries, 1);
    }

    #[test]
    fn test_expired_memory_entries_cleaned() {
        let (cache, _, _) = manager_with(1 << 20);
        cache.set("gone", Bytes::from_static(b"v"), Duration::ZERO, Durability::Memory);
        cache.set("kept", Bytes::from_static(b"v"), HOUR, Durability::Memory);
        assert!(cache.get("gone").is_none());
        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.stats().memory_entries, 1);
    }
}
