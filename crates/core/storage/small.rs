//! Capacity-bounded durable tier with gzip compression and chunking.

use super::entry::{CacheEntry, EntryMeta, StoredValue};
use super::{DurableStore, StorageStats};
use crate::error::{GridlineError, Result};
use bytes::Bytes;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

/// Small durable tier.
///
/// Values are gzip-compressed. A compressed payload up to `chunk_threshold`
/// bytes is stored inline in one record; a larger one is split into
/// `{key}::chunk::{i}` records and the record at `{key}` becomes a manifest
/// carrying the chunk count.
pub struct SmallDurableTier {
    store: Arc<dyn DurableStore>,
    chunk_threshold: usize,
    compression: Compression,
    max_ttl: Duration,
}

impl SmallDurableTier {
    pub fn new(
        store: Arc<dyn DurableStore>,
        chunk_threshold: usize,
        compression_level: u32,
        max_ttl: Duration,
    ) -> Self {
        Self {
            store,
            chunk_threshold: chunk_threshold.max(1),
            compression: Compression::new(compression_level.min(9)),
            max_ttl,
        }
    }

    /// Store `value` under `key` for at most `ttl` (capped at the tier TTL).
    ///
    /// Any previous value and its chunks are removed first. If a chunk or the
    /// manifest cannot be written, the chunks written so far are removed and
    /// the error is returned; nothing is left behind for the key.
    pub fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let compressed = gzip(value, self.compression)?;
        self.remove(key)?;

        let mut meta = EntryMeta::new(ttl.min(self.max_ttl), value.len(), compressed.len(), true);

        if compressed.len() <= self.chunk_threshold {
            let record = CacheEntry {
                meta,
                payload: compressed,
            }
            .encode()?;
            return self.store.put(key, &record);
        }

        // Two concurrent writers to one key can interleave chunks under a
        // single manifest. The size and gzip checksum checks in `read` reject
        // such a mix and the entry is cleared instead of served.
        let chunks: Vec<&[u8]> = compressed.chunks(self.chunk_threshold).collect();
        meta.chunks = chunks.len() as u32;

        for (i, chunk) in chunks.iter().enumerate() {
            if let Err(e) = self.store.put(&chunk_key(key, i), chunk) {
                self.rollback(key, i);
                return Err(e);
            }
        }

        let manifest = CacheEntry {
            meta,
            payload: Vec::new(),
        }
        .encode()?;
        if let Err(e) = self.store.put(key, &manifest) {
            self.rollback(key, chunks.len());
            return Err(e);
        }

        log::debug!(
            "Stored {} as {} chunks ({} -> {} bytes)",
            key,
            chunks.len(),
            value.len(),
            compressed.len()
        );
        Ok(())
    }

    /// Read a fresh value. Expired and missing entries are misses; corrupt
    /// entries are cleared and read as misses.
    pub fn get(&self, key: &str) -> Option<StoredValue> {
        match self.read(key) {
            Ok(value) => value,
            Err(e @ (GridlineError::CorruptEntry(_) | GridlineError::Compression(_))) => {
                log::warn!("Clearing corrupt small-tier entry {}: {}", key, e);
                if let Err(e) = self.remove(key) {
                    log::warn!("Failed to clear {}: {}", key, e);
                }
                None
            }
            Err(e) => {
                log::warn!("Small-tier read of {} failed: {}", key, e);
                None
            }
        }
    }

    fn read(&self, key: &str) -> Result<Option<StoredValue>> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(None);
        };
        let entry = CacheEntry::decode(key, &raw)?;
        if !entry.meta.is_fresh() {
            return Ok(None);
        }

        let meta = entry.meta;
        let stored = if meta.chunks == 0 {
            entry.payload
        } else {
            let mut buf = Vec::with_capacity(meta.stored_size as usize);
            for i in 0..meta.chunks as usize {
                let chunk = self.store.get(&chunk_key(key, i))?.ok_or_else(|| {
                    GridlineError::CorruptEntry(format!(
                        "{}: missing chunk {} of {}",
                        key, i, meta.chunks
                    ))
                })?;
                buf.extend_from_slice(&chunk);
            }
            buf
        };

        if stored.len() as u64 != meta.stored_size {
            return Err(GridlineError::CorruptEntry(format!(
                "{}: stored size {} does not match recorded {}",
                key,
                stored.len(),
                meta.stored_size
            )));
        }

        let value = if meta.compressed {
            gunzip(&stored)?
        } else {
            stored
        };
        if value.len() as u64 != meta.original_size {
            return Err(GridlineError::CorruptEntry(format!(
                "{}: decoded size {} does not match recorded {}",
                key,
                value.len(),
                meta.original_size
            )));
        }

        Ok(Some(StoredValue {
            value: Bytes::from(value),
            remaining_ttl: meta.remaining_ttl(),
        }))
    }

    /// Remove `key` and every chunk stored for it.
    pub fn remove(&self, key: &str) -> Result<()> {
        self.store.delete(key)?;
        for chunk in self.store.keys_with_prefix(&chunk_prefix(key))? {
            self.store.delete(&chunk)?;
        }
        Ok(())
    }

    fn rollback(&self, key: &str, written: usize) {
        for i in 0..written {
            if let Err(e) = self.store.delete(&chunk_key(key, i)) {
                log::warn!("Failed to roll back chunk {} of {}: {}", i, key, e);
            }
        }
    }

    pub fn usage(&self) -> StorageStats {
        self.store.usage()
    }
}

fn chunk_prefix(key: &str) -> String {
    format!("{}::chunk::", key)
}

fn chunk_key(key: &str, index: usize) -> String {
    format!("{}::chunk::{}", key, index)
}

pub(crate) fn gzip(data: &[u8], level: Compression) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), level);
    encoder
        .write_all(data)
        .map_err(|e| GridlineError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| GridlineError::Compression(e.to_string()))
}

pub(crate) fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| GridlineError::Compression(e.to_string()))?;
    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    const DAY: Duration = Duration::from_secs(86_400);

    /// Deterministic bytes that gzip cannot shrink much.
    fn noisy(len: usize) -> Vec<u8> {
        let mut state = 0x2545_f491_4f6c_dd1du64;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 24) as u8
            })
            .collect()
    }

    fn tier(store: Arc<dyn DurableStore>, threshold: usize) -> SmallDurableTier {
        SmallDurableTier::new(store, threshold, 6, DAY)
    }

    #[test]
    fn test_inline_roundtrip() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let tier = tier(store.clone(), 1024);
        let value = br#"{"type":"FeatureCollection","features":[]}"#.repeat(20);

        tier.set("fiber:q", &value, Duration::from_secs(60)).unwrap();
        let hit = tier.get("fiber:q").unwrap();
        assert_eq!(hit.value.as_ref(), value.as_slice());
        assert!(hit.remaining_ttl <= Duration::from_secs(60));
        assert_eq!(store.keys_with_prefix("").unwrap(), vec!["fiber:q"]);
    }

    #[test]
    fn test_chunked_roundtrip() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let tier = tier(store.clone(), 256);
        let value = noisy(4_000);

        tier.set("plants:dataset", &value, DAY).unwrap();
        let chunks = store.keys_with_prefix("plants:dataset::chunk::").unwrap();
        assert!(chunks.len() > 1);

        let hit = tier.get("plants:dataset").unwrap();
        assert_eq!(hit.value.as_ref(), value.as_slice());
    }

    #[test]
    fn test_rewrite_clears_stale_chunks() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let tier = tier(store.clone(), 256);

        tier.set("k", &noisy(4_000), DAY).unwrap();
        assert!(!store.keys_with_prefix("k::chunk::").unwrap().is_empty());

        tier.set("k", b"small", DAY).unwrap();
        assert!(store.keys_with_prefix("k::chunk::").unwrap().is_empty());
        assert_eq!(tier.get("k").unwrap().value.as_ref(), b"small");
    }

    #[test]
    fn test_quota_failure_rolls_back() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::with_capacity(1_500));
        let tier = tier(store.clone(), 256);

        let err = tier.set("big", &noisy(8_000), DAY).unwrap_err();
        assert!(matches!(err, GridlineError::QuotaExceeded { .. }));
        assert!(store.keys_with_prefix("").unwrap().is_empty());
        assert!(tier.get("big").is_none());
    }

    #[test]
    fn test_expired_entry_is_miss_but_kept() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let tier = tier(store.clone(), 1024);

        tier.set("k", b"value", Duration::ZERO).unwrap();
        assert!(tier.get("k").is_none());
        assert!(store.get("k").unwrap().is_some());
    }

    #[test]
    fn test_ttl_capped_at_tier_ttl() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let tier = SmallDurableTier::new(store, 1024, 6, Duration::from_secs(10));

        tier.set("k", b"value", DAY).unwrap();
        assert!(tier.get("k").unwrap().remaining_ttl <= Duration::from_secs(10));
    }

    #[test]
    fn test_corrupt_entries_are_cleared() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let tier = tier(store.clone(), 256);

        store.put("garbage", b"\x00\x01not a record").unwrap();
        assert!(tier.get("garbage").is_none());
        assert!(store.get("garbage").unwrap().is_none());

        // Missing chunk
        tier.set("chunked", &noisy(4_000), DAY).unwrap();
        store.delete("chunked::chunk::1").unwrap();
        assert!(tier.get("chunked").is_none());
        assert!(store.keys_with_prefix("chunked").unwrap().is_empty());

        // Damaged compressed payload of the right length
        tier.set("damaged", &noisy(4_000), DAY).unwrap();
        let chunk = store.get("damaged::chunk::0").unwrap().unwrap();
        store.put("damaged::chunk::0", &vec![0u8; chunk.len()]).unwrap();
        assert!(tier.get("damaged").is_none());
        assert!(store.get("damaged").unwrap().is_none());
    }

    #[test]
    fn test_interleaved_chunk_writes_are_never_served() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let tier = tier(store.clone(), 256);
        let first = noisy(4_000);
        let second: Vec<u8> = noisy(6_000).iter().map(|b| b ^ 0x5a).collect();

        tier.set("k", &first, DAY).unwrap();
        let stale = store.get("k::chunk::1").unwrap().unwrap();

        // The second writer wins the manifest but a chunk of the first lands last
        tier.set("k", &second, DAY).unwrap();
        store.put("k::chunk::1", &stale).unwrap();

        assert!(tier.get("k").is_none());
        assert!(store.keys_with_prefix("k").unwrap().is_empty());
    }
}
