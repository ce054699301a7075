//! High-capacity durable tier storing raw values.

use super::entry::{CacheEntry, EntryMeta, StoredValue};
use super::small::gunzip;
use super::{DurableStore, StorageStats};
use crate::error::{GridlineError, Result};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

/// Large durable tier: one uncompressed record per key.
pub struct LargeDurableTier {
    store: Arc<dyn DurableStore>,
    max_ttl: Duration,
}

impl LargeDurableTier {
    pub fn new(store: Arc<dyn DurableStore>, max_ttl: Duration) -> Self {
        Self { store, max_ttl }
    }

    pub fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let meta = EntryMeta::new(ttl.min(self.max_ttl), value.len(), value.len(), false);
        let record = CacheEntry {
            meta,
            payload: value.to_vec(),
        }
        .encode()?;
        self.store.put(key, &record)
    }

    /// Read a fresh value; corrupt records are cleared and read as misses.
    pub fn get(&self, key: &str) -> Option<StoredValue> {
        match self.read(key) {
            Ok(value) => value,
            Err(e @ (GridlineError::CorruptEntry(_) | GridlineError::Compression(_))) => {
                log::warn!("Clearing corrupt large-tier entry {}: {}", key, e);
                if let Err(e) = self.store.delete(key) {
                    log::warn!("Failed to clear {}: {}", key, e);
                }
                None
            }
            Err(e) => {
                log::warn!("Large-tier read of {} failed: {}", key, e);
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
        if entry.meta.chunks != 0 || entry.payload.len() as u64 != entry.meta.stored_size {
            return Err(GridlineError::CorruptEntry(format!(
                "{}: unexpected record layout",
                key
            )));
        }

        let value = if entry.meta.compressed {
            gunzip(&entry.payload)?
        } else {
            entry.payload
        };
        if value.len() as u64 != entry.meta.original_size {
            return Err(GridlineError::CorruptEntry(format!(
                "{}: decoded size {} does not match recorded {}",
                key,
                value.len(),
                entry.meta.original_size
            )));
        }

        Ok(Some(StoredValue {
            value: Bytes::from(value),
            remaining_ttl: entry.meta.remaining_ttl(),
        }))
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.store.delete(key)?;
        Ok(())
    }

    pub fn usage(&self) -> StorageStats {
        self.store.usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_large_tier_roundtrip() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let tier = LargeDurableTier::new(store.clone(), Duration::from_secs(3_600));
        let value = vec![7u8; 50_000];

        tier.set("proximity:lines", &value, Duration::from_secs(600))
            .unwrap();
        let hit = tier.get("proximity:lines").unwrap();
        assert_eq!(hit.value.len(), 50_000);
        assert!(hit.remaining_ttl <= Duration::from_secs(600));

        // Stored raw: record is larger than the value
        let raw = store.get("proximity:lines").unwrap().unwrap();
        assert!(raw.len() > value.len());
    }

    #[test]
    fn test_large_tier_expiry_and_corruption() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let tier = LargeDurableTier::new(store.clone(), Duration::from_secs(3_600));

        tier.set("k", b"v", Duration::ZERO).unwrap();
        assert!(tier.get("k").is_none());
        assert!(store.get("k").unwrap().is_some());

        store.put("bad", b"nope").unwrap();
        assert!(tier.get("bad").is_none());
        assert!(store.get("bad").unwrap().is_none());
    }
}
