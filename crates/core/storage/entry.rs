//! On-store record format shared by the durable tiers.

use crate::error::{GridlineError, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Bumped whenever the record layout changes; older records read as corrupt.
pub const FORMAT_VERSION: u16 = 1;

/// Metadata stored alongside every durable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    /// Wall-clock write time in milliseconds since the Unix epoch
    pub stored_at_ms: u64,
    pub ttl_ms: u64,
    pub format_version: u16,
    /// Size of the value before compression
    pub original_size: u64,
    /// Size of the stored payload (all chunks together when chunked)
    pub stored_size: u64,
    pub compressed: bool,
    /// Number of chunk records; zero when the payload is inline
    pub chunks: u32,
}

impl EntryMeta {
    pub fn new(ttl: Duration, original_size: usize, stored_size: usize, compressed: bool) -> Self {
        Self {
            stored_at_ms: now_ms(),
            ttl_ms: ttl.as_millis().min(u64::MAX as u128) as u64,
            format_version: FORMAT_VERSION,
            original_size: original_size as u64,
            stored_size: stored_size as u64,
            compressed,
            chunks: 0,
        }
    }

    /// Age strictly below TTL.
    pub fn is_fresh_at(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.stored_at_ms) < self.ttl_ms
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(now_ms())
    }

    pub fn remaining_ttl(&self) -> Duration {
        let age = now_ms().saturating_sub(self.stored_at_ms);
        Duration::from_millis(self.ttl_ms.saturating_sub(age))
    }
}

/// A metadata header plus inline payload. Chunked values store an empty
/// payload here and the data under separate chunk keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub meta: EntryMeta,
    pub payload: Vec<u8>,
}

impl CacheEntry {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a stored record, rejecting unknown format versions.
    pub fn decode(key: &str, bytes: &[u8]) -> Result<Self> {
        let entry: CacheEntry = bincode::deserialize(bytes)
            .map_err(|e| GridlineError::CorruptEntry(format!("{}: {}", key, e)))?;
        if entry.meta.format_version != FORMAT_VERSION {
            return Err(GridlineError::CorruptEntry(format!(
                "{}: format version {} (expected {})",
                key, entry.meta.format_version, FORMAT_VERSION
            )));
        }
        Ok(entry)
    }
}

/// A value read from a durable tier together with its remaining lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub value: Bytes,
    pub remaining_ttl: Duration,
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
