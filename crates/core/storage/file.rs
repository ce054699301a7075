//! Directory-backed durable store: one file per key.

use super::{DurableStore, StorageStats};
use crate::error::{GridlineError, Result};
use bytes::Bytes;
use parking_lot::Mutex;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const RECORD_EXT: &str = "rec";
const TEMP_EXT: &str = "tmp";

/// Stores each key as `<hex(key)>.rec` under a directory.
///
/// Writes go to a temporary file that is renamed into place, so a reader
/// never observes a half-written record. Writers are serialised so the
/// capacity check and the write happen together.
pub struct FileStore {
    dir: PathBuf,
    capacity: Option<u64>,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (creating if needed) an unbounded store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            capacity: None,
            write_lock: Mutex::new(()),
        })
    }

    /// Open a store that refuses writes beyond `bytes` of record data.
    pub fn open_with_capacity(dir: impl Into<PathBuf>, bytes: u64) -> Result<Self> {
        let mut store = Self::open(dir)?;
        store.capacity = Some(bytes);
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", encode_key(key), RECORD_EXT))
    }

    /// `(key, size)` for every record file in the directory.
    fn records(&self) -> Result<Vec<(String, u64)>> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(decode_key)
            else {
                continue;
            };
            // A record deleted between listing and stat is simply skipped
            match entry.metadata() {
                Ok(meta) => records.push((key, meta.len())),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(records)
    }
}

impl DurableStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Bytes>> {
        match fs::read(self.record_path(key)) {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let _guard = self.write_lock.lock();
        let path = self.record_path(key);

        if let Some(capacity) = self.capacity {
            let used: u64 = self.records()?.iter().map(|(_, size)| size).sum();
            let replaced = match fs::metadata(&path) {
                Ok(meta) => meta.len(),
                Err(_) => 0,
            };
            let needed = value.len() as u64;
            let available = capacity.saturating_sub(used.saturating_sub(replaced));
            if needed > available {
                return Err(GridlineError::QuotaExceeded { needed, available });
            }
        }

        let temp = path.with_extension(TEMP_EXT);
        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&temp)?;
            file.write_all(value)?;
            file.sync_all()?;
            fs::rename(&temp, &path)
        };
        if let Err(e) = write() {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let _guard = self.write_lock.lock();
        match fs::remove_file(self.record_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .records()?
            .into_iter()
            .map(|(key, _)| key)
            .filter(|key| key.starts_with(prefix))
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn usage(&self) -> StorageStats {
        match self.records() {
            Ok(records) => StorageStats {
                key_count: records.len(),
                size_bytes: records.iter().map(|(_, size)| size).sum(),
                capacity_bytes: self.capacity,
            },
            Err(e) => {
                log::warn!("Failed to scan cache directory {:?}: {}", self.dir, e);
                StorageStats {
                    capacity_bytes: self.capacity,
                    ..StorageStats::default()
                }
            }
        }
    }
}

fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() * 2);
    for byte in key.as_bytes() {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

fn decode_key(hex: &str) -> Option<String> {
    if hex.len() % 2 != 0 {
        return None;
    }
    let bytes = (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}
