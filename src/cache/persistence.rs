//! Persistence Module
//!
//! Best-effort snapshot storage for the cache. Storage is a plain key-value
//! slot interface so the cache can be backed by memory in tests and by the
//! filesystem in the server.

use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheConfig, CacheConfigPatch, CacheEntry, CacheStats};
use crate::error::StorageError;

// == Storage Trait ==
/// A set of named string slots.
pub trait Storage: Send + Sync + Debug {
    /// Reads a slot, `Ok(None)` when it was never written.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Overwrites a slot.
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Deletes a slot; missing slots are not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Names of every slot currently held.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

// == Persist Outcome ==
/// Result of the snapshot write that follows a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PersistOutcome {
    /// Persistence is turned off for this cache
    Disabled,
    /// Snapshot written to storage
    Persisted,
    /// Snapshot could not be written; the cache keeps working in memory
    MemoryOnly { reason: String },
}

impl PersistOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, PersistOutcome::Persisted)
    }
}

// == Snapshot ==
/// Serialized cache state, shared by `export` and persistence.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Snapshot<'a, T> {
    pub cache: Vec<(&'a String, &'a CacheEntry<T>)>,
    pub stats: &'a CacheStats,
    pub config: &'a CacheConfig,
    pub exported_at: u64,
}

/// Owned form of a snapshot as read back; stats and config may be missing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoadedSnapshot<T> {
    pub cache: Vec<(String, CacheEntry<T>)>,
    #[serde(default)]
    pub stats: Option<CacheStats>,
    #[serde(default)]
    pub config: CacheConfigPatch,
}

// == Memory Storage ==
/// In-process storage with an optional byte quota.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that refuses writes bringing the total above `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            quota: Some(bytes),
        }
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.slots.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut slots = self.slots.lock();
        if let Some(limit) = self.quota {
            let others: usize = slots
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > limit {
                return Err(StorageError::QuotaExceeded { needed, limit });
            }
        }
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.slots.lock().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.slots.lock().keys().cloned().collect())
    }
}

// == File Storage ==
/// One JSON file per slot under a directory.
///
/// Writes are plain overwrites; two processes sharing a directory can
/// clobber each other's snapshots.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File for a slot. Bytes outside `[A-Za-z0-9.-]` are written as `_xx`
    /// so distinct keys never share a file.
    fn slot_path(&self, key: &str) -> PathBuf {
        let mut file_name = String::with_capacity(key.len());
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'.' {
                file_name.push(byte as char);
            } else {
                file_name.push_str(&format!("_{:02x}", byte));
            }
        }
        self.dir.join(format!("{}.json", file_name))
    }

    /// Inverse of the `slot_path` escaping; `None` for foreign files.
    fn slot_key(file_name: &str) -> Option<String> {
        let stem = file_name.strip_suffix(".json")?;
        let raw = stem.as_bytes();
        let mut bytes = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'_' {
                let hex = stem.get(i + 1..i + 3)?;
                bytes.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            } else {
                bytes.push(raw[i]);
                i += 1;
            }
        }
        String::from_utf8(bytes).ok()
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.slot_path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.slot_path(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.slot_path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry?;
            if let Some(key) = entry.file_name().to_str().and_then(Self::slot_key) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}
