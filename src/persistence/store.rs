// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Synchronous key-value stores backing snapshot persistence

use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::errors::StorageError;

/// Minimal string key-value store
///
/// Implementations are synchronous; the persistence bridge calls them from
/// the blocking pool.
pub trait KeyValueStore: Send + Sync + fmt::Debug {
    /// Reads a value, `Ok(None)` if the key is absent
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes a value, replacing any previous one
    ///
    /// Fails with [`StorageError::QuotaExceeded`] when the write would push the
    /// store past its quota.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Deletes a key; removing an absent key is not an error
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

fn quota_check(
    key: &str,
    quota: Option<u64>,
    used_by_others: u64,
    needed: u64,
) -> Result<(), StorageError> {
    let Some(quota) = quota else {
        return Ok(());
    };
    let available = quota.saturating_sub(used_by_others);
    if needed > available {
        return Err(StorageError::QuotaExceeded {
            key: key.to_string(),
            needed,
            available,
        });
    }
    Ok(())
}

/// In-process store, optionally bounded by a byte quota
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    quota: Option<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits the total size of stored values to `bytes`
    pub fn with_quota(mut self, bytes: u64) -> Self {
        self.quota = Some(bytes);
        self
    }

    /// Total bytes held
    pub fn used_bytes(&self) -> u64 {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|v| v.len() as u64)
            .sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let used_by_others = entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(_, v)| v.len() as u64)
            .sum();
        quota_check(key, self.quota, used_by_others, value.len() as u64)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory
///
/// Writes go to a temporary file that is then renamed over the target, so a
/// crash mid-write leaves the previous snapshot intact. Each write gets its
/// own temporary file and writes through one store are serialized.
///
/// # Examples
///
/// ```rust,no_run
/// use blockfeed::persistence::{FileStore, KeyValueStore};
///
/// let store = FileStore::new("/var/cache/blockfeed").with_quota(5 * 1024 * 1024);
/// store.set("blockfeed:blocks", "{}")?;
/// # Ok::<(), blockfeed::StorageError>(())
/// ```
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    quota: Option<u64>,
    write_lock: Mutex<()>,
    temp_seq: AtomicU64,
}

impl FileStore {
    /// Creates a store rooted at `dir`; the directory is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            quota: None,
            write_lock: Mutex::new(()),
            temp_seq: AtomicU64::new(0),
        }
    }

    /// Limits the total size of stored files to `bytes`
    pub fn with_quota(mut self, bytes: u64) -> Self {
        self.quota = Some(bytes);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `blockfeed:blocks` is stored as `blockfeed_blocks.json`
    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }

    /// `blockfeed_blocks.json` is staged as `blockfeed_blocks.<pid>.<seq>.tmp`
    fn temp_path_for(&self, path: &Path) -> PathBuf {
        let seq = self.temp_seq.fetch_add(1, Ordering::Relaxed);
        path.with_extension(format!("{}.{seq}.tmp", std::process::id()))
    }

    fn used_bytes_excluding(&self, exclude: &Path) -> Result<u64, StorageError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StorageError::io(self.dir.display().to_string(), e)),
        };

        let mut used = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path == exclude || path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            used += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
        Ok(used)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(path.display().to_string(), e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let _writing = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if self.quota.is_some() {
            let used_by_others = self.used_bytes_excluding(&path)?;
            quota_check(key, self.quota, used_by_others, value.len() as u64)?;
        }

        std::fs::create_dir_all(&self.dir)
            .map_err(|e| StorageError::io(self.dir.display().to_string(), e))?;

        let temp_path = self.temp_path_for(&path);
        std::fs::write(&temp_path, value)
            .map_err(|e| StorageError::io(temp_path.display().to_string(), e))?;

        if let Err(e) = std::fs::rename(&temp_path, &path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(StorageError::io(path.display().to_string(), e));
        }

        debug!(key, path = %path.display(), bytes = value.len(), "Snapshot written");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let _writing = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(path.display().to_string(), e)),
        }
    }
}
