// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Best-effort snapshotting of the cache
//!
//! The cache is written as three independent sections, each under its own key
//! and wrapped in a versioned envelope:
//!
//! | Key | Contents | Freshness |
//! |---|---|---|
//! | `blockfeed:blocks` | global block window | 30 s |
//! | `blockfeed:pages` | per-page windows | 5 min |
//! | `blockfeed:peers` | validator peers | 10 min |
//!
//! On restore every section is judged on its own. A missing, unreadable,
//! version-mismatched or stale section is a cache miss and never an error.
//!
//! When the store reports a quota error the per-page section, the largest and
//! least valuable, is dropped and the other sections are retried once.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, PageWindows};
use crate::config::constants::persistence::{
    BLOCKS_KEY, FORMAT_VERSION, PAGES_KEY, PEERS_KEY, SKIP_RESTORE_KEY,
};
use crate::config::PersistenceConfig;
use crate::errors::StorageError;
use crate::spans;
use crate::types::{Block, TimestampMillis, ValidatorPeer};

mod debounce;
mod store;

pub use debounce::Debouncer;
pub use store::{FileStore, KeyValueStore, MemoryStore};

/// Versioned wrapper around every persisted section
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    saved_at: TimestampMillis,
    data: T,
}

/// Sections recovered by [`PersistenceBridge::restore`]
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RestoredSnapshot {
    pub blocks: Option<Vec<Block>>,
    pub pages: Option<PageWindows>,
    pub peers: Option<Vec<ValidatorPeer>>,
}

impl RestoredSnapshot {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_none() && self.pages.is_none() && self.peers.is_none()
    }

    /// Seeds `cache` with every recovered section
    pub fn apply(self, cache: &CacheStore) {
        if let Some(blocks) = self.blocks {
            cache.restore_blocks(blocks);
        }
        if let Some(pages) = self.pages {
            cache.restore_pages(pages);
        }
        if let Some(peers) = self.peers {
            cache.restore_peers(peers);
        }
    }
}

/// Reads and writes cache snapshots through a [`KeyValueStore`]
///
/// Clones share one save lock, so snapshots are written one at a time and
/// each reads the cache only once it holds the lock.
#[derive(Debug, Clone)]
pub struct PersistenceBridge {
    store: Arc<dyn KeyValueStore>,
    config: PersistenceConfig,
    save_lock: Arc<Mutex<()>>,
}

impl PersistenceBridge {
    pub fn new(store: Arc<dyn KeyValueStore>, config: PersistenceConfig) -> Self {
        Self {
            store,
            config,
            save_lock: Arc::new(Mutex::new(())),
        }
    }

    /// File-backed when `cache_dir` is set, in-memory otherwise
    pub fn from_config(config: PersistenceConfig) -> Self {
        let store: Arc<dyn KeyValueStore> = match (&config.cache_dir, config.quota_bytes) {
            (Some(dir), Some(quota)) => Arc::new(FileStore::new(dir).with_quota(quota)),
            (Some(dir), None) => Arc::new(FileStore::new(dir)),
            (None, Some(quota)) => Arc::new(MemoryStore::new().with_quota(quota)),
            (None, None) => Arc::new(MemoryStore::new()),
        };
        Self::new(store, config)
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Makes the next [`restore`](Self::restore) return nothing
    pub fn skip_next_restore(&self) -> Result<(), StorageError> {
        self.store.set(SKIP_RESTORE_KEY, "1")
    }

    /// Loads every section that is present, current and fresh
    pub fn restore(&self) -> RestoredSnapshot {
        let span = spans::restore_snapshot();
        let _guard = span.enter();

        match self.store.get(SKIP_RESTORE_KEY) {
            Ok(Some(_)) => {
                if let Err(e) = self.store.remove(SKIP_RESTORE_KEY) {
                    warn!(error = %e, "Failed to clear skip-restore flag");
                }
                info!("Skip-restore flag set, starting with an empty cache");
                return RestoredSnapshot::default();
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to read skip-restore flag"),
        }

        let snapshot = RestoredSnapshot {
            blocks: self.load_section(BLOCKS_KEY, self.config.blocks_freshness),
            pages: self.load_section(PAGES_KEY, self.config.pages_freshness),
            peers: self.load_section(PEERS_KEY, self.config.peers_freshness),
        };

        info!(
            blocks = snapshot.blocks.as_ref().map_or(0, Vec::len),
            pages = snapshot.pages.as_ref().map_or(0, |p| p.len()),
            peers = snapshot.peers.as_ref().map_or(0, Vec::len),
            "Snapshot restored"
        );
        snapshot
    }

    fn load_section<T: DeserializeOwned>(&self, key: &str, freshness: Duration) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key, "No persisted section");
                return None;
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to read persisted section");
                return None;
            }
        };

        let envelope: Envelope<T> = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(key, error = %e, "Discarding unreadable section");
                return None;
            }
        };

        if envelope.version != FORMAT_VERSION {
            info!(
                key,
                found = envelope.version,
                expected = FORMAT_VERSION,
                "Discarding section with different format version"
            );
            return None;
        }

        if envelope.saved_at.is_older_than(freshness) {
            debug!(
                key,
                age_ms = envelope.saved_at.age_since_now().as_millis() as u64,
                "Discarding stale section"
            );
            return None;
        }

        Some(envelope.data)
    }

    fn encode<T: Serialize>(key: &str, data: &T, now: TimestampMillis) -> Result<String, StorageError> {
        serde_json::to_string(&Envelope {
            version: FORMAT_VERSION,
            saved_at: now,
            data,
        })
        .map_err(|e| StorageError::serialization(key, e))
    }

    /// Writes all three sections synchronously
    ///
    /// On a quota error the per-page section is removed and the global blocks
    /// and peers are written once more.
    pub fn save(&self, cache: &CacheStore) -> Result<(), StorageError> {
        let span = spans::save_snapshot();
        let _guard = span.enter();
        let _saving = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let now = TimestampMillis::now();
        let blocks = Self::encode(BLOCKS_KEY, &cache.global_blocks(), now)?;
        let pages = Self::encode(PAGES_KEY, &cache.snapshot_pages(), now)?;
        let peers = Self::encode(PEERS_KEY, &cache.validator_peers(), now)?;

        let first_attempt = [(BLOCKS_KEY, &blocks), (PEERS_KEY, &peers), (PAGES_KEY, &pages)]
            .into_iter()
            .try_for_each(|(key, value)| self.store.set(key, value));

        match first_attempt {
            Ok(()) => {
                debug!(bytes = blocks.len() + pages.len() + peers.len(), "Snapshot saved");
                Ok(())
            }
            Err(e) if e.is_quota_exceeded() => {
                warn!(error = %e, "Storage quota exceeded, dropping per-page windows");
                self.store.remove(PAGES_KEY)?;
                self.store.set(BLOCKS_KEY, &blocks)?;
                self.store.set(PEERS_KEY, &peers)?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Writes immediately on the blocking pool, logging any failure
    pub async fn flush(&self, cache: Arc<CacheStore>) {
        let bridge = self.clone();
        let result = tokio::task::spawn_blocking(move || bridge.save(&cache)).await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Snapshot save failed"),
            Err(e) => warn!(error = %e, "Snapshot save task failed"),
        }
    }
}
