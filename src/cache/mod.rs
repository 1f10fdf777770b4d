// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! In-memory cache of live chain state
//!
//! [`CacheStore`] holds everything the feed knows:
//!
//! - the global rolling block window (newest-first, capped)
//! - named per-page block windows, each capped independently
//! - a bounded set of recently seen transaction hashes
//! - latest-value slots for mempool stats, scheduled transactions and
//!   validator peers
//!
//! All state sits behind one mutex. Every write performs its checks and its
//! mutation inside a single critical section, so two feeds racing to ingest
//! the same block number cannot both succeed. Reads return copies.
//!
//! The store itself publishes nothing; the
//! [`RealtimeManager`](crate::RealtimeManager) turns write outcomes into
//! notifications and persistence requests once the lock is released.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use alloy_primitives::{BlockNumber, TxHash};

use crate::config::WindowLimits;
use crate::types::{
    same_peer_set, Block, MempoolStats, ScheduledTransaction, TimestampMillis, ValidatorPeer,
};

mod dedup;
mod window;

pub use dedup::RecentHashes;
pub use window::{BlockWindow, WindowPush};

/// Per-page windows keyed by page id
pub type PageWindows = HashMap<String, Vec<Block>>;

/// Counter bumped on every peer-list replacement
///
/// Enrichment results carry the generation they were computed for and are
/// dropped if the list has moved on since.
pub type PeerGeneration = u64;

/// Outcome of [`CacheStore::ingest_block`]
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// The block was normalized, stored and advanced the last-seen counter
    Accepted(Block),
    /// The block carried no parseable number
    MissingNumber,
    /// The block is not newer than the last accepted one
    Stale {
        number: BlockNumber,
        last_seen: BlockNumber,
    },
}

/// Point-in-time view of cache sizes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Blocks in the global window
    pub global_blocks: usize,
    /// Number of named per-page windows
    pub page_windows: usize,
    /// Blocks across all per-page windows
    pub page_blocks: usize,
    /// Transaction hashes in the de-duplication set
    pub tracked_transactions: usize,
    /// Validator peers currently cached
    pub validator_peers: usize,
    /// Scheduled transactions currently cached
    pub scheduled_transactions: usize,
    /// Whether mempool stats have been received
    pub has_mempool_stats: bool,
    /// Highest accepted block number
    pub last_seen_block: Option<BlockNumber>,
    /// Blocks rejected by the monotonic check since start
    pub rejected_blocks: u64,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "blocks={}, pages={} ({} blocks), txs={}, peers={}, scheduled={}, mempool={}, last_seen={}, rejected={}",
            self.global_blocks,
            self.page_windows,
            self.page_blocks,
            self.tracked_transactions,
            self.validator_peers,
            self.scheduled_transactions,
            self.has_mempool_stats,
            self.last_seen_block
                .map_or_else(|| "-".to_string(), |n| n.to_string()),
            self.rejected_blocks,
        )
    }
}

#[derive(Debug)]
struct CacheState {
    global: BlockWindow,
    pages: HashMap<String, BlockWindow>,
    seen_txs: RecentHashes,
    mempool: Option<MempoolStats>,
    scheduled: Vec<ScheduledTransaction>,
    peers: Vec<ValidatorPeer>,
    peer_generation: PeerGeneration,
    last_seen: Option<BlockNumber>,
    rejected_blocks: u64,
}

/// Shared cache of blocks, mempool state and validator peers
#[derive(Debug)]
pub struct CacheStore {
    limits: WindowLimits,
    state: Mutex<CacheState>,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(WindowLimits::default())
    }
}

impl CacheStore {
    /// Creates an empty store with the given capacities
    pub fn new(limits: WindowLimits) -> Self {
        Self {
            limits,
            state: Mutex::new(CacheState {
                global: BlockWindow::new(limits.global_cap),
                pages: HashMap::new(),
                seen_txs: RecentHashes::new(limits.tx_dedup_cap),
                mempool: None,
                scheduled: Vec::new(),
                peers: Vec::new(),
                peer_generation: 0,
                last_seen: None,
                rejected_blocks: 0,
            }),
        }
    }

    pub fn limits(&self) -> WindowLimits {
        self.limits
    }

    // A panicking subscriber never holds this lock, but a poisoned mutex
    // still guards consistent state: every write completes before unlocking.
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The single entry point for blocks into the global window
    ///
    /// Rejects blocks without a number and blocks not newer than the
    /// last-seen counter; otherwise normalizes the block, pushes it as the new
    /// head and advances the counter.
    pub fn ingest_block(&self, block: Block) -> IngestOutcome {
        let Some(number) = block.number() else {
            return IngestOutcome::MissingNumber;
        };

        let mut state = self.lock();
        if let Some(last_seen) = state.last_seen {
            if number <= last_seen {
                state.rejected_blocks += 1;
                return IngestOutcome::Stale { number, last_seen };
            }
        }

        let block = block.normalized(number, TimestampMillis::now());
        state.global.push_newest(number, block.clone());
        state.last_seen = Some(number);
        IngestOutcome::Accepted(block)
    }

    /// Highest block number accepted so far
    pub fn last_seen_block(&self) -> Option<BlockNumber> {
        self.lock().last_seen
    }

    /// Copy of the global window, newest-first
    pub fn global_blocks(&self) -> Vec<Block> {
        self.lock().global.to_vec()
    }

    /// Copy of a named window, empty if it does not exist
    pub fn page_window(&self, page_id: &str) -> Vec<Block> {
        self.lock()
            .pages
            .get(page_id)
            .map(BlockWindow::to_vec)
            .unwrap_or_default()
    }

    /// Ids of all named windows
    pub fn page_ids(&self) -> Vec<String> {
        self.lock().pages.keys().cloned().collect()
    }

    /// Pushes a block onto a named window, creating it on first use
    ///
    /// Returns `None` when the block has no number, otherwise what the window
    /// did with it.
    pub fn append_block_to_named_window(&self, page_id: &str, block: Block) -> Option<WindowPush> {
        let number = block.number()?;
        let cap = self.limits.page_cap;

        let mut state = self.lock();
        let window = state
            .pages
            .entry(page_id.to_string())
            .or_insert_with(|| BlockWindow::new(cap));
        Some(window.push_newest(number, block))
    }

    /// Replaces a named window wholesale, returning its new length
    pub fn replace_named_window(&self, page_id: &str, blocks: Vec<Block>) -> usize {
        let window = BlockWindow::from_blocks(self.limits.page_cap, blocks);
        let len = window.len();
        self.lock().pages.insert(page_id.to_string(), window);
        len
    }

    /// Drops a named window, returning whether it existed
    pub fn clear_named_window(&self, page_id: &str) -> bool {
        self.lock().pages.remove(page_id).is_some()
    }

    pub fn set_mempool_stats(&self, stats: MempoolStats) {
        self.lock().mempool = Some(stats);
    }

    pub fn mempool_stats(&self) -> Option<MempoolStats> {
        self.lock().mempool.clone()
    }

    pub fn set_scheduled_transactions(&self, txs: Vec<ScheduledTransaction>) {
        self.lock().scheduled = txs;
    }

    pub fn scheduled_transactions(&self) -> Vec<ScheduledTransaction> {
        self.lock().scheduled.clone()
    }

    /// Replaces the peer list unconditionally
    pub fn set_validator_peers(&self, peers: Vec<ValidatorPeer>) -> PeerGeneration {
        let mut state = self.lock();
        state.peers = peers;
        state.peer_generation += 1;
        state.peer_generation
    }

    /// Replaces the peer list only if its identities differ from the cached one
    ///
    /// Returns the new generation when the list changed.
    pub fn replace_peers_if_changed(&self, peers: Vec<ValidatorPeer>) -> Option<PeerGeneration> {
        let mut state = self.lock();
        if same_peer_set(&state.peers, &peers) {
            return None;
        }
        state.peers = peers;
        state.peer_generation += 1;
        Some(state.peer_generation)
    }

    /// Stores an enriched peer list if no newer list arrived meanwhile
    pub fn apply_enriched_peers(
        &self,
        generation: PeerGeneration,
        peers: Vec<ValidatorPeer>,
    ) -> bool {
        let mut state = self.lock();
        if state.peer_generation != generation {
            return false;
        }
        state.peers = peers;
        true
    }

    pub fn validator_peers(&self) -> Vec<ValidatorPeer> {
        self.lock().peers.clone()
    }

    /// Records a transaction hash, returning `true` the first time it is seen
    pub fn remember_transaction(&self, hash: TxHash) -> bool {
        self.lock().seen_txs.insert(hash)
    }

    /// Records several hashes under one lock, returning the ones not seen before
    pub fn remember_transactions(&self, hashes: impl IntoIterator<Item = TxHash>) -> Vec<TxHash> {
        let mut state = self.lock();
        hashes
            .into_iter()
            .filter(|hash| state.seen_txs.insert(*hash))
            .collect()
    }

    /// Copy of every named window
    pub fn snapshot_pages(&self) -> PageWindows {
        self.lock()
            .pages
            .iter()
            .map(|(id, window)| (id.clone(), window.to_vec()))
            .collect()
    }

    /// Seeds the global window from a snapshot
    ///
    /// The last-seen counter is raised to the newest restored block so a
    /// restored block is never ingested twice.
    pub fn restore_blocks(&self, blocks: Vec<Block>) -> Option<BlockNumber> {
        let window = BlockWindow::from_blocks(self.limits.global_cap, blocks);
        let head = window.head_number();

        let mut state = self.lock();
        state.global = window;
        state.last_seen = state.last_seen.max(head);
        state.last_seen
    }

    /// Seeds the named windows from a snapshot
    pub fn restore_pages(&self, pages: PageWindows) {
        let cap = self.limits.page_cap;
        let windows = pages
            .into_iter()
            .map(|(id, blocks)| (id, BlockWindow::from_blocks(cap, blocks)))
            .collect();
        self.lock().pages = windows;
    }

    /// Seeds the peer list from a snapshot
    pub fn restore_peers(&self, peers: Vec<ValidatorPeer>) {
        self.set_validator_peers(peers);
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            global_blocks: state.global.len(),
            page_windows: state.pages.len(),
            page_blocks: state.pages.values().map(BlockWindow::len).sum(),
            tracked_transactions: state.seen_txs.len(),
            validator_peers: state.peers.len(),
            scheduled_transactions: state.scheduled.len(),
            has_mempool_stats: state.mempool.is_some(),
            last_seen_block: state.last_seen,
            rejected_blocks: state.rejected_blocks,
        }
    }
}
