// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Default limits, intervals and storage keys
//!
//! This module centralizes the magic numbers of the cache and its feeds so
//! they can be found in one place and overridden through
//! [`FeedConfigBuilder`](super::FeedConfigBuilder).

use std::time::Duration;

/// Capacity of the global rolling block window
pub const GLOBAL_WINDOW_CAP: usize = 500;

/// Capacity of each named per-page block window
pub const PAGE_WINDOW_CAP: usize = 1000;

/// Capacity of the recently-seen transaction hash set
pub const TX_DEDUP_CAP: usize = 1000;

/// Raw timestamps above this value are read as milliseconds rather than seconds
pub const MILLIS_TIMESTAMP_THRESHOLD: u64 = 10_000_000_000;

/// Polling intervals and timeouts
pub mod polling {
    use super::Duration;

    /// Mempool stats + scheduled transactions loop
    pub const MEMPOOL_INTERVAL: Duration = Duration::from_secs(2);
    /// Latest-block safety-net loop
    pub const BLOCK_INTERVAL: Duration = Duration::from_secs(2);
    /// Peer list interval while the set keeps changing
    pub const PEERS_SHORT_INTERVAL: Duration = Duration::from_secs(60);
    /// Peer list interval once the set is stable
    pub const PEERS_LONG_INTERVAL: Duration = Duration::from_secs(300);
    /// Timeout for node RPC calls
    pub const RPC_TIMEOUT: Duration = Duration::from_secs(8);
    /// Timeout for peer-list and geolocation HTTP calls
    pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
    /// Delay between a successful WebSocket open and the catch-up refresh
    pub const CONNECT_SETTLE_DELAY: Duration = Duration::from_secs(1);
}

/// Reconnection backoff for the WebSocket transport
pub mod reconnect {
    use super::Duration;

    pub const BASE_DELAY: Duration = Duration::from_secs(1);
    pub const MAX_DELAY: Duration = Duration::from_secs(30);
    /// Upper bound of the random jitter added on each doubling
    pub const MAX_JITTER: Duration = Duration::from_secs(1);
    pub const MAX_ATTEMPTS: u32 = 10;
}

/// Snapshot persistence
pub mod persistence {
    use super::Duration;

    /// Quiet period before a requested save is written
    pub const DEBOUNCE: Duration = Duration::from_secs(5);
    /// Longest a requested save may be postponed by further requests
    pub const MAX_WAIT: Duration = Duration::from_secs(30);
    pub const BLOCKS_FRESHNESS: Duration = Duration::from_secs(30);
    pub const PAGES_FRESHNESS: Duration = Duration::from_secs(5 * 60);
    pub const PEERS_FRESHNESS: Duration = Duration::from_secs(10 * 60);

    /// Snapshot envelope format version
    pub const FORMAT_VERSION: u32 = 1;

    pub const BLOCKS_KEY: &str = "blockfeed:blocks";
    pub const PAGES_KEY: &str = "blockfeed:pages";
    pub const PEERS_KEY: &str = "blockfeed:peers";
    pub const SKIP_RESTORE_KEY: &str = "blockfeed:skip_restore";
}

/// Default endpoints
pub mod endpoints {
    pub const RPC_URL: &str = "http://localhost:8545";
    pub const WS_URL: &str = "ws://localhost:8546";
    /// Port of the node's peer-list HTTP service
    pub const PEER_LIST_PORT: u16 = 3030;
    pub const PEER_LIST_PATH: &str = "get_peer_list";
    pub const GEO_BATCH_URL: &str = "http://ip-api.com/batch";
    pub const GEO_FIELDS: &str = "status,country,city,lat,lon";
    pub const MEMPOOL_STATS_METHOD: &str = "txpool_status";
    pub const SCHEDULED_TXS_METHOD: &str = "ritual_getScheduledTransactions";
}
