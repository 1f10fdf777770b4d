// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Configuration for the realtime feed
//!
//! This module provides the configuration for node endpoints, cache limits,
//! polling cadence, reconnection backoff and snapshot persistence.
//!
//! # Example: Using defaults
//!
//! ```rust
//! use blockfeed::FeedConfig;
//!
//! // Local node on the standard ports
//! let config = FeedConfig::default();
//! assert_eq!(config.limits.global_cap, 500);
//! ```
//!
//! # Example: Custom configuration
//!
//! ```rust
//! use blockfeed::FeedConfigBuilder;
//! use std::time::Duration;
//!
//! let config = FeedConfigBuilder::new("http://10.0.0.5:8545")
//!     .unwrap()
//!     .ws_url("ws://10.0.0.5:8546")
//!     .unwrap()
//!     .page_window_cap(2000)
//!     .mempool_interval(Duration::from_secs(5))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.peer_list_url.unwrap().as_str(), "http://10.0.0.5:3030/get_peer_list");
//! ```

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use url::Url;

use crate::errors::ConfigError;
use crate::transport::ReconnectPolicy;

pub mod constants;

use constants::{endpoints, persistence, polling};

/// Capacities of the in-memory caches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLimits {
    /// Global rolling window capacity
    /// Default: 500
    pub global_cap: usize,
    /// Capacity of each per-page window
    /// Default: 1000
    pub page_cap: usize,
    /// Recently-seen transaction hash capacity
    /// Default: 1000
    pub tx_dedup_cap: usize,
}

impl Default for WindowLimits {
    fn default() -> Self {
        Self {
            global_cap: constants::GLOBAL_WINDOW_CAP,
            page_cap: constants::PAGE_WINDOW_CAP,
            tx_dedup_cap: constants::TX_DEDUP_CAP,
        }
    }
}

/// Cadence and timeouts of the polling fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingConfig {
    pub mempool_interval: Duration,
    pub block_interval: Duration,
    pub peers_short_interval: Duration,
    pub peers_long_interval: Duration,
    /// Timeout applied to every node RPC call
    pub rpc_timeout: Duration,
    /// Timeout applied to peer-list and geolocation HTTP calls
    pub http_timeout: Duration,
    /// Delay between a WebSocket open and the catch-up refresh
    pub connect_settle_delay: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            mempool_interval: polling::MEMPOOL_INTERVAL,
            block_interval: polling::BLOCK_INTERVAL,
            peers_short_interval: polling::PEERS_SHORT_INTERVAL,
            peers_long_interval: polling::PEERS_LONG_INTERVAL,
            rpc_timeout: polling::RPC_TIMEOUT,
            http_timeout: polling::HTTP_TIMEOUT,
            connect_settle_delay: polling::CONNECT_SETTLE_DELAY,
        }
    }
}

/// Snapshot persistence settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceConfig {
    /// Directory for the file-backed store; `None` keeps snapshots in memory
    pub cache_dir: Option<PathBuf>,
    /// Byte quota for the store, if any
    pub quota_bytes: Option<u64>,
    pub debounce: Duration,
    pub max_wait: Duration,
    pub blocks_freshness: Duration,
    pub pages_freshness: Duration,
    pub peers_freshness: Duration,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            quota_bytes: None,
            debounce: persistence::DEBOUNCE,
            max_wait: persistence::MAX_WAIT,
            blocks_freshness: persistence::BLOCKS_FRESHNESS,
            pages_freshness: persistence::PAGES_FRESHNESS,
            peers_freshness: persistence::PEERS_FRESHNESS,
        }
    }
}

/// Configuration for a [`RealtimeManager`](crate::RealtimeManager)
///
/// Use [`FeedConfigBuilder`] for a fluent API to construct instances.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// HTTP JSON-RPC endpoint of the node
    pub rpc_url: Url,
    /// WebSocket endpoint; `None` runs on polling alone
    pub ws_url: Option<Url>,
    /// Validator peer-list endpoint; `None` disables the peer loop
    pub peer_list_url: Option<Url>,
    /// Geolocation batch endpoint; `None` disables enrichment
    pub geo_url: Option<Url>,
    /// RPC method returning mempool statistics
    pub mempool_stats_method: String,
    /// RPC method returning scheduled transactions
    pub scheduled_txs_method: String,
    pub limits: WindowLimits,
    pub polling: PollingConfig,
    pub reconnect: ReconnectPolicy,
    pub persistence: PersistenceConfig,
}

/// Parsed once; `test_default_endpoints_parse` pins the constant
static DEFAULT_RPC_URL: LazyLock<Url> = LazyLock::new(|| {
    Url::parse(endpoints::RPC_URL).expect("endpoints::RPC_URL is a valid URL")
});

impl Default for FeedConfig {
    fn default() -> Self {
        let rpc_url = DEFAULT_RPC_URL.clone();
        Self {
            peer_list_url: peer_list_url_for(&rpc_url),
            ws_url: Url::parse(endpoints::WS_URL).ok(),
            geo_url: Url::parse(endpoints::GEO_BATCH_URL).ok(),
            rpc_url,
            mempool_stats_method: endpoints::MEMPOOL_STATS_METHOD.to_string(),
            scheduled_txs_method: endpoints::SCHEDULED_TXS_METHOD.to_string(),
            limits: WindowLimits::default(),
            polling: PollingConfig::default(),
            reconnect: ReconnectPolicy::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

impl FeedConfig {
    /// Build a configuration from `BLOCKFEED_*` environment variables
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `BLOCKFEED_RPC_URL` | HTTP JSON-RPC endpoint (default `http://localhost:8545`) |
    /// | `BLOCKFEED_WS_URL` | WebSocket endpoint, empty to disable streaming |
    /// | `BLOCKFEED_PEER_LIST_URL` | Peer-list endpoint (default derived from the RPC host) |
    /// | `BLOCKFEED_GEO_URL` | Geolocation batch endpoint, empty to disable |
    /// | `BLOCKFEED_CACHE_DIR` | Directory for persisted snapshots |
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an unparsable URL or the resulting
    /// configuration fails [`validate`](Self::validate).
    pub fn from_env() -> Result<Self, ConfigError> {
        let var = |name: &str| std::env::var(name).ok();

        let mut builder = match var("BLOCKFEED_RPC_URL") {
            Some(url) => FeedConfigBuilder::new(&url)?,
            None => FeedConfigBuilder::default(),
        };

        if let Some(ws) = var("BLOCKFEED_WS_URL") {
            builder = if ws.trim().is_empty() {
                builder.without_ws()
            } else {
                builder.ws_url(&ws)?
            };
        }
        if let Some(peers) = var("BLOCKFEED_PEER_LIST_URL") {
            builder = if peers.trim().is_empty() {
                builder.without_peer_list()
            } else {
                builder.peer_list_url(&peers)?
            };
        }
        if let Some(geo) = var("BLOCKFEED_GEO_URL") {
            builder = if geo.trim().is_empty() {
                builder.without_geo()
            } else {
                builder.geo_url(&geo)?
            };
        }
        if let Some(dir) = var("BLOCKFEED_CACHE_DIR") {
            builder = builder.cache_dir(dir);
        }

        builder.build()
    }

    /// Checks the configuration for values that would break the cache invariants
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ws) = &self.ws_url {
            if !matches!(ws.scheme(), "ws" | "wss") {
                return Err(ConfigError::invalid(
                    "ws_url",
                    format!("expected ws:// or wss://, got {ws}"),
                ));
            }
        }
        if !matches!(self.rpc_url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                "rpc_url",
                format!("expected http:// or https://, got {}", self.rpc_url),
            ));
        }
        if self.limits.global_cap == 0 || self.limits.page_cap == 0 || self.limits.tx_dedup_cap == 0
        {
            return Err(ConfigError::invalid("limits", "capacities must be non-zero"));
        }
        if self.polling.peers_short_interval > self.polling.peers_long_interval {
            return Err(ConfigError::invalid(
                "polling.peers_short_interval",
                "short peer interval exceeds the long interval",
            ));
        }
        if self.persistence.debounce > self.persistence.max_wait {
            return Err(ConfigError::invalid(
                "persistence.debounce",
                "debounce exceeds max_wait",
            ));
        }
        if self.reconnect.base_delay > self.reconnect.max_delay {
            return Err(ConfigError::invalid(
                "reconnect.base_delay",
                "base delay exceeds max delay",
            ));
        }
        Ok(())
    }
}

/// `http://<rpc-host>:3030/get_peer_list`
fn peer_list_url_for(rpc_url: &Url) -> Option<Url> {
    let host = rpc_url.host_str()?;
    Url::parse(&format!(
        "http://{host}:{}/{}",
        endpoints::PEER_LIST_PORT,
        endpoints::PEER_LIST_PATH
    ))
    .ok()
}

fn parse_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|e| ConfigError::invalid_url(field, raw, e))
}

/// Builder for [`FeedConfig`]
///
/// # Example
///
/// ```rust
/// use blockfeed::FeedConfigBuilder;
/// use std::time::Duration;
///
/// let config = FeedConfigBuilder::default()
///     .without_ws()
///     .block_interval(Duration::from_secs(1))
///     .build()
///     .unwrap();
///
/// assert!(config.ws_url.is_none());
/// ```
#[derive(Debug, Default)]
pub struct FeedConfigBuilder {
    config: FeedConfig,
    peer_list_explicit: bool,
}

impl FeedConfigBuilder {
    /// Start from defaults with the given RPC endpoint
    ///
    /// The peer-list endpoint is derived from the RPC host unless set
    /// explicitly.
    ///
    /// # Errors
    ///
    /// Returns an error if `rpc_url` does not parse.
    pub fn new(rpc_url: &str) -> Result<Self, ConfigError> {
        let rpc_url = parse_url("rpc_url", rpc_url)?;
        let mut config = FeedConfig {
            peer_list_url: peer_list_url_for(&rpc_url),
            ..FeedConfig::default()
        };
        config.rpc_url = rpc_url;
        Ok(Self {
            config,
            peer_list_explicit: false,
        })
    }

    /// Set the WebSocket endpoint
    pub fn ws_url(mut self, url: &str) -> Result<Self, ConfigError> {
        self.config.ws_url = Some(parse_url("ws_url", url)?);
        Ok(self)
    }

    /// Run on polling alone
    pub fn without_ws(mut self) -> Self {
        self.config.ws_url = None;
        self
    }

    /// Set the validator peer-list endpoint
    pub fn peer_list_url(mut self, url: &str) -> Result<Self, ConfigError> {
        self.config.peer_list_url = Some(parse_url("peer_list_url", url)?);
        self.peer_list_explicit = true;
        Ok(self)
    }

    /// Disable the validator peer loop
    pub fn without_peer_list(mut self) -> Self {
        self.config.peer_list_url = None;
        self.peer_list_explicit = true;
        self
    }

    /// Set the geolocation batch endpoint
    pub fn geo_url(mut self, url: &str) -> Result<Self, ConfigError> {
        self.config.geo_url = Some(parse_url("geo_url", url)?);
        Ok(self)
    }

    /// Disable peer geolocation
    pub fn without_geo(mut self) -> Self {
        self.config.geo_url = None;
        self
    }

    /// Override the RPC method names for mempool stats and scheduled transactions
    pub fn rpc_methods(mut self, mempool_stats: &str, scheduled_txs: &str) -> Self {
        self.config.mempool_stats_method = mempool_stats.to_string();
        self.config.scheduled_txs_method = scheduled_txs.to_string();
        self
    }

    pub fn global_window_cap(mut self, cap: usize) -> Self {
        self.config.limits.global_cap = cap;
        self
    }

    pub fn page_window_cap(mut self, cap: usize) -> Self {
        self.config.limits.page_cap = cap;
        self
    }

    pub fn tx_dedup_cap(mut self, cap: usize) -> Self {
        self.config.limits.tx_dedup_cap = cap;
        self
    }

    pub fn mempool_interval(mut self, interval: Duration) -> Self {
        self.config.polling.mempool_interval = interval;
        self
    }

    pub fn block_interval(mut self, interval: Duration) -> Self {
        self.config.polling.block_interval = interval;
        self
    }

    /// Set the short and long peer polling intervals
    pub fn peer_intervals(mut self, short: Duration, long: Duration) -> Self {
        self.config.polling.peers_short_interval = short;
        self.config.polling.peers_long_interval = long;
        self
    }

    pub fn rpc_timeout(mut self, timeout: Duration) -> Self {
        self.config.polling.rpc_timeout = timeout;
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.config.polling.http_timeout = timeout;
        self
    }

    /// Replace the reconnection policy
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.config.reconnect = policy;
        self
    }

    /// Persist snapshots as files under `dir`
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.persistence.cache_dir = Some(dir.into());
        self
    }

    /// Cap the snapshot store at `bytes`
    pub fn storage_quota(mut self, bytes: u64) -> Self {
        self.config.persistence.quota_bytes = Some(bytes);
        self
    }

    /// Set the persistence debounce and its maximum wait
    pub fn persist_debounce(mut self, debounce: Duration, max_wait: Duration) -> Self {
        self.config.persistence.debounce = debounce;
        self.config.persistence.max_wait = max_wait;
        self
    }

    /// Build and validate the final configuration
    pub fn build(mut self) -> Result<FeedConfig, ConfigError> {
        if !self.peer_list_explicit {
            self.config.peer_list_url = peer_list_url_for(&self.config.rpc_url);
        }
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints_parse() {
        for url in [endpoints::RPC_URL, endpoints::WS_URL, endpoints::GEO_BATCH_URL] {
            assert!(Url::parse(url).is_ok(), "{url}");
        }
        assert_eq!(DEFAULT_RPC_URL.as_str(), "http://localhost:8545/");
    }

    #[test]
    fn test_default_config() {
        let config = FeedConfig::default();

        assert_eq!(config.rpc_url.as_str(), "http://localhost:8545/");
        assert_eq!(config.ws_url.as_ref().unwrap().as_str(), "ws://localhost:8546/");
        assert_eq!(
            config.peer_list_url.as_ref().unwrap().as_str(),
            "http://localhost:3030/get_peer_list"
        );
        assert_eq!(config.limits, WindowLimits::default());
        assert_eq!(config.polling.mempool_interval, Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_peer_list_follows_rpc_host() {
        let config = FeedConfigBuilder::new("https://rpc.example.org:8545")
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(
            config.peer_list_url.unwrap().as_str(),
            "http://rpc.example.org:3030/get_peer_list"
        );
    }

    #[test]
    fn test_explicit_peer_list_is_kept() {
        let config = FeedConfigBuilder::new("http://10.0.0.1:8545")
            .unwrap()
            .peer_list_url("http://peers.internal/list")
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.peer_list_url.unwrap().as_str(), "http://peers.internal/list");
    }

    #[test]
    fn test_rejects_http_ws_url() {
        let result = FeedConfigBuilder::default()
            .ws_url("http://localhost:8546")
            .unwrap()
            .build();

        assert!(matches!(result, Err(ConfigError::Invalid { field: "ws_url", .. })));
    }

    #[test]
    fn test_rejects_unparsable_url() {
        assert!(matches!(
            FeedConfigBuilder::new("not a url"),
            Err(ConfigError::InvalidUrl { field: "rpc_url", .. })
        ));
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let result = FeedConfigBuilder::default().page_window_cap(0).build();
        assert!(matches!(result, Err(ConfigError::Invalid { field: "limits", .. })));
    }

    #[test]
    fn test_rejects_inverted_peer_intervals() {
        let result = FeedConfigBuilder::default()
            .peer_intervals(Duration::from_secs(600), Duration::from_secs(60))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_overrides() {
        let config = FeedConfigBuilder::default()
            .without_ws()
            .without_geo()
            .global_window_cap(50)
            .rpc_methods("custom_mempool", "custom_scheduled")
            .persist_debounce(Duration::from_millis(100), Duration::from_secs(1))
            .build()
            .unwrap();

        assert!(config.ws_url.is_none());
        assert!(config.geo_url.is_none());
        assert_eq!(config.limits.global_cap, 50);
        assert_eq!(config.mempool_stats_method, "custom_mempool");
        assert_eq!(config.persistence.debounce, Duration::from_millis(100));
    }
}
