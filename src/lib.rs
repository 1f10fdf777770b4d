// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Real-time block, mempool and validator-peer cache for EVM explorers.
//!
//! `blockfeed` keeps a live view of a node's chain state for explorer-style
//! consumers. Blocks and pending transactions stream in over a WebSocket
//! subscription; polling loops cover mempool stats, scheduled transactions,
//! the latest block and the validator peer list, and keep the cache current
//! when the subscription is down.
//!
//! # Components
//!
//! - [`RealtimeManager`] - the context object consumers hold
//! - [`cache`] - rolling block windows, transaction de-duplication and
//!   latest-value slots
//! - [`transport`] - WebSocket subscription, frame classification, backoff
//! - [`polling`] - fixed and adaptive polling loops
//! - [`persistence`] - debounced snapshots with per-section freshness
//! - [`enrichment`] - geolocation of validator peers
//! - [`bus`] - update fan-out to subscribers
//! - [`node`] - request/response access to the node
//!
//! # Quick start
//!
//! ```rust,no_run
//! use blockfeed::{FeedConfigBuilder, RealtimeManager, UpdateKind};
//!
//! # async fn example() -> Result<(), blockfeed::BlockfeedError> {
//! let config = FeedConfigBuilder::new("http://localhost:8545")?
//!     .ws_url("ws://localhost:8546")?
//!     .build()?;
//!
//! let manager = RealtimeManager::from_config(config)?;
//! manager.subscribe("logger", |update| {
//!     if update.kind() == UpdateKind::NewBlock {
//!         println!("{}", serde_json::to_string(update).unwrap_or_default());
//!     }
//! });
//! manager.start();
//!
//! let recent = manager.cached_blocks();
//! println!("{} blocks cached", recent.len());
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod bus;
pub mod cache;
pub mod config;
pub mod enrichment;
mod errors;
mod manager;
pub mod node;
pub mod persistence;
pub mod polling;
mod spans;
pub mod transport;
pub mod types;

pub use bus::{Subscription, UpdateHandler};
pub use cache::CacheStats;
pub use config::{FeedConfig, FeedConfigBuilder};
pub use errors::{
    BlockfeedError, ConfigError, EnrichmentError, RpcError, StorageError, TransportError,
};
pub use manager::{ConnectionStatus, RealtimeManager, RealtimeManagerBuilder};
pub use polling::RefreshKind;
pub use transport::ConnectionState;
pub use types::{
    Block, GeoLocation, PendingStatus, RealtimeUpdate, TimestampMillis, UpdateEvent, UpdateKind,
    ValidatorPeer,
};
