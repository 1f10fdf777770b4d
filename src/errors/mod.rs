//! Error types for the blockfeed library.
//!
//! Like the rest of the crate, errors are split by concern:
//!
//! - [`RpcError`] - node HTTP JSON-RPC and peer-list failures
//! - [`TransportError`] - WebSocket subscription failures
//! - [`StorageError`] - snapshot store failures
//! - [`EnrichmentError`] - geolocation lookup failures
//! - [`ConfigError`] - invalid configuration
//!
//! [`BlockfeedError`] unifies them for callers that don't need to tell the
//! sources apart. None of these reach subscribers: the feed logs failures and
//! keeps serving the last good state.
//!
//! # Examples
//!
//! ```rust,no_run
//! use blockfeed::{BlockfeedError, FeedConfig, RealtimeManager};
//!
//! async fn run() -> Result<(), BlockfeedError> {
//!     let config = FeedConfig::from_env()?;
//!     let manager = RealtimeManager::from_config(config)?;
//!     manager.start();
//!     Ok(())
//! }
//! ```

mod config;
mod enrichment;
mod rpc;
mod storage;
mod transport;

pub use config::ConfigError;
pub use enrichment::EnrichmentError;
pub use rpc::RpcError;
pub use storage::StorageError;
pub use transport::TransportError;

/// Unified error type for all blockfeed operations.
///
/// All module-specific error types convert to `BlockfeedError` via `From`, so
/// `?` works across them.
#[derive(Debug, thiserror::Error)]
pub enum BlockfeedError {
    /// Error from a node RPC call.
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// Error from the WebSocket transport.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Error from the snapshot store.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Error from peer geolocation.
    #[error("Enrichment error: {0}")]
    Enrichment(#[from] EnrichmentError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
