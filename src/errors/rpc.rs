//! Node RPC error types.
//!
//! Errors raised while talking to the node's HTTP JSON-RPC endpoint or its
//! peer-list service.

use std::time::Duration;

/// Errors that can occur during node RPC operations.
///
/// Each variant carries the method or operation that failed so a single log
/// line is enough to tell which poll went wrong.
///
/// # Examples
///
/// ```rust
/// use blockfeed::RpcError;
/// use std::time::Duration;
///
/// let error = RpcError::Timeout {
///     method: "eth_blockNumber".to_string(),
///     after: Duration::from_secs(8),
/// };
/// assert!(error.to_string().contains("eth_blockNumber"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// The call did not complete within the configured timeout.
    #[error("{method} timed out after {after:?}")]
    Timeout {
        /// JSON-RPC method or HTTP operation
        method: String,
        /// Timeout that elapsed
        after: Duration,
    },

    /// The transport failed or the node answered with an error object.
    #[error("{method} failed")]
    CallFailed {
        /// JSON-RPC method or HTTP operation
        method: String,
        /// The underlying transport error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The node answered but the result had an unexpected shape.
    #[error("{method} returned an unexpected response: {details}")]
    InvalidResponse {
        /// JSON-RPC method or HTTP operation
        method: String,
        /// What was wrong with the response
        details: String,
    },

    /// The requested block is not known to the node.
    #[error("Block not found: {block}")]
    BlockNotFound {
        /// Block number or hash that was requested
        block: String,
    },
}

impl RpcError {
    /// Helper to create a `Timeout` error.
    pub fn timeout(method: impl Into<String>, after: Duration) -> Self {
        RpcError::Timeout {
            method: method.into(),
            after,
        }
    }

    /// Helper to create a `CallFailed` error from any error type.
    pub fn call_failed(
        method: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        RpcError::CallFailed {
            method: method.into(),
            source: Box::new(source),
        }
    }

    /// Helper to create an `InvalidResponse` error.
    pub fn invalid_response(method: impl Into<String>, details: impl Into<String>) -> Self {
        RpcError::InvalidResponse {
            method: method.into(),
            details: details.into(),
        }
    }

    /// Helper to create a `BlockNotFound` error.
    pub fn block_not_found(block: impl ToString) -> Self {
        RpcError::BlockNotFound {
            block: block.to_string(),
        }
    }

    /// Whether the error was a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RpcError::Timeout { .. })
    }

    /// Whether the node rejected the method as unsupported.
    ///
    /// Restricted node modes answer "not supported" for methods they do not
    /// serve; callers treat that as an expected capability gap.
    pub fn is_unsupported(&self) -> bool {
        let RpcError::CallFailed { source, .. } = self else {
            return false;
        };
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(source.as_ref());
        while let Some(error) = current {
            let message = error.to_string().to_lowercase();
            if message.contains("not supported") || message.contains("method not found") {
                return true;
            }
            current = error.source();
        }
        false
    }
}
