// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Request/response access to the node
//!
//! [`NodeClient`] is the seam between the feed and the node's HTTP JSON-RPC
//! endpoint; [`PeerSource`] does the same for the validator peer list. The
//! concrete [`HttpNodeClient`] and [`HttpPeerSource`] are used in production
//! and tests substitute mocks.

use std::fmt;

use alloy_primitives::{BlockHash, BlockNumber};
use async_trait::async_trait;

use crate::errors::RpcError;
use crate::types::{Block, MempoolStats, ScheduledTransaction};

mod http;
mod peers;

pub use http::HttpNodeClient;
pub use peers::{HttpPeerSource, PeerSource};

/// Block selector for [`NodeClient::get_block`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockId {
    /// The node's current head
    Latest,
    Number(BlockNumber),
    Hash(BlockHash),
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockId::Latest => f.write_str("latest"),
            BlockId::Number(n) => write!(f, "{n}"),
            BlockId::Hash(h) => write!(f, "{h}"),
        }
    }
}

impl From<BlockNumber> for BlockId {
    fn from(number: BlockNumber) -> Self {
        BlockId::Number(number)
    }
}

impl From<BlockHash> for BlockId {
    fn from(hash: BlockHash) -> Self {
        BlockId::Hash(hash)
    }
}

/// Request/response calls the feed makes against the node
///
/// Implementations apply their own timeouts; a call that times out returns
/// [`RpcError::Timeout`].
#[async_trait]
pub trait NodeClient: Send + Sync + fmt::Debug {
    /// Fetches a block, `Ok(None)` if the node does not know it
    ///
    /// With `include_transactions == false` the `transactions` field holds
    /// hashes only.
    async fn get_block(
        &self,
        id: BlockId,
        include_transactions: bool,
    ) -> Result<Option<Block>, RpcError>;

    /// Fetches the node's current head block
    async fn get_latest_block(&self) -> Result<Option<Block>, RpcError> {
        self.get_block(BlockId::Latest, false).await
    }

    /// Fetches the node's current head number
    async fn get_latest_block_number(&self) -> Result<BlockNumber, RpcError>;

    /// Fetches mempool statistics
    async fn get_mempool_stats(&self) -> Result<MempoolStats, RpcError>;

    /// Fetches the list of scheduled transactions
    async fn get_scheduled_transactions(&self) -> Result<Vec<ScheduledTransaction>, RpcError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_id_display() {
        assert_eq!(BlockId::Latest.to_string(), "latest");
        assert_eq!(BlockId::from(42u64).to_string(), "42");
        assert!(BlockId::from(BlockHash::ZERO).to_string().starts_with("0x000"));
    }
}
