// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP JSON-RPC implementation of [`NodeClient`]

use std::time::Duration;

use alloy_primitives::{BlockNumber, U64};
use alloy_rpc_client::{ClientBuilder, RpcClient};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{BlockId, NodeClient};
use crate::config::FeedConfig;
use crate::errors::RpcError;
use crate::transport::LoggingLayer;
use crate::types::{Block, MempoolStats, ScheduledTransaction};

/// [`NodeClient`] over the node's HTTP JSON-RPC endpoint
///
/// Every call goes through [`LoggingLayer`] and is bounded by the configured
/// RPC timeout.
///
/// # Examples
///
/// ```rust,no_run
/// use blockfeed::node::{HttpNodeClient, NodeClient};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), blockfeed::RpcError> {
/// let client = HttpNodeClient::new("http://localhost:8545".parse().unwrap(), Duration::from_secs(8));
/// let head = client.get_latest_block_number().await?;
/// println!("head is {head}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpNodeClient {
    client: RpcClient,
    timeout: Duration,
    mempool_stats_method: String,
    scheduled_txs_method: String,
}

impl HttpNodeClient {
    /// Creates a client with the default mempool and scheduled-transaction methods
    pub fn new(url: Url, timeout: Duration) -> Self {
        let defaults = FeedConfig::default();
        Self::with_methods(
            url,
            timeout,
            defaults.mempool_stats_method,
            defaults.scheduled_txs_method,
        )
    }

    /// Creates a client calling custom methods for mempool stats and scheduled
    /// transactions
    pub fn with_methods(
        url: Url,
        timeout: Duration,
        mempool_stats_method: impl Into<String>,
        scheduled_txs_method: impl Into<String>,
    ) -> Self {
        let client = ClientBuilder::default().layer(LoggingLayer::new()).http(url);
        Self {
            client,
            timeout,
            mempool_stats_method: mempool_stats_method.into(),
            scheduled_txs_method: scheduled_txs_method.into(),
        }
    }

    /// Builds the client described by `config`
    pub fn from_config(config: &FeedConfig) -> Self {
        Self::with_methods(
            config.rpc_url.clone(),
            config.polling.rpc_timeout,
            config.mempool_stats_method.clone(),
            config.scheduled_txs_method.clone(),
        )
    }

    async fn call<P>(&self, method: &str, params: P) -> Result<Value, RpcError>
    where
        P: serde::Serialize + Clone + std::fmt::Debug + Send + Sync + Unpin + 'static,
    {
        let request = self.client.request::<P, Value>(method.to_string(), params);
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(RpcError::call_failed(method, e)),
            Err(_) => Err(RpcError::timeout(method, self.timeout)),
        }
    }
}

/// Interprets a block response, `null` meaning unknown
fn parse_block(method: &str, value: Value) -> Result<Option<Block>, RpcError> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(Block::from(map))),
        other => Err(RpcError::invalid_response(
            method,
            format!("expected block object, got {other}"),
        )),
    }
}

/// Accepts a bare array, `{"transactions": [...]}` or `null`
fn parse_scheduled(method: &str, value: Value) -> Result<Vec<ScheduledTransaction>, RpcError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("transactions") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(RpcError::invalid_response(
                method,
                "object response without a transactions array",
            )),
        },
        other => Err(RpcError::invalid_response(
            method,
            format!("expected array, got {other}"),
        )),
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn get_block(
        &self,
        id: BlockId,
        include_transactions: bool,
    ) -> Result<Option<Block>, RpcError> {
        let value = match id {
            BlockId::Latest => {
                self.call("eth_getBlockByNumber", ("latest", include_transactions))
                    .await?
            }
            BlockId::Number(n) => {
                self.call("eth_getBlockByNumber", (U64::from(n), include_transactions))
                    .await?
            }
            BlockId::Hash(hash) => {
                self.call("eth_getBlockByHash", (hash, include_transactions))
                    .await?
            }
        };
        parse_block("eth_getBlock", value)
    }

    async fn get_latest_block_number(&self) -> Result<BlockNumber, RpcError> {
        let request = self.client.request_noparams::<U64>("eth_blockNumber");
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(number)) => Ok(number.to::<u64>()),
            Ok(Err(e)) => Err(RpcError::call_failed("eth_blockNumber", e)),
            Err(_) => Err(RpcError::timeout("eth_blockNumber", self.timeout)),
        }
    }

    async fn get_mempool_stats(&self) -> Result<MempoolStats, RpcError> {
        let stats = self.call(&self.mempool_stats_method, ()).await?;
        debug!(method = %self.mempool_stats_method, "Fetched mempool stats");
        Ok(stats)
    }

    async fn get_scheduled_transactions(&self) -> Result<Vec<ScheduledTransaction>, RpcError> {
        let value = self.call(&self.scheduled_txs_method, ()).await?;
        parse_scheduled(&self.scheduled_txs_method, value)
    }
}
