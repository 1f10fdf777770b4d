// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Validator peer list source

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::errors::RpcError;
use crate::types::ValidatorPeer;

/// Fetches the current validator peer list
#[async_trait]
pub trait PeerSource: Send + Sync + fmt::Debug {
    /// Returns the peers in the order the source lists them, unenriched
    async fn fetch_peers(&self) -> Result<Vec<ValidatorPeer>, RpcError>;
}

/// [`PeerSource`] over the node's peer-list HTTP endpoint
///
/// The endpoint answers with either `{"peers": [...]}` or
/// `{"validators": [...]}`; a bare array is accepted too.
#[derive(Debug, Clone)]
pub struct HttpPeerSource {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl HttpPeerSource {
    pub fn new(url: Url, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            timeout,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Extracts peer entries from a peer-list response body
pub(crate) fn parse_peer_list(body: &Value) -> Result<Vec<ValidatorPeer>, RpcError> {
    let entries = match body {
        Value::Array(entries) => entries,
        Value::Object(obj) => match obj.get("peers").or_else(|| obj.get("validators")) {
            Some(Value::Array(entries)) => entries,
            Some(Value::Null) | None => return Ok(Vec::new()),
            Some(other) => {
                return Err(RpcError::invalid_response(
                    "get_peer_list",
                    format!("peer list is not an array: {other}"),
                ))
            }
        },
        other => {
            return Err(RpcError::invalid_response(
                "get_peer_list",
                format!("unexpected body: {other}"),
            ))
        }
    };

    let peers: Vec<ValidatorPeer> = entries.iter().filter_map(ValidatorPeer::from_raw).collect();
    if peers.len() < entries.len() {
        warn!(
            skipped = entries.len() - peers.len(),
            "Skipped peer entries without an endpoint"
        );
    }
    Ok(peers)
}

#[async_trait]
impl PeerSource for HttpPeerSource {
    async fn fetch_peers(&self) -> Result<Vec<ValidatorPeer>, RpcError> {
        let response = self
            .client
            .get(self.url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::timeout("get_peer_list", self.timeout)
                } else {
                    RpcError::call_failed("get_peer_list", e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::invalid_response(
                "get_peer_list",
                format!("HTTP {status}"),
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RpcError::call_failed("get_peer_list", e))?;

        let peers = parse_peer_list(&body)?;
        debug!(count = peers.len(), url = %self.url, "Fetched validator peers");
        Ok(peers)
    }
}
