// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Test helpers for blockfeed integration tests
//!
//! Provides mock implementations of the node, peer-list and geolocation
//! seams so the manager can be exercised without a real node.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::{BlockHash, BlockNumber, TxHash};
use async_trait::async_trait;
use blockfeed::enrichment::GeoLocator;
use blockfeed::node::{BlockId, NodeClient, PeerSource};
use blockfeed::persistence::{KeyValueStore, MemoryStore};
use blockfeed::types::{MempoolStats, ScheduledTransaction};
use blockfeed::{
    Block, EnrichmentError, FeedConfig, GeoLocation, RealtimeManager, RealtimeUpdate, RpcError,
    ValidatorPeer,
};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Block with a number, a hash derived from it and a 1 gwei base fee
pub fn block(number: BlockNumber) -> Block {
    Block::from_value(json!({
        "number": format!("{number:#x}"),
        "hash": block_hash(number),
        "timestamp": "0x6553f100",
        "baseFeePerGas": "0x3b9aca00",
    }))
    .unwrap()
}

pub fn block_hash(number: BlockNumber) -> BlockHash {
    BlockHash::left_padding_from(&number.to_be_bytes())
}

pub fn numbers(blocks: &[Block]) -> Vec<BlockNumber> {
    blocks.iter().filter_map(Block::number).collect()
}

pub fn peers(count: usize) -> Vec<ValidatorPeer> {
    (0..count)
        .map(|i| ValidatorPeer::new(format!("validator-{i}"), format!("10.0.0.{}:30303", i + 1)))
        .collect()
}

/// Mock NodeClient serving a scripted chain
///
/// `get_latest_block` pops from a queue of heads and keeps returning the last
/// one once the queue is drained.
///
/// # Example
///
/// ```rust,ignore
/// let node = MockNodeClient::new()
///     .with_heads(vec![block(100), block(101)])
///     .with_mempool_stats(json!({"pending": 4}));
/// ```
#[derive(Debug, Default)]
pub struct MockNodeClient {
    heads: Mutex<VecDeque<Block>>,
    last_head: Mutex<Option<Block>>,
    bodies: Mutex<Vec<Block>>,
    mempool: Mutex<Option<MempoolStats>>,
    scheduled: Mutex<Vec<ScheduledTransaction>>,
    fail_mempool: Mutex<bool>,
    calls: AtomicUsize,
}

impl MockNodeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_heads(self, heads: Vec<Block>) -> Self {
        *self.heads.lock().unwrap() = heads.into();
        self
    }

    /// Full blocks returned by `get_block(Hash(..))`
    pub fn with_bodies(self, bodies: Vec<Block>) -> Self {
        *self.bodies.lock().unwrap() = bodies;
        self
    }

    pub fn with_mempool_stats(self, stats: Value) -> Self {
        *self.mempool.lock().unwrap() = Some(stats);
        self
    }

    pub fn with_scheduled(self, txs: Vec<Value>) -> Self {
        *self.scheduled.lock().unwrap() = txs;
        self
    }

    /// Makes the mempool stats call fail with a connection error
    pub fn failing_mempool(self) -> Self {
        *self.fail_mempool.lock().unwrap() = true;
        self
    }

    pub fn push_head(&self, head: Block) {
        self.heads.lock().unwrap().push_back(head);
    }

    /// Total number of calls served
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeClient for MockNodeClient {
    async fn get_block(
        &self,
        id: BlockId,
        _include_transactions: bool,
    ) -> Result<Option<Block>, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match id {
            BlockId::Latest => {
                let next = self.heads.lock().unwrap().pop_front();
                let mut last = self.last_head.lock().unwrap();
                if next.is_some() {
                    *last = next;
                }
                Ok(last.clone())
            }
            BlockId::Hash(hash) => Ok(self
                .bodies
                .lock()
                .unwrap()
                .iter()
                .find(|b| b.hash() == Some(hash))
                .cloned()),
            BlockId::Number(number) => Ok(self
                .bodies
                .lock()
                .unwrap()
                .iter()
                .find(|b| b.number() == Some(number))
                .cloned()),
        }
    }

    async fn get_latest_block_number(&self) -> Result<BlockNumber, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_head
            .lock()
            .unwrap()
            .as_ref()
            .and_then(Block::number)
            .ok_or_else(|| RpcError::invalid_response("eth_blockNumber", "no head yet"))
    }

    async fn get_mempool_stats(&self) -> Result<MempoolStats, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_mempool.lock().unwrap() {
            return Err(RpcError::call_failed(
                "txpool_status",
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
            ));
        }
        Ok(self.mempool.lock().unwrap().clone().unwrap_or(Value::Null))
    }

    async fn get_scheduled_transactions(&self) -> Result<Vec<ScheduledTransaction>, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.scheduled.lock().unwrap().clone())
    }
}

/// Mock PeerSource replaying scripted responses
///
/// Once the script runs out the last response is repeated.
#[derive(Debug, Default)]
pub struct MockPeerSource {
    responses: Mutex<VecDeque<Result<Vec<ValidatorPeer>, String>>>,
    last: Mutex<Option<Vec<ValidatorPeer>>>,
}

impl MockPeerSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_peers(self, peers: Vec<ValidatorPeer>) -> Self {
        self.responses.lock().unwrap().push_back(Ok(peers));
        self
    }

    pub fn then_fail(self, reason: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(reason.to_string()));
        self
    }
}

#[async_trait]
impl PeerSource for MockPeerSource {
    async fn fetch_peers(&self) -> Result<Vec<ValidatorPeer>, RpcError> {
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(peers)) => {
                *self.last.lock().unwrap() = Some(peers.clone());
                Ok(peers)
            }
            Some(Err(reason)) => Err(RpcError::invalid_response("get_peer_list", reason)),
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| RpcError::invalid_response("get_peer_list", "script exhausted")),
        }
    }
}

/// Mock GeoLocator that either resolves every IP to a fixed city or fails
#[derive(Debug)]
pub struct MockGeoLocator {
    fail: bool,
    delay: Duration,
    lookups: AtomicUsize,
}

impl MockGeoLocator {
    pub fn resolving() -> Self {
        Self {
            fail: false,
            delay: Duration::ZERO,
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::resolving()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeoLocator for MockGeoLocator {
    async fn locate(&self, ips: &[String]) -> Result<Vec<Option<GeoLocation>>, EnrichmentError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(EnrichmentError::Status { status: 503 });
        }
        Ok(ips
            .iter()
            .map(|_| {
                Some(GeoLocation {
                    lat: 52.52,
                    lon: 13.40,
                    city: Some("Berlin".to_string()),
                    country: Some("Germany".to_string()),
                })
            })
            .collect())
    }
}

/// Configuration with no network endpoints at all
pub fn offline_config() -> FeedConfig {
    FeedConfig {
        ws_url: None,
        peer_list_url: None,
        geo_url: None,
        ..FeedConfig::default()
    }
}

/// Manager over mocks and an in-memory store
pub struct Harness {
    pub manager: RealtimeManager,
    pub node: Arc<MockNodeClient>,
    pub store: Arc<MemoryStore>,
}

impl Harness {
    pub fn new(node: MockNodeClient) -> Self {
        Self::with_store(node, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(node: MockNodeClient, store: Arc<MemoryStore>) -> Self {
        Self::with_config(node, store, offline_config())
    }

    pub fn with_config(node: MockNodeClient, store: Arc<MemoryStore>, config: FeedConfig) -> Self {
        let node = Arc::new(node);
        let manager = RealtimeManager::builder(config)
            .node_client(Arc::clone(&node) as Arc<dyn NodeClient>)
            .key_value_store(Arc::clone(&store) as Arc<dyn KeyValueStore>)
            .build()
            .unwrap();
        Self {
            manager,
            node,
            store,
        }
    }

    pub fn with_peers(
        node: MockNodeClient,
        peers: MockPeerSource,
        geo: Arc<MockGeoLocator>,
    ) -> Self {
        let node = Arc::new(node);
        let store = Arc::new(MemoryStore::new());
        let manager = RealtimeManager::builder(offline_config())
            .node_client(Arc::clone(&node) as Arc<dyn NodeClient>)
            .peer_source(Arc::new(peers))
            .geo_locator(geo)
            .key_value_store(Arc::clone(&store) as Arc<dyn KeyValueStore>)
            .build()
            .unwrap();
        Self {
            manager,
            node,
            store,
        }
    }
}

/// `eth_subscription` notification carrying a new head
pub fn head_frame(block: &Block) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "eth_subscription",
        "params": {"subscription": "0xheads", "result": block},
    })
}

/// `eth_subscription` notification carrying a pending transaction hash
pub fn pending_frame(hash: TxHash) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "eth_subscription",
        "params": {"subscription": "0xpending", "result": hash},
    })
}

/// WebSocket node serving a single session
///
/// The session reads the two subscribe requests, confirms them, pushes
/// `frames` and then stays open until the client closes. Returns the
/// `ws://` URL and a channel yielding the subscribe requests.
pub async fn spawn_ws_node(frames: Vec<Value>) -> (String, mpsc::UnboundedReceiver<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (requests_tx, requests_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let socket = tokio_tungstenite::accept_async(stream).await.unwrap();
        let (mut write, mut read) = socket.split();

        for _ in 0..2 {
            let Some(Ok(Message::Text(text))) = read.next().await else {
                return;
            };
            let request: Value = serde_json::from_str(text.as_str()).unwrap();
            let confirmation = json!({"jsonrpc": "2.0", "id": request["id"], "result": "0x1"});
            write
                .send(Message::Text(confirmation.to_string().into()))
                .await
                .unwrap();
            let _ = requests_tx.send(request);
        }
        for frame in frames {
            write.send(Message::Text(frame.to_string().into())).await.unwrap();
        }
        while let Some(Ok(_)) = read.next().await {}
    });

    (url, requests_rx)
}

/// Channel receiving a copy of every update published to `manager`
pub fn record_updates(manager: &RealtimeManager, id: &str) -> mpsc::UnboundedReceiver<RealtimeUpdate> {
    let (tx, rx) = mpsc::unbounded_channel();
    manager.subscribe(id, move |update| {
        let _ = tx.send(update.clone());
    });
    rx
}

/// Waits up to five seconds for the next update
pub async fn next_update(rx: &mut mpsc::UnboundedReceiver<RealtimeUpdate>) -> RealtimeUpdate {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for an update")
        .expect("update channel closed")
}
