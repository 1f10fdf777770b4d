// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! The realtime manager: one context object owning the whole feed
//!
//! [`RealtimeManager`] wires the subscription transport, the polling loops,
//! the cache, the event bus, snapshot persistence and peer enrichment
//! together. It is cheap to clone; construct it once at startup, hand clones
//! to consumers and call [`disconnect`](RealtimeManager::disconnect) at
//! shutdown.
//!
//! Every block, streamed or polled, goes through one ingestion path. The
//! cache decides acceptance under its lock, and only then are updates
//! published, so subscribers may call back into the manager.
//!
//! # Examples
//!
//! ```rust,no_run
//! use blockfeed::{FeedConfig, RealtimeManager, UpdateEvent};
//!
//! # async fn example() -> Result<(), blockfeed::BlockfeedError> {
//! let manager = RealtimeManager::from_config(FeedConfig::default())?;
//! let subscription = manager.subscribe("explorer", |update| {
//!     if let UpdateEvent::NewBlock(block) = &update.event {
//!         println!("block {:?}", block.number());
//!     }
//! });
//! manager.start();
//!
//! // ... later
//! subscription.unsubscribe();
//! manager.disconnect().await;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use alloy_primitives::{BlockNumber, TxHash};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn, Instrument};

use crate::bus::{EventBus, Subscription};
use crate::cache::{CacheStats, CacheStore, IngestOutcome, PeerGeneration, WindowPush};
use crate::config::FeedConfig;
use crate::enrichment::{merge_locations, peer_ips, GeoLocator, IpApiLocator};
use crate::errors::{BlockfeedError, RpcError, StorageError};
use crate::node::{BlockId, HttpNodeClient, HttpPeerSource, NodeClient, PeerSource};
use crate::persistence::{Debouncer, KeyValueStore, PersistenceBridge};
use crate::polling::{spawn_adaptive_loop, spawn_fixed_loop, AdaptiveInterval, PeerPoll, RefreshKind};
use crate::spans;
use crate::transport::{ConnectionState, FeedHandler, SubscriptionTransport};
use crate::types::{
    Block, MempoolStats, PendingStatus, RealtimeUpdate, ScheduledTransaction, UpdateEvent,
    ValidatorPeer,
};

/// Snapshot of the feed's health, for diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStatus {
    /// WebSocket lifecycle state
    pub state: ConnectionState,
    /// Id of the current (or last) WebSocket connection
    pub connection_id: Option<String>,
    /// Registered update handlers
    pub subscribers: usize,
    /// Highest accepted block number
    pub last_block: Option<BlockNumber>,
    /// Reconnection attempts since the last successful open
    pub reconnect_attempts: u32,
    /// Whether a WebSocket endpoint is configured at all
    pub streaming_enabled: bool,
    pub cache: CacheStats,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (id={}, attempts={}, subscribers={}) {}",
            self.state,
            self.connection_id.as_deref().unwrap_or("-"),
            self.reconnect_attempts,
            self.subscribers,
            self.cache,
        )
    }
}

#[derive(Debug, Default)]
struct LinkState {
    state: ConnectionState,
    connection_id: Option<String>,
    reconnect_attempts: u32,
}

struct Inner {
    config: FeedConfig,
    cache: Arc<CacheStore>,
    bus: Arc<EventBus>,
    node: Arc<dyn NodeClient>,
    peer_source: Option<Arc<dyn PeerSource>>,
    geo_locator: Option<Arc<dyn GeoLocator>>,
    persistence: PersistenceBridge,
    debouncer: OnceLock<Debouncer>,
    save_pending: AtomicBool,
    link: Mutex<LinkState>,
    started: AtomicBool,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Owner of the realtime block feed and its cache
///
/// See the [module documentation](self) for an overview.
#[derive(Clone)]
pub struct RealtimeManager {
    inner: Arc<Inner>,
}

impl fmt::Debug for RealtimeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeManager")
            .field("rpc_url", &self.inner.config.rpc_url.as_str())
            .field("ws_url", &self.inner.config.ws_url.as_ref().map(|u| u.as_str()))
            .field("started", &self.inner.started.load(Ordering::Relaxed))
            .field("bus", &self.inner.bus)
            .finish()
    }
}

/// Builder for [`RealtimeManager`]
///
/// Collaborators not set explicitly are created from the configuration:
/// [`HttpNodeClient`], [`HttpPeerSource`] when a peer-list URL is configured,
/// [`IpApiLocator`] when a geolocation URL is configured, and a
/// [`FileStore`](crate::persistence::FileStore) or
/// [`MemoryStore`](crate::persistence::MemoryStore) depending on `cache_dir`.
///
/// # Examples
///
/// ```rust,no_run
/// use blockfeed::persistence::FileStore;
/// use blockfeed::{FeedConfig, RealtimeManager};
/// use std::sync::Arc;
///
/// # fn example() -> Result<(), blockfeed::BlockfeedError> {
/// let manager = RealtimeManager::builder(FeedConfig::default())
///     .key_value_store(Arc::new(FileStore::new("/var/cache/blockfeed")))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RealtimeManagerBuilder {
    config: FeedConfig,
    node: Option<Arc<dyn NodeClient>>,
    peer_source: Option<Arc<dyn PeerSource>>,
    geo_locator: Option<Arc<dyn GeoLocator>>,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl RealtimeManagerBuilder {
    pub fn new(config: FeedConfig) -> Self {
        Self {
            config,
            node: None,
            peer_source: None,
            geo_locator: None,
            store: None,
        }
    }

    pub fn node_client(mut self, node: Arc<dyn NodeClient>) -> Self {
        self.node = Some(node);
        self
    }

    pub fn peer_source(mut self, source: Arc<dyn PeerSource>) -> Self {
        self.peer_source = Some(source);
        self
    }

    pub fn geo_locator(mut self, locator: Arc<dyn GeoLocator>) -> Self {
        self.geo_locator = Some(locator);
        self
    }

    pub fn key_value_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Validates the configuration, creates missing collaborators and
    /// restores the last snapshot into the cache
    pub fn build(self) -> Result<RealtimeManager, BlockfeedError> {
        let config = self.config;
        config.validate()?;

        let http_timeout = config.polling.http_timeout;
        let node = self
            .node
            .unwrap_or_else(|| Arc::new(HttpNodeClient::from_config(&config)));
        let peer_source = self.peer_source.or_else(|| {
            config
                .peer_list_url
                .clone()
                .map(|url| Arc::new(HttpPeerSource::new(url, http_timeout)) as Arc<dyn PeerSource>)
        });
        let geo_locator = self.geo_locator.or_else(|| {
            config
                .geo_url
                .clone()
                .map(|url| Arc::new(IpApiLocator::new(url, http_timeout)) as Arc<dyn GeoLocator>)
        });
        let persistence = match self.store {
            Some(store) => PersistenceBridge::new(store, config.persistence.clone()),
            None => PersistenceBridge::from_config(config.persistence.clone()),
        };

        let cache = Arc::new(CacheStore::new(config.limits));
        let snapshot = persistence.restore();
        if !snapshot.is_empty() {
            snapshot.apply(&cache);
            info!(cache = %cache.stats(), "Cache seeded from snapshot");
        }

        Ok(RealtimeManager {
            inner: Arc::new(Inner {
                config,
                cache,
                bus: EventBus::new(),
                node,
                peer_source,
                geo_locator,
                persistence,
                debouncer: OnceLock::new(),
                save_pending: AtomicBool::new(false),
                link: Mutex::new(LinkState::default()),
                started: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                tasks: Mutex::new(Vec::new()),
            }),
        })
    }
}

/// Receives the subscription transport's output on behalf of the manager
struct StreamSink {
    manager: RealtimeManager,
}

impl FeedHandler for StreamSink {
    fn on_connected(&self, connection_id: &str) {
        self.manager.link().connection_id = Some(connection_id.to_string());
        self.manager.schedule_catch_up(connection_id.to_string());
    }

    fn on_head(&self, block: Block) {
        self.manager.ingest(block, "websocket");
    }

    fn on_pending_transaction(&self, hash: TxHash) {
        self.manager.record_pending_transaction(hash);
    }

    fn on_state_change(&self, state: ConnectionState, attempts: u32) {
        let mut link = self.manager.link();
        if link.state != state {
            debug!(from = %link.state, to = %state, attempts, "Connection state changed");
        }
        link.state = state;
        link.reconnect_attempts = attempts;
    }
}

impl RealtimeManager {
    pub fn builder(config: FeedConfig) -> RealtimeManagerBuilder {
        RealtimeManagerBuilder::new(config)
    }

    /// Builds a manager with every collaborator derived from `config`
    pub fn from_config(config: FeedConfig) -> Result<Self, BlockfeedError> {
        RealtimeManagerBuilder::new(config).build()
    }

    pub fn config(&self) -> &FeedConfig {
        &self.inner.config
    }

    fn link(&self) -> MutexGuard<'_, LinkState> {
        self.inner.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns the transport, the polling loops and the persistence debouncer
    ///
    /// Must be called from within a tokio runtime. Calling it again, or after
    /// [`disconnect`](Self::disconnect), does nothing.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::AcqRel) {
            debug!("Realtime manager already started");
            return;
        }

        let config = &self.inner.config;
        let cancel = &self.inner.cancel;
        let mut tasks = Vec::new();

        let persistence = self.inner.persistence.clone();
        let cache = Arc::clone(&self.inner.cache);
        let (debouncer, debounce_task) = Debouncer::spawn(
            config.persistence.debounce,
            config.persistence.max_wait,
            cancel.clone(),
            move || {
                let persistence = persistence.clone();
                let cache = Arc::clone(&cache);
                async move { persistence.flush(cache).await }
            },
        );
        tasks.push(debounce_task);
        if self.inner.debouncer.set(debouncer).is_ok() && self.inner.save_pending.swap(false, Ordering::AcqRel) {
            self.request_save();
        }

        match &config.ws_url {
            Some(url) => {
                let transport =
                    SubscriptionTransport::new(url.clone(), config.reconnect, config.polling.rpc_timeout);
                let sink = Arc::new(StreamSink {
                    manager: self.clone(),
                });
                tasks.push(transport.spawn(sink, cancel.clone()));
            }
            None => info!("No WebSocket endpoint configured, running on polling only"),
        }

        let manager = self.clone();
        tasks.push(spawn_fixed_loop(
            "mempool",
            config.polling.mempool_interval,
            cancel.clone(),
            move || {
                let manager = manager.clone();
                async move { manager.poll_mempool().await }
            },
        ));

        let manager = self.clone();
        tasks.push(spawn_fixed_loop(
            "latest_block",
            config.polling.block_interval,
            cancel.clone(),
            move || {
                let manager = manager.clone();
                async move { manager.poll_latest_block().await }
            },
        ));

        if self.inner.peer_source.is_some() {
            let manager = self.clone();
            tasks.push(spawn_adaptive_loop(
                "validator_peers",
                AdaptiveInterval::new(
                    config.polling.peers_short_interval,
                    config.polling.peers_long_interval,
                ),
                cancel.clone(),
                move || {
                    let manager = manager.clone();
                    async move { manager.refresh_validator_peers().await }
                },
            ));
        }

        info!(
            rpc_url = %config.rpc_url,
            streaming = config.ws_url.is_some(),
            peers = self.inner.peer_source.is_some(),
            enrichment = self.inner.geo_locator.is_some(),
            "Realtime manager started"
        );
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(tasks);
    }

    /// Stops every background task, writes a final snapshot and drops all
    /// subscribers
    ///
    /// The manager cannot be restarted afterwards.
    pub async fn disconnect(&self) {
        let connection_id = self.link().connection_id.clone();
        info!(connection_id = connection_id.as_deref().unwrap_or("-"), "Disconnecting");

        self.inner.cancel.cancel();
        self.inner.started.store(true, Ordering::Release);

        let tasks: Vec<_> = std::mem::take(
            &mut *self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }

        self.inner
            .persistence
            .flush(Arc::clone(&self.inner.cache))
            .await;
        self.inner.bus.clear();

        let mut link = self.link();
        link.state = ConnectionState::Disconnected;
        link.connection_id = None;
    }

    /// Registers `handler` for every future update under `id`
    ///
    /// Reusing an id replaces the earlier handler.
    pub fn subscribe<F>(&self, id: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&RealtimeUpdate) + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(id, handler)
    }

    /// Newest-first copy of the global block window
    pub fn cached_blocks(&self) -> Vec<Block> {
        self.inner.cache.global_blocks()
    }

    pub fn cached_scheduled_txs(&self) -> Vec<ScheduledTransaction> {
        self.inner.cache.scheduled_transactions()
    }

    pub fn cached_mempool_stats(&self) -> Option<MempoolStats> {
        self.inner.cache.mempool_stats()
    }

    pub fn cached_validator_peers(&self) -> Vec<ValidatorPeer> {
        self.inner.cache.validator_peers()
    }

    /// Newest-first copy of a page's window, empty if the page has none
    pub fn page_block_window(&self, page_id: &str) -> Vec<Block> {
        self.inner.cache.page_window(page_id)
    }

    /// Replaces a page's window, returning how many blocks were kept
    pub fn set_page_block_window(&self, page_id: &str, blocks: Vec<Block>) -> usize {
        let kept = self.inner.cache.replace_named_window(page_id, blocks);
        debug!(page_id, kept, "Page window replaced");
        self.request_save();
        kept
    }

    /// Prepends `block` to a page's window if it is newer than the window head
    ///
    /// Returns whether the block was inserted; re-adding a block is a no-op.
    pub fn add_block_to_page_window(&self, page_id: &str, block: Block) -> bool {
        match self.inner.cache.append_block_to_named_window(page_id, block) {
            Some(WindowPush::Inserted { evicted }) => {
                trace!(page_id, ?evicted, "Block added to page window");
                self.request_save();
                true
            }
            Some(push) => {
                trace!(page_id, ?push, "Block not added to page window");
                false
            }
            None => {
                debug!(page_id, "Ignoring page block without a number");
                false
            }
        }
    }

    pub fn clear_page_block_window(&self, page_id: &str) {
        if self.inner.cache.clear_named_window(page_id) {
            debug!(page_id, "Page window cleared");
            self.request_save();
        }
    }

    /// Runs one fetch of `kind` right away through the regular update paths
    pub async fn force_refresh(&self, kind: RefreshKind) {
        let node = Arc::clone(&self.inner.node);
        async move {
            debug!("Forcing refresh");
            match kind {
                RefreshKind::Mempool => match node.get_mempool_stats().await {
                    Ok(stats) => self.apply_mempool_stats(stats),
                    Err(e) => log_fetch_error("mempool stats", &e),
                },
                RefreshKind::Scheduled => match node.get_scheduled_transactions().await {
                    Ok(txs) => self.apply_scheduled_transactions(txs),
                    Err(e) => log_fetch_error("scheduled transactions", &e),
                },
                RefreshKind::Blocks => match node.get_latest_block().await {
                    Ok(Some(block)) => {
                        self.ingest(block, "refresh");
                    }
                    Ok(None) => debug!("Node returned no latest block"),
                    Err(e) => log_fetch_error("latest block", &e),
                },
            }
        }
        .instrument(spans::force_refresh(kind))
        .await
    }

    /// Fetches the validator peer list once, publishing and enriching it if
    /// it changed
    ///
    /// The peer loop calls this on its adaptive schedule; the outcome drives
    /// that schedule.
    pub async fn refresh_validator_peers(&self) -> PeerPoll {
        let Some(source) = self.inner.peer_source.clone() else {
            return PeerPoll::Failed;
        };

        async move {
            let peers = match source.fetch_peers().await {
                Ok(peers) => peers,
                Err(e) => {
                    log_fetch_error("validator peers", &e);
                    return PeerPoll::Failed;
                }
            };

            let count = peers.len();
            let Some(generation) = self.inner.cache.replace_peers_if_changed(peers.clone()) else {
                debug!(peers = count, "Validator peer set unchanged");
                return PeerPoll::Unchanged;
            };

            info!(peers = count, generation, "Validator peer set changed");
            self.record(UpdateEvent::ValidatorPeersUpdate(peers.clone()));
            self.spawn_enrichment(peers, generation);
            PeerPoll::Changed
        }
        .instrument(spans::poll_peers())
        .await
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        let cache = self.inner.cache.stats();
        let link = self.link();
        ConnectionStatus {
            state: link.state,
            connection_id: link.connection_id.clone(),
            subscribers: self.inner.bus.subscriber_count(),
            last_block: cache.last_seen_block,
            reconnect_attempts: link.reconnect_attempts,
            streaming_enabled: self.inner.config.ws_url.is_some(),
            cache,
        }
    }

    /// Makes the next manager built on the same store start with an empty cache
    ///
    /// Use this when the node endpoint changes and cached data would mislead.
    pub fn skip_next_restore(&self) -> Result<(), StorageError> {
        self.inner.persistence.skip_next_restore()
    }

    fn publish(&self, event: UpdateEvent) {
        let update = RealtimeUpdate::now(event);
        let delivered = self.inner.bus.publish(&update);
        trace!(kind = %update.kind(), delivered, "Update published");
    }

    /// Publishes `event` and schedules a snapshot
    fn record(&self, event: UpdateEvent) {
        self.publish(event);
        self.request_save();
    }

    fn request_save(&self) {
        match self.inner.debouncer.get() {
            Some(debouncer) => debouncer.request(),
            None => self.inner.save_pending.store(true, Ordering::Release),
        }
    }

    /// The single ingestion path for blocks into the global window
    ///
    /// Returns whether the block was accepted.
    fn ingest(&self, block: Block, source: &'static str) -> bool {
        let span = spans::ingest_block(block.number(), source);
        let _guard = span.enter();

        let block = match self.inner.cache.ingest_block(block) {
            IngestOutcome::Accepted(block) => block,
            IngestOutcome::MissingNumber => {
                warn!("Dropping block without a number");
                return false;
            }
            IngestOutcome::Stale { number, last_seen } => {
                debug!(number, last_seen, "Ignoring block not newer than last seen");
                return false;
            }
        };

        let number = block.number().unwrap_or_default();
        debug!(block_number = number, "Block accepted");

        if let Some(gas_price) = block.gas_price_gwei() {
            self.publish(UpdateEvent::GasPriceUpdate {
                gas_price,
                block_number: number,
            });
        }
        self.record(UpdateEvent::NewBlock(block.clone()));
        self.collect_transactions(&block);
        true
    }

    /// Emits `newTransaction` for every unseen hash in `block`
    ///
    /// Uses the block's own transaction list when present and otherwise
    /// fetches the body by hash in the background.
    fn collect_transactions(&self, block: &Block) {
        if block.get("transactions").is_some() {
            self.record_transactions(block.transaction_hashes());
            return;
        }

        let Some(hash) = block.hash() else {
            debug!("Block has no hash, skipping transaction lookup");
            return;
        };

        let manager = self.clone();
        let node = Arc::clone(&self.inner.node);
        let cancel = self.inner.cancel.clone();
        tokio::spawn(
            async move {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    result = node.get_block(BlockId::Hash(hash), false) => result,
                };
                match result {
                    Ok(Some(body)) => manager.record_transactions(body.transaction_hashes()),
                    Ok(None) => debug!("Block body not found"),
                    Err(e) => log_fetch_error("block body", &e),
                }
            }
            .instrument(spans::fetch_block_body(hash)),
        );
    }

    fn record_transactions(&self, hashes: Vec<TxHash>) {
        let total = hashes.len();
        let fresh = self.inner.cache.remember_transactions(hashes);
        trace!(total, fresh = fresh.len(), "Block transactions collected");
        for hash in fresh {
            self.publish(UpdateEvent::NewTransaction { hash });
        }
    }

    fn record_pending_transaction(&self, hash: TxHash) {
        if self.inner.cache.remember_transaction(hash) {
            self.publish(UpdateEvent::NewPendingTransaction {
                hash,
                status: PendingStatus::Pending,
            });
        } else {
            trace!(%hash, "Pending transaction already seen");
        }
    }

    fn apply_mempool_stats(&self, stats: MempoolStats) {
        self.inner.cache.set_mempool_stats(stats.clone());
        self.record(UpdateEvent::MempoolUpdate(stats));
    }

    fn apply_scheduled_transactions(&self, txs: Vec<ScheduledTransaction>) {
        trace!(count = txs.len(), "Scheduled transactions refreshed");
        self.inner.cache.set_scheduled_transactions(txs.clone());
        self.record(UpdateEvent::ScheduledUpdate(txs));
    }

    async fn poll_mempool(&self) {
        let node = Arc::clone(&self.inner.node);
        async move {
            let (stats, scheduled) =
                tokio::join!(node.get_mempool_stats(), node.get_scheduled_transactions());
            match stats {
                Ok(stats) => self.apply_mempool_stats(stats),
                Err(e) => log_fetch_error("mempool stats", &e),
            }
            match scheduled {
                Ok(txs) => self.apply_scheduled_transactions(txs),
                Err(e) => log_fetch_error("scheduled transactions", &e),
            }
        }
        .instrument(spans::poll_mempool())
        .await
    }

    async fn poll_latest_block(&self) {
        let last_seen = self.inner.cache.last_seen_block();
        let node = Arc::clone(&self.inner.node);
        async move {
            match node.get_latest_block().await {
                Ok(Some(block)) => match (block.number(), last_seen) {
                    (Some(number), Some(last_seen)) if number <= last_seen => {
                        trace!(number, "No new block");
                    }
                    _ => {
                        self.ingest(block, "poll");
                    }
                },
                Ok(None) => debug!("Node returned no latest block"),
                Err(e) => log_fetch_error("latest block", &e),
            }
        }
        .instrument(spans::poll_latest_block(last_seen))
        .await
    }

    /// Refreshes blocks, mempool and scheduled transactions shortly after a
    /// connection opens
    fn schedule_catch_up(&self, connection_id: String) {
        let manager = self.clone();
        let cancel = self.inner.cancel.clone();
        let delay = self.inner.config.polling.connect_settle_delay;
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            debug!(connection_id = %connection_id, "Catching up after connect");
            for kind in RefreshKind::ALL {
                manager.force_refresh(kind).await;
            }
        });
    }

    fn spawn_enrichment(&self, peers: Vec<ValidatorPeer>, generation: PeerGeneration) {
        let Some(locator) = self.inner.geo_locator.clone() else {
            return;
        };
        if peers.is_empty() {
            return;
        }

        let manager = self.clone();
        let cancel = self.inner.cancel.clone();
        let span = spans::enrich_peers(peers.len(), generation);
        tokio::spawn(
            async move {
                let ips = peer_ips(&peers);
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    result = locator.locate(&ips) => result,
                };

                let locations = match result {
                    Ok(locations) => locations,
                    Err(e) => {
                        warn!(error = %e, "Peer geolocation failed, keeping unenriched peers");
                        return;
                    }
                };

                let enriched = merge_locations(&peers, locations);
                let resolved = enriched.iter().filter(|p| p.is_real).count();
                if manager
                    .inner
                    .cache
                    .apply_enriched_peers(generation, enriched.clone())
                {
                    info!(resolved, total = enriched.len(), "Validator peers enriched");
                    manager.record(UpdateEvent::ValidatorPeersUpdate(enriched));
                } else {
                    debug!("Peer list changed during lookup, discarding enrichment");
                }
            }
            .instrument(span),
        );
    }
}

fn log_fetch_error(what: &'static str, error: &RpcError) {
    if error.is_unsupported() {
        debug!(what, error = %error, "Node does not support this call");
    } else {
        warn!(what, error = %error, "Fetch failed");
    }
}
