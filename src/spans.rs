// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Span creation helpers for blockfeed operations.
//!
//! Telemetry is kept out of the business logic: instead of `#[instrument]`
//! attributes, every instrumented operation has a span helper here. Synchronous
//! code enters the span; async code attaches it with
//! [`Instrument`](tracing::Instrument).
//!
//! Usage pattern:
//! ```rust,ignore
//! async fn poll_mempool(&self) {
//!     async { /* business logic */ }
//!         .instrument(spans::poll_mempool())
//!         .await
//! }
//! ```

use alloy_primitives::{BlockHash, BlockNumber};
use tracing::{Level, Span};

use crate::polling::RefreshKind;

/// Create span for the lifetime of one WebSocket connection.
///
/// Parent: None (the supervisor creates one per attempt)
/// Children: ingest_block spans for streamed heads
#[inline]
pub(crate) fn websocket_connection(connection_id: &str, url: &str, attempt: u32) -> Span {
    tracing::span!(
        Level::INFO,
        "blockfeed.websocket_connection",
        connection_id = %connection_id,
        url = %url,
        attempt = attempt,
    )
}

/// Create span for pushing one block through the ingestion path.
#[inline]
pub(crate) fn ingest_block(block_number: Option<BlockNumber>, source: &'static str) -> Span {
    tracing::debug_span!(
        "blockfeed.ingest_block",
        block_number = block_number,
        source = source,
    )
}

/// Create span for fetching a block body to extract transaction hashes.
///
/// Parent: ingest_block span
#[inline]
pub(crate) fn fetch_block_body(block_hash: BlockHash) -> Span {
    tracing::debug_span!("blockfeed.fetch_block_body", block_hash = %block_hash)
}

/// Create span for one tick of the mempool + scheduled transactions loop.
#[inline]
pub(crate) fn poll_mempool() -> Span {
    tracing::trace_span!("blockfeed.poll_mempool")
}

/// Create span for one tick of the latest-block loop.
#[inline]
pub(crate) fn poll_latest_block(last_seen: Option<BlockNumber>) -> Span {
    tracing::trace_span!("blockfeed.poll_latest_block", last_seen = last_seen)
}

/// Create span for one tick of the validator peer loop.
#[inline]
pub(crate) fn poll_peers() -> Span {
    tracing::debug_span!("blockfeed.poll_peers")
}

/// Create span for a batched geolocation lookup.
#[inline]
pub(crate) fn enrich_peers(peer_count: usize, generation: u64) -> Span {
    tracing::debug_span!(
        "blockfeed.enrich_peers",
        peer_count = peer_count,
        generation = generation,
    )
}

/// Create span for a caller-requested refresh.
#[inline]
pub(crate) fn force_refresh(kind: RefreshKind) -> Span {
    tracing::info_span!("blockfeed.force_refresh", kind = %kind)
}

/// Create span for writing a snapshot.
#[inline]
pub(crate) fn save_snapshot() -> Span {
    tracing::debug_span!("blockfeed.save_snapshot")
}

/// Create span for restoring a snapshot at startup.
#[inline]
pub(crate) fn restore_snapshot() -> Span {
    tracing::info_span!("blockfeed.restore_snapshot")
}
