// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Data model shared by the cache, the transports and subscribers.

mod block;
mod peer;
mod timestamp;
mod update;

pub use block::Block;
pub(crate) use block::parse_quantity;
pub use peer::{GeoLocation, ValidatorPeer};
pub(crate) use peer::same_peer_set;
pub use timestamp::TimestampMillis;
pub use update::{
    MempoolStats, PendingStatus, RealtimeUpdate, ScheduledTransaction, UpdateEvent, UpdateKind,
};
