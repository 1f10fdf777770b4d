// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Updates fanned out to subscribers on every cache-affecting event

use alloy_primitives::{BlockNumber, TxHash};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::{Block, TimestampMillis, ValidatorPeer};

/// Latest mempool statistics, passed through as the node reports them
pub type MempoolStats = Value;

/// A scheduled transaction, passed through as the node reports it
pub type ScheduledTransaction = Value;

/// Discriminant of an [`UpdateEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateKind {
    NewBlock,
    NewTransaction,
    NewPendingTransaction,
    GasPriceUpdate,
    MempoolUpdate,
    ScheduledUpdate,
    ValidatorPeersUpdate,
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NewBlock => "newBlock",
            Self::NewTransaction => "newTransaction",
            Self::NewPendingTransaction => "newPendingTransaction",
            Self::GasPriceUpdate => "gasPriceUpdate",
            Self::MempoolUpdate => "mempoolUpdate",
            Self::ScheduledUpdate => "scheduledUpdate",
            Self::ValidatorPeersUpdate => "validatorPeersUpdate",
        };
        f.write_str(name)
    }
}

/// Payload of a realtime update
///
/// Serializes as `{"type": ..., "data": ...}` so the wire shape matches what
/// explorer front-ends already consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum UpdateEvent {
    /// A block was accepted into the global window
    NewBlock(Block),
    /// A transaction hash was seen in a newly accepted block
    NewTransaction { hash: TxHash },
    /// A pending transaction hash arrived over the subscription
    NewPendingTransaction { hash: TxHash, status: PendingStatus },
    /// Base fee of the newest block, in gwei
    #[serde(rename_all = "camelCase")]
    GasPriceUpdate {
        gas_price: f64,
        block_number: BlockNumber,
    },
    MempoolUpdate(MempoolStats),
    ScheduledUpdate(Vec<ScheduledTransaction>),
    ValidatorPeersUpdate(Vec<ValidatorPeer>),
}

/// Status tag carried by pending transaction updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingStatus {
    #[default]
    Pending,
}

impl UpdateEvent {
    /// The kind of this event
    pub fn kind(&self) -> UpdateKind {
        match self {
            Self::NewBlock(_) => UpdateKind::NewBlock,
            Self::NewTransaction { .. } => UpdateKind::NewTransaction,
            Self::NewPendingTransaction { .. } => UpdateKind::NewPendingTransaction,
            Self::GasPriceUpdate { .. } => UpdateKind::GasPriceUpdate,
            Self::MempoolUpdate(_) => UpdateKind::MempoolUpdate,
            Self::ScheduledUpdate(_) => UpdateKind::ScheduledUpdate,
            Self::ValidatorPeersUpdate(_) => UpdateKind::ValidatorPeersUpdate,
        }
    }
}

/// A timestamped update delivered to every subscriber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeUpdate {
    #[serde(flatten)]
    pub event: UpdateEvent,
    /// When the update was produced
    pub timestamp: TimestampMillis,
}

impl RealtimeUpdate {
    /// Stamps an event with the current time
    pub fn now(event: UpdateEvent) -> Self {
        Self {
            event,
            timestamp: TimestampMillis::now(),
        }
    }

    /// Shorthand for `self.event.kind()`
    pub fn kind(&self) -> UpdateKind {
        self.event.kind()
    }
}
