// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Polling loops backing up the WebSocket feed
//!
//! Mempool stats, scheduled transactions and the latest block are polled on a
//! fixed interval whether or not the subscription is up. The validator peer
//! list uses an [`AdaptiveInterval`]: short while the set keeps changing,
//! long once two consecutive fetches agree.
//!
//! Loops never back off. A failed tick is logged by the tick body and the
//! next tick runs on schedule.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::ConfigError;

/// Data category for [`RealtimeManager::force_refresh`](crate::RealtimeManager::force_refresh)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshKind {
    Mempool,
    Scheduled,
    Blocks,
}

impl RefreshKind {
    /// Every kind, in the order the post-connect catch-up refreshes them
    pub const ALL: [RefreshKind; 3] = [RefreshKind::Blocks, RefreshKind::Mempool, RefreshKind::Scheduled];
}

impl fmt::Display for RefreshKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RefreshKind::Mempool => "mempool",
            RefreshKind::Scheduled => "scheduled",
            RefreshKind::Blocks => "blocks",
        };
        f.write_str(name)
    }
}

impl FromStr for RefreshKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mempool" => Ok(RefreshKind::Mempool),
            "scheduled" => Ok(RefreshKind::Scheduled),
            "blocks" => Ok(RefreshKind::Blocks),
            other => Err(ConfigError::invalid(
                "refresh_kind",
                format!("expected mempool, scheduled or blocks, got {other:?}"),
            )),
        }
    }
}

/// Outcome of one peer-list fetch, as seen by [`AdaptiveInterval`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerPoll {
    /// The fetched set differs from the cached one
    Changed,
    /// Same peers as last time
    Unchanged,
    /// The fetch failed
    Failed,
}

/// Two-state interval driven by whether consecutive results agree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptiveInterval {
    short: Duration,
    long: Duration,
    current: Duration,
}

impl AdaptiveInterval {
    /// Starts at the short interval
    pub fn new(short: Duration, long: Duration) -> Self {
        Self {
            short,
            long,
            current: short,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn is_relaxed(&self) -> bool {
        self.current == self.long && self.long != self.short
    }

    /// Adjusts the interval after a fetch and returns the new value
    ///
    /// A failure leaves the interval where it was.
    pub fn observe(&mut self, outcome: PeerPoll) -> Duration {
        self.current = match outcome {
            PeerPoll::Changed => self.short,
            PeerPoll::Unchanged => self.long,
            PeerPoll::Failed => self.current,
        };
        self.current
    }
}

/// Runs `tick` immediately and then every `period` until `cancel` fires
///
/// A tick that overruns the period delays the next one instead of bursting.
pub fn spawn_fixed_loop<F, Fut>(
    name: &'static str,
    period: Duration,
    cancel: CancellationToken,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick() => {}
            }
        }
        debug!(loop_name = name, "Polling loop stopped");
    })
}

/// Runs `tick` immediately, then sleeps for whatever interval the outcome
/// selects, until `cancel` fires
pub fn spawn_adaptive_loop<F, Fut>(
    name: &'static str,
    mut schedule: AdaptiveInterval,
    cancel: CancellationToken,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = PeerPoll> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => break,
                outcome = tick() => outcome,
            };

            let next = schedule.observe(outcome);
            debug!(
                loop_name = name,
                ?outcome,
                next_secs = next.as_secs(),
                "Scheduled next poll"
            );

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(next) => {}
            }
        }
        debug!(loop_name = name, "Polling loop stopped");
    })
}
