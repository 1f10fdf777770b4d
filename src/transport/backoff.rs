// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Reconnection state and exponential backoff for the WebSocket transport.
//!
//! The backoff formula is:
//!
//! ```text
//! delay(0)   = base_delay
//! delay(n+1) = min(delay(n) * 2 + jitter, max_delay)    jitter in [0, max_jitter]
//! ```
//!
//! After `max_attempts` consecutive failures the controller gives up and the
//! feed continues on polling alone. A successful connection resets both the
//! attempt counter and the delay.

use std::fmt;
use std::time::Duration;

use rand::Rng;

use crate::config::constants::reconnect::{BASE_DELAY, MAX_ATTEMPTS, MAX_DELAY, MAX_JITTER};

/// Connection lifecycle as reported by [`ConnectionStatus`](crate::ConnectionStatus)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Reconnection attempts are used up; only polling is running
    Exhausted,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Exhausted => "exhausted",
        };
        f.write_str(name)
    }
}

/// Reconnection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnection attempt.
    pub base_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Upper bound on the random jitter added at each doubling.
    pub max_jitter: Duration,
    /// Consecutive failed attempts before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: BASE_DELAY,
            max_delay: MAX_DELAY,
            max_jitter: MAX_JITTER,
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// Sets the maximum number of attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the base and maximum delays.
    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    /// Disables jitter, making delays deterministic.
    pub fn without_jitter(mut self) -> Self {
        self.max_jitter = Duration::ZERO;
        self
    }
}

/// Doubles `current`, adds `jitter` and caps at `max`, saturating on overflow.
fn grow(current: Duration, jitter: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).saturating_add(jitter).min(max)
}

/// Stateful backoff driven by the connection supervisor.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempts: u32,
    interval: Duration,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            interval: policy.base_delay,
        }
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Attempts scheduled since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay the next scheduled attempt would wait.
    pub fn current_interval(&self) -> Duration {
        self.interval
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.policy.max_attempts
    }

    /// Registers a failure and returns how long to wait before retrying.
    ///
    /// Returns `None` once the attempt budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        let max_jitter_ms = self.policy.max_jitter.as_millis() as u64;
        let jitter = if max_jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..=max_jitter_ms))
        };
        self.next_delay_with_jitter(jitter)
    }

    /// [`next_delay`](Self::next_delay) with a caller-chosen jitter.
    pub fn next_delay_with_jitter(&mut self, jitter: Duration) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempts += 1;
        let delay = self.interval;
        self.interval = grow(self.interval, jitter, self.policy.max_delay);
        Some(delay)
    }

    /// Restores the initial interval and attempt count after a successful connection.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.interval = self.policy.base_delay;
    }
}
