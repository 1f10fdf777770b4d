// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Wall-clock timestamps for updates and persisted snapshots

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Unix timestamp in milliseconds
///
/// Stamped on every [`RealtimeUpdate`](super::RealtimeUpdate) and on every
/// persisted snapshot section, where it drives the freshness check on restore.
///
/// # Examples
///
/// ```
/// use blockfeed::TimestampMillis;
/// use std::time::Duration;
///
/// let ts = TimestampMillis::now();
/// std::thread::sleep(Duration::from_millis(10));
/// let age = ts.age_since_now();
/// assert!(age >= Duration::from_millis(10));
/// assert!(age < Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimestampMillis(u64);

impl TimestampMillis {
    /// Creates a new timestamp representing the current time
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(u64::try_from(millis).unwrap_or(u64::MAX))
    }

    /// Creates a timestamp from a raw millisecond value
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the raw millisecond value
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Whole seconds since the Unix epoch
    pub const fn as_secs(&self) -> u64 {
        self.0 / 1000
    }

    /// Calculates the age of this timestamp relative to now
    ///
    /// Timestamps in the future have an age of zero.
    pub fn age_since_now(&self) -> Duration {
        Duration::from_millis(Self::now().0.saturating_sub(self.0))
    }

    /// Checks if this timestamp is older than the given duration
    ///
    /// # Examples
    ///
    /// ```
    /// use blockfeed::TimestampMillis;
    /// use std::time::Duration;
    ///
    /// let ts = TimestampMillis::now();
    /// std::thread::sleep(Duration::from_millis(10));
    /// assert!(ts.is_older_than(Duration::from_millis(5)));
    /// assert!(!ts.is_older_than(Duration::from_secs(10)));
    /// ```
    pub fn is_older_than(&self, duration: Duration) -> bool {
        self.age_since_now() > duration
    }
}

impl Default for TimestampMillis {
    fn default() -> Self {
        Self::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now_millis() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64
    }

    #[test]
    fn timestamp_millis_ordering() {
        let t1 = TimestampMillis::from_millis(1000);
        let t2 = TimestampMillis::from_millis(2000);
        assert!(t1 < t2);
        assert_eq!(t1, t1);
    }

    #[test]
    fn timestamp_millis_age() {
        let past = TimestampMillis::from_millis(now_millis() - 5000);

        let age = past.age_since_now();
        assert!(age >= Duration::from_millis(5000));
        assert!(age < Duration::from_millis(6000));
    }

    #[test]
    fn timestamp_millis_age_future() {
        let future = TimestampMillis::from_millis(now_millis() + 5000);

        // Future timestamps have zero age
        assert_eq!(future.age_since_now(), Duration::ZERO);
    }

    #[test]
    fn timestamp_millis_is_older_than() {
        let past = TimestampMillis::from_millis(now_millis() - 5000);

        assert!(past.is_older_than(Duration::from_millis(4000)));
        assert!(!past.is_older_than(Duration::from_millis(6000)));
    }

    #[test]
    fn timestamp_millis_as_secs() {
        assert_eq!(TimestampMillis::from_millis(1_700_000_000_999).as_secs(), 1_700_000_000);
    }

    #[test]
    fn timestamp_millis_serialization() {
        let ts = TimestampMillis::from_millis(1234567890);
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "1234567890");

        let deserialized: TimestampMillis = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, ts);
    }
}
