// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Bounded set of recently seen transaction hashes

use std::collections::{HashSet, VecDeque};

use alloy_primitives::TxHash;

/// Insertion-ordered hash set that forgets its oldest entry past `cap`
#[derive(Debug, Clone)]
pub struct RecentHashes {
    cap: usize,
    order: VecDeque<TxHash>,
    seen: HashSet<TxHash>,
}

impl RecentHashes {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            order: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// Records `hash`, returning `false` if it was already present
    pub fn insert(&mut self, hash: TxHash) -> bool {
        if !self.seen.insert(hash) {
            return false;
        }
        self.order.push_back(hash);
        while self.order.len() > self.cap {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }

    pub fn contains(&self, hash: &TxHash) -> bool {
        self.seen.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(n: u8) -> TxHash {
        TxHash::repeat_byte(n)
    }

    #[test]
    fn test_insert_reports_novelty() {
        let mut set = RecentHashes::new(4);
        assert!(set.insert(hash(1)));
        assert!(!set.insert(hash(1)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut set = RecentHashes::new(2);
        set.insert(hash(1));
        set.insert(hash(2));
        set.insert(hash(3));

        assert_eq!(set.len(), 2);
        assert!(!set.contains(&hash(1)));
        assert!(set.contains(&hash(2)));
        // forgotten, so it counts as new again
        assert!(set.insert(hash(1)));
        assert!(!set.contains(&hash(2)));
    }
}
