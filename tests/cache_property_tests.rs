// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Property-based tests for the block windows and the cache store
//!
//! These tests use proptest to check the window invariants (capacity,
//! uniqueness, newest-first order, eviction) and the monotonic ingestion
//! counter across arbitrary block sequences.

mod helpers;

use alloy_primitives::TxHash;
use blockfeed::cache::{BlockWindow, CacheStore, IngestOutcome, RecentHashes, WindowPush};
use blockfeed::config::WindowLimits;
use helpers::{block, numbers};
use proptest::prelude::*;

fn limits(global_cap: usize, page_cap: usize) -> WindowLimits {
    WindowLimits {
        global_cap,
        page_cap,
        tx_dedup_cap: 16,
    }
}

fn is_strictly_descending(numbers: &[u64]) -> bool {
    numbers.windows(2).all(|pair| pair[0] > pair[1])
}

proptest! {
    /// Property: ingestion never exceeds the cap, never duplicates and keeps
    /// the window newest-first
    #[test]
    fn prop_global_window_bounded_and_ordered(
        cap in 1usize..64,
        sequence in prop::collection::vec(0u64..200, 0..300),
    ) {
        let cache = CacheStore::new(limits(cap, 10));
        for n in &sequence {
            cache.ingest_block(block(*n));
        }

        let window = numbers(&cache.global_blocks());
        prop_assert!(window.len() <= cap);
        prop_assert!(is_strictly_descending(&window));
    }

    /// Property: the last-seen counter equals the maximum accepted number and
    /// anything at or below it is rejected
    #[test]
    fn prop_last_seen_is_running_max(sequence in prop::collection::vec(0u64..1_000, 1..200)) {
        let cache = CacheStore::new(limits(500, 10));
        let mut running_max: Option<u64> = None;

        for n in sequence {
            let outcome = cache.ingest_block(block(n));
            match running_max {
                Some(max) if n <= max => {
                    prop_assert_eq!(outcome, IngestOutcome::Stale { number: n, last_seen: max });
                }
                _ => {
                    prop_assert!(matches!(outcome, IngestOutcome::Accepted(_)));
                    running_max = Some(n);
                }
            }
            prop_assert_eq!(cache.last_seen_block(), running_max);
        }
    }

    /// Property: once a window is full each further distinct insertion evicts
    /// exactly its oldest entry
    #[test]
    fn prop_full_window_evicts_one(cap in 1usize..50, extra in 1u64..50) {
        let mut window = BlockWindow::new(cap);
        let total = cap as u64 + extra;

        for n in 0..total {
            let push = window.push_newest(n, block(n));
            let expected_evicted = n.checked_sub(cap as u64);
            prop_assert_eq!(push, WindowPush::Inserted { evicted: expected_evicted });
            prop_assert!(window.len() <= cap);
        }
        prop_assert_eq!(window.len(), cap);
        prop_assert_eq!(window.tail_number(), Some(total - cap as u64));
    }

    /// Property: adding the same block to a page window twice is a no-op
    #[test]
    fn prop_page_append_idempotent(sequence in prop::collection::vec(0u64..100, 1..50)) {
        let cache = CacheStore::new(limits(10, 1000));
        for n in &sequence {
            cache.append_block_to_named_window("blocks", block(*n));
            let before = cache.page_window("blocks");
            let again = cache.append_block_to_named_window("blocks", block(*n));
            prop_assert!(!again.is_some_and(|push| push.is_inserted()));
            prop_assert_eq!(numbers(&cache.page_window("blocks")), numbers(&before));
        }
    }

    /// Property: wholesale replacement yields a sorted, unique, capped window
    #[test]
    fn prop_replace_normalizes(
        cap in 1usize..40,
        input in prop::collection::vec(0u64..60, 0..120),
    ) {
        let cache = CacheStore::new(limits(10, cap));
        let kept = cache.replace_named_window("p", input.iter().copied().map(block).collect());

        let window = numbers(&cache.page_window("p"));
        prop_assert_eq!(kept, window.len());
        prop_assert!(window.len() <= cap);
        prop_assert!(is_strictly_descending(&window));

        let mut expected = input.clone();
        expected.sort_unstable_by(|a, b| b.cmp(a));
        expected.dedup();
        expected.truncate(cap);
        prop_assert_eq!(window, expected);
    }

    /// Property: the de-duplication set stays bounded and remembers the most
    /// recent hashes
    #[test]
    fn prop_recent_hashes_bounded(cap in 1usize..32, count in 0u8..100) {
        let mut hashes = RecentHashes::new(cap);
        for i in 0..count {
            prop_assert!(hashes.insert(TxHash::repeat_byte(i)));
        }
        prop_assert!(hashes.len() <= cap);
        if count > 0 {
            prop_assert!(hashes.contains(&TxHash::repeat_byte(count - 1)));
        }
    }
}

#[test]
fn test_out_of_order_and_duplicate_heads() {
    let cache = CacheStore::default();
    for n in [100, 101, 99, 101] {
        cache.ingest_block(block(n));
    }

    assert_eq!(numbers(&cache.global_blocks()), vec![101, 100]);
    assert_eq!(cache.last_seen_block(), Some(101));
}

#[test]
fn test_page_window_at_cap_drops_first_block() {
    let cache = CacheStore::default();
    for n in 1..=1001 {
        cache.append_block_to_named_window("blocks", block(n));
    }

    let window = numbers(&cache.page_window("blocks"));
    assert_eq!(window.len(), 1000);
    assert_eq!(window.first(), Some(&1001));
    assert!(!window.contains(&1));
}
