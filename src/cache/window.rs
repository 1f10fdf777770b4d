// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Bounded newest-first block window

use std::collections::VecDeque;

use alloy_primitives::BlockNumber;

use crate::types::Block;

/// Result of pushing a block onto a [`BlockWindow`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPush {
    /// The block became the new head; `evicted` is the tail that fell off
    Inserted { evicted: Option<BlockNumber> },
    /// A block with this number is already in the window
    Duplicate,
    /// The block is older than the current head
    NotNewer { head: BlockNumber },
}

impl WindowPush {
    pub fn is_inserted(&self) -> bool {
        matches!(self, WindowPush::Inserted { .. })
    }
}

/// Newest-first sequence of blocks with unique numbers and a fixed capacity
///
/// Blocks only ever enter at the head, and only when strictly newer than the
/// current head, so the window stays sorted without reordering. Once the
/// capacity is exceeded the oldest block is dropped from the tail.
#[derive(Debug, Clone)]
pub struct BlockWindow {
    cap: usize,
    entries: VecDeque<(BlockNumber, Block)>,
}

impl BlockWindow {
    /// Creates an empty window holding at most `cap` blocks
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            entries: VecDeque::with_capacity(cap.min(64)),
        }
    }

    /// Creates a window from arbitrary blocks, see [`replace`](Self::replace)
    pub fn from_blocks(cap: usize, blocks: impl IntoIterator<Item = Block>) -> Self {
        let mut window = Self::new(cap);
        window.replace(blocks);
        window
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of the newest block
    pub fn head_number(&self) -> Option<BlockNumber> {
        self.entries.front().map(|(n, _)| *n)
    }

    /// Number of the oldest block
    pub fn tail_number(&self) -> Option<BlockNumber> {
        self.entries.back().map(|(n, _)| *n)
    }

    pub fn contains(&self, number: BlockNumber) -> bool {
        self.entries.iter().any(|(n, _)| *n == number)
    }

    /// Pushes `block` as the new head
    ///
    /// The caller passes the already-parsed number so the window never has to
    /// re-read it from the JSON.
    pub fn push_newest(&mut self, number: BlockNumber, block: Block) -> WindowPush {
        if self.contains(number) {
            return WindowPush::Duplicate;
        }
        if let Some(head) = self.head_number() {
            if number < head {
                return WindowPush::NotNewer { head };
            }
        }

        self.entries.push_front((number, block));
        let evicted = if self.entries.len() > self.cap {
            self.entries.pop_back().map(|(n, _)| n)
        } else {
            None
        };
        WindowPush::Inserted { evicted }
    }

    /// Replaces the contents wholesale
    ///
    /// Blocks without a parseable number are dropped; the rest are sorted
    /// newest-first, de-duplicated by number (first occurrence wins) and
    /// truncated to the capacity.
    pub fn replace(&mut self, blocks: impl IntoIterator<Item = Block>) {
        let mut entries: Vec<(BlockNumber, Block)> = blocks
            .into_iter()
            .filter_map(|b| b.number().map(|n| (n, b)))
            .collect();

        // stable, so equal numbers keep input order and dedup keeps the first
        entries.sort_by(|(a, _), (b, _)| b.cmp(a));
        entries.dedup_by_key(|(n, _)| *n);
        entries.truncate(self.cap);

        self.entries = entries.into();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterates newest-first
    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.entries.iter().map(|(_, b)| b)
    }

    /// Block numbers, newest-first
    pub fn numbers(&self) -> Vec<BlockNumber> {
        self.entries.iter().map(|(n, _)| *n).collect()
    }

    /// Clones the blocks out, newest-first
    pub fn to_vec(&self) -> Vec<Block> {
        self.iter().cloned().collect()
    }
}
