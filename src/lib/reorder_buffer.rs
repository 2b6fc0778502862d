//! Reordering buffer for out-of-order completion.
//!
//! Items tagged with sequence numbers go in in any order and come out in sequence order.
//! The streaming reader uses it to emit per-record results in source order although they
//! are computed by several workers.
//!
//! # Example
//!
//! ```
//! use nanoget_lib::reorder_buffer::ReorderBuffer;
//!
//! let mut reads: ReorderBuffer<&str> = ReorderBuffer::new();
//! reads.insert(1, "read_b");
//! assert_eq!(reads.try_pop_next(), None);
//!
//! reads.insert(0, "read_a");
//! assert_eq!(reads.try_pop_next(), Some("read_a"));
//! assert_eq!(reads.try_pop_next(), Some("read_b"));
//! assert!(reads.is_empty());
//! ```

use std::collections::VecDeque;

/// A buffer that releases items in sequential order.
///
/// Uses a sparse `VecDeque` indexed by `seq - next_seq`, so inserting and popping are O(1)
/// when items arrive roughly in order.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    /// Slot 0 holds the item with sequence number `next_seq`.
    buffer: VecDeque<Option<T>>,
    next_seq: u64,
    count: usize,
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReorderBuffer<T> {
    #[must_use]
    pub fn new() -> Self {
        Self { buffer: VecDeque::new(), next_seq: 0, count: 0 }
    }

    /// Insert an item with a sequence number.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if an item with the same sequence number is already buffered,
    /// or if the sequence number was already released.
    #[allow(clippy::cast_possible_truncation)]
    pub fn insert(&mut self, seq: u64, item: T) {
        debug_assert!(seq >= self.next_seq, "Sequence number {seq} was already released");

        let index = (seq - self.next_seq) as usize;
        while self.buffer.len() <= index {
            self.buffer.push_back(None);
        }

        debug_assert!(self.buffer[index].is_none(), "Duplicate sequence number: {seq}");
        self.buffer[index] = Some(item);
        self.count += 1;
    }

    /// Pop the next sequential item if it has arrived.
    #[must_use]
    pub fn try_pop_next(&mut self) -> Option<T> {
        match self.buffer.front() {
            Some(Some(_)) => {
                let item = self.buffer.pop_front().flatten();
                self.next_seq += 1;
                self.count -= 1;
                item
            }
            _ => None,
        }
    }

    /// The sequence number of the next item to be released.
    #[must_use]
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Number of buffered items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether no items are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
