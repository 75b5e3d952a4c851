//! Bounded drop-oldest FIFO, the handoff primitive used throughout the
//! pipeline.
//!
//! Backed by an owned linked list so that `merge` is a constant-time node
//! splice rather than a per-element copy, and so every contained item is
//! freed automatically when the queue goes out of scope.

use std::collections::LinkedList;

/// Default capacity used when the caller has no better number.
pub const DEFAULT_CAPACITY: usize = 128;

/// A strictly-FIFO queue with a fixed maximum length.
///
/// Overflow evicts the oldest item so the producer is never blocked; the
/// caller is told about every eviction so drops stay countable.
///
/// Invariants: `len() <= capacity()` and `len() == 0` exactly when the list
/// head is empty.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    items: LinkedList<T>,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// A capacity of zero is raised to one so at least one item can always
    /// be stored.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            items: LinkedList::new(),
            capacity: capacity.max(1),
        }
    }

    #[must_use]
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append an item at the tail in O(1).
    ///
    /// If the queue is full, the oldest item is evicted first and returned
    /// so the caller can count the drop; net length stays at capacity.
    pub fn enqueue(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Remove and return the head item in O(1), or `None` if empty.
    pub fn dequeue(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Splice the entire contents of `other` onto this queue's tail in
    /// O(1), leaving `other` empty, then truncate from the front until the
    /// capacity invariant holds again.
    ///
    /// Returns the number of items dropped by the truncation. Relative
    /// order is preserved: `other`'s items follow this queue's items.
    pub fn merge(&mut self, other: &mut BoundedQueue<T>) -> usize {
        if other.is_empty() {
            return 0;
        }
        self.items.append(&mut other.items);

        let mut dropped = 0;
        while self.items.len() > self.capacity {
            self.items.pop_front();
            dropped += 1;
        }
        dropped
    }

    /// Drop every contained item. Used at teardown.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> std::collections::linked_list::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T> IntoIterator for BoundedQueue<T> {
    type Item = T;
    type IntoIter = std::collections::linked_list::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
