//! An array-backed binary heap keyed by an integer priority.
//!
//! Unlike [std::collections::BinaryHeap] the ordering is chosen at runtime through [HeapOrder]
//! and the payload does not need to implement [Ord]. There is deliberately no decrease-key: the
//! search in [crate::search] relies on entries never moving once inserted.
use thiserror::Error;

/// Errors that can occur when reading from a [PriorityQueue].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// Happens when the best entry is requested from a queue without entries.
    #[error("priority queue is empty")]
    Empty,
}

/// Decides which entry ends up at the root of a [PriorityQueue].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeapOrder {
    /// Smallest key first.
    Min,
    /// Largest key first.
    Max,
}

impl HeapOrder {
    /// Whether key `a` strictly dominates key `b` under this ordering.
    #[inline]
    pub fn dominates(self, a: i32, b: i32) -> bool {
        match self {
            HeapOrder::Min => a < b,
            HeapOrder::Max => a > b,
        }
    }
}

#[derive(Clone, Debug)]
struct HeapEntry<T> {
    key: i32,
    item: T,
}

/// Binary heap of `(key, item)` pairs. Keys need not be unique.
#[derive(Clone, Debug)]
pub struct PriorityQueue<T> {
    order: HeapOrder,
    entries: Vec<HeapEntry<T>>,
}

impl<T> PriorityQueue<T> {
    pub fn new(order: HeapOrder) -> PriorityQueue<T> {
        PriorityQueue {
            order,
            entries: Vec::new(),
        }
    }
    pub fn with_capacity(order: HeapOrder, capacity: usize) -> PriorityQueue<T> {
        PriorityQueue {
            order,
            entries: Vec::with_capacity(capacity),
        }
    }
    /// Number of live entries.
    pub fn count(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends the entry and bubbles it towards the root while it dominates its parent.
    pub fn insert(&mut self, key: i32, item: T) {
        self.entries.push(HeapEntry { key, item });
        self.bubble_up(self.entries.len() - 1);
    }

    /// Returns the key and payload at the root.
    pub fn peek_best(&self) -> Result<(i32, &T), QueueError> {
        self.entries
            .first()
            .map(|entry| (entry.key, &entry.item))
            .ok_or(QueueError::Empty)
    }

    /// Removes and returns the root. The last entry takes its place and is bubbled down.
    pub fn pop_best(&mut self) -> Result<(i32, T), QueueError> {
        if self.entries.is_empty() {
            return Err(QueueError::Empty);
        }
        let root = self.entries.swap_remove(0);
        if self.entries.len() > 1 {
            self.bubble_down(0);
        }
        Ok((root.key, root.item))
    }

    /// Iterates over all live entries in storage order, not in priority order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, &T)> {
        self.entries.iter().map(|entry| (entry.key, &entry.item))
    }

    fn bubble_up(&mut self, mut ix: usize) {
        while ix > 0 {
            let parent = (ix - 1) / 2;
            if !self
                .order
                .dominates(self.entries[ix].key, self.entries[parent].key)
            {
                break;
            }
            self.entries.swap(ix, parent);
            ix = parent;
        }
    }

    fn bubble_down(&mut self, mut ix: usize) {
        let n = self.entries.len();
        loop {
            let left = 2 * ix + 1;
            let right = left + 1;
            if left >= n {
                break;
            }
            // Of two children, the one dominating its sibling is the only valid candidate.
            let child = if right < n
                && self
                    .order
                    .dominates(self.entries[right].key, self.entries[left].key)
            {
                right
            } else {
                left
            };
            if !self
                .order
                .dominates(self.entries[child].key, self.entries[ix].key)
            {
                break;
            }
            self.entries.swap(ix, child);
            ix = child;
        }
    }

    /// Checks that every parent dominates or equals both of its children.
    pub fn is_valid_heap(&self) -> bool {
        (1..self.entries.len()).all(|ix| {
            let parent = (ix - 1) / 2;
            !self
                .order
                .dominates(self.entries[ix].key, self.entries[parent].key)
        })
    }
}
