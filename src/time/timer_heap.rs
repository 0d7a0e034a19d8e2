//! Timer heap for deadline management.
//!
//! A min-heap of `(deadline, key)` entries. Entries are never removed out of
//! order: the owner validates a key when it pops, so a scope that was popped
//! or a timer that was disarmed simply expires into nothing.

use crate::types::Time;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Eq, PartialEq)]
struct TimerEntry<K> {
    deadline: Time,
    key: K,
    /// Insertion order; ties fire first-in first-out.
    generation: u64,
}

impl<K: Eq> Ord for TimerEntry<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (earliest deadline first)
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

impl<K: Eq> PartialOrd for TimerEntry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A min-heap of timers ordered by deadline.
#[derive(Debug)]
pub struct TimerHeap<K> {
    heap: BinaryHeap<TimerEntry<K>>,
    next_generation: u64,
}

impl<K: Eq> Default for TimerHeap<K> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_generation: 0,
        }
    }
}

impl<K: Eq> TimerHeap<K> {
    /// Creates a new empty timer heap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries, including ones that will be skipped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns true if the heap is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Adds an entry firing at `deadline`.
    pub fn insert(&mut self, key: K, deadline: Time) {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.heap.push(TimerEntry {
            deadline,
            key,
            generation,
        });
    }

    /// Returns the earliest deadline, if any.
    #[must_use]
    pub fn peek_deadline(&self) -> Option<Time> {
        self.heap.peek().map(|e| e.deadline)
    }

    /// Pops all entries whose deadline is at or before `now`.
    ///
    /// Never returns an entry early.
    pub fn pop_expired(&mut self, now: Time) -> Vec<K> {
        let mut expired = Vec::new();
        while self.heap.peek().is_some_and(|e| e.deadline <= now) {
            if let Some(entry) = self.heap.pop() {
                expired.push(entry.key);
            }
        }
        expired
    }

    /// Drops entries for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        self.heap.retain(|e| keep(&e.key));
    }

    /// Clears all timers.
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
