//! Bounded top-K aggregation.
//!
//! [`TopK`] is a binary min-heap keyed by an ordered score where larger means
//! better. The root is always the worst retained entry, so deciding whether a
//! new candidate belongs in the top K is a single `peek`. Memory stays O(K)
//! regardless of how many candidates are offered, which is what lets a
//! streaming scan rank stores larger than working memory.
//!
//! Exact search keys entries by similarity (`OrderedFloat<f64>`); graph search
//! keys them by `Reverse(OrderedFloat<f32>)` distance so the closest entries
//! are the ones kept. Entries with equal scores are retained and popped in
//! unspecified relative order.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

#[derive(Debug, Clone)]
struct Entry<S, T> {
    score: S,
    item: T,
}

impl<S: Ord, T> PartialEq for Entry<S, T> {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score
    }
}

impl<S: Ord, T> Eq for Entry<S, T> {}

impl<S: Ord, T> PartialOrd for Entry<S, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S: Ord, T> Ord for Entry<S, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score.cmp(&other.score)
    }
}

/// Keeps the `capacity` best-scoring items seen so far.
#[derive(Debug, Clone)]
pub struct TopK<T, S: Ord> {
    capacity: usize,
    heap: BinaryHeap<Reverse<Entry<S, T>>>,
}

impl<T, S: Ord> TopK<T, S> {
    /// Creates an empty aggregator retaining at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity.saturating_add(1).min(4096)),
        }
    }

    /// Maximum number of items retained by [`offer`](Self::offer).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items currently held.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns `true` if no items are held.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Returns `true` once `capacity` items are held.
    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// Pushes unconditionally. Does not enforce the capacity.
    pub fn push(&mut self, score: S, item: T) {
        self.heap.push(Reverse(Entry { score, item }));
    }

    /// Offers a candidate under the fixed-size discipline.
    ///
    /// Below capacity the candidate is always inserted. At capacity it
    /// replaces the current worst only if its score is strictly greater.
    /// Returns `true` if the candidate was retained.
    pub fn offer(&mut self, score: S, item: T) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if self.heap.len() < self.capacity {
            self.push(score, item);
            return true;
        }
        match self.heap.peek() {
            Some(Reverse(worst)) if score > worst.score => {
                self.heap.pop();
                self.push(score, item);
                true
            }
            _ => false,
        }
    }

    /// The worst retained item, if any.
    pub fn peek(&self) -> Option<(&S, &T)> {
        self.heap.peek().map(|Reverse(e)| (&e.score, &e.item))
    }

    /// Score of the worst retained item.
    pub fn worst_score(&self) -> Option<&S> {
        self.heap.peek().map(|Reverse(e)| &e.score)
    }

    /// Removes and returns the worst retained item.
    pub fn pop(&mut self) -> Option<(S, T)> {
        self.heap.pop().map(|Reverse(e)| (e.score, e.item))
    }

    /// Consumes the aggregator, returning items best first.
    pub fn into_sorted_vec(self) -> Vec<(S, T)> {
        // ascending Reverse order is descending score order
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(e)| (e.score, e.item))
            .collect()
    }
}
