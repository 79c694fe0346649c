//! Bounded min-heap over `(score, id)`, shared by every component's top-k
//! search path.
//!
//! The heap's root is always the current worst accepted candidate. A new
//! candidate is pushed only if the heap has free capacity or it beats the
//! root, matching the glossary definition of "Top-k heap" exactly.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Wraps an `f32` so it can sit in a `BinaryHeap`, which requires `Ord`.
/// NaN is treated as less than everything else so it never wins a
/// "better score" comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
struct OrdF32(f32);

impl Eq for OrdF32 {}

impl PartialOrd for OrdF32 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrdF32 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Less)
    }
}

/// A candidate held in the heap: worse-than ordering is "smaller score is
/// worse", so a `BinaryHeap<Reverse<Entry>>`-style max-heap-of-the-worst
/// would work too, but keeping the natural max-heap and tracking "worst"
/// via `peek` is simpler and matches the teacher's min-heap-via-Reverse
/// idiom used for sparse top-k.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    score: OrdF32,
    id: u64,
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap by score so `peek` returns the *best* candidate;
        // we invert comparisons at the call sites that need "worst".
        self.score.cmp(&other.score).then(self.id.cmp(&other.id))
    }
}

/// Orders candidates so that larger `score` is "better" (used for
/// similarity scores such as BM25-style dot products, where higher is
/// more relevant).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Larger score wins (relevance scores).
    MaxIsBest,
    /// Smaller score wins (distances).
    MinIsBest,
}

/// A bounded heap that retains the `k` best `(score, id)` pairs seen so
/// far, under the configured [`Order`].
pub struct TopKHeap {
    k: usize,
    order: Order,
    // Internally always stored as a max-heap over the "goodness" of a
    // candidate, so the root is the current *worst* accepted candidate,
    // regardless of `Order`.
    heap: BinaryHeap<WorstFirst>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WorstFirst(Entry);

impl PartialOrd for WorstFirst {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WorstFirst {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse so the BinaryHeap's max becomes the "worst" entry.
        other.0.cmp(&self.0)
    }
}

impl TopKHeap {
    /// Create a heap that retains the top `k` candidates under `order`.
    pub fn new(k: usize, order: Order) -> Self {
        Self {
            k,
            order,
            heap: BinaryHeap::with_capacity(k.saturating_add(1)),
        }
    }

    /// Maximum number of candidates this heap retains.
    pub fn capacity(&self) -> usize {
        self.k
    }

    /// Number of candidates currently held.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// True if no candidates have been pushed.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// True once `k` candidates have been accepted.
    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.k
    }

    /// The current worst accepted score, if the heap is full; `None` if
    /// there is still free capacity (any candidate is admissible).
    pub fn worst_score(&self) -> Option<f32> {
        if self.is_full() {
            self.heap.peek().map(|e| e.0.score.0)
        } else {
            None
        }
    }

    /// Internal comparator: is `candidate` strictly better than
    /// `incumbent` under this heap's order?
    fn better(&self, candidate: f32, incumbent: f32) -> bool {
        match self.order {
            Order::MaxIsBest => candidate > incumbent,
            Order::MinIsBest => candidate < incumbent,
        }
    }

    /// Convert a raw score to the internal "larger is better" key used
    /// to keep a single max-heap implementation for both orders.
    fn key(&self, score: f32) -> f32 {
        match self.order {
            Order::MaxIsBest => score,
            Order::MinIsBest => -score,
        }
    }

    /// Offer a candidate. Accepted if the heap has free capacity or the
    /// candidate beats the current worst accepted entry; in the latter
    /// case the previous worst entry is evicted.
    pub fn push(&mut self, score: f32, id: u64) {
        if self.k == 0 {
            return;
        }
        let keyed = self.key(score);
        if self.heap.len() < self.k {
            self.heap.push(WorstFirst(Entry {
                score: OrdF32(keyed),
                id,
            }));
            return;
        }
        if let Some(worst) = self.heap.peek() {
            let worst_keyed = worst.0.score.0;
            if self.better(keyed, worst_keyed) {
                self.heap.pop();
                self.heap.push(WorstFirst(Entry {
                    score: OrdF32(keyed),
                    id,
                }));
            }
        }
    }

    /// Drain the heap into a `Vec<(id, score)>` ordered best-first.
    pub fn into_sorted_vec(self) -> Vec<(u64, f32)> {
        let order = self.order;
        let mut out: Vec<(u64, f32)> = self
            .heap
            .into_iter()
            .map(|WorstFirst(e)| {
                let raw = match order {
                    Order::MaxIsBest => e.score.0,
                    Order::MinIsBest => -e.score.0,
                };
                (e.id, raw)
            })
            .collect();
        match order {
            Order::MaxIsBest => out.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal)),
            Order::MinIsBest => out.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal)),
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retains_top_k_max() {
        let mut heap = TopKHeap::new(2, Order::MaxIsBest);
        for (score, id) in [(1.0, 1), (5.0, 2), (3.0, 3), (4.0, 4)] {
            heap.push(score, id);
        }
        let out = heap.into_sorted_vec();
        assert_eq!(out, vec![(2, 5.0), (4, 4.0)]);
    }

    #[test]
    fn retains_top_k_min() {
        let mut heap = TopKHeap::new(2, Order::MinIsBest);
        for (score, id) in [(1.0, 1), (5.0, 2), (3.0, 3), (0.5, 4)] {
            heap.push(score, id);
        }
        let out = heap.into_sorted_vec();
        assert_eq!(out, vec![(4, 0.5), (1, 1.0)]);
    }

    #[test]
    fn k_zero_never_accepts() {
        let mut heap = TopKHeap::new(0, Order::MaxIsBest);
        heap.push(1.0, 1);
        assert!(heap.is_empty());
        assert!(heap.into_sorted_vec().is_empty());
    }

    #[test]
    fn worst_score_tracks_threshold() {
        let mut heap = TopKHeap::new(2, Order::MaxIsBest);
        assert_eq!(heap.worst_score(), None);
        heap.push(1.0, 1);
        assert_eq!(heap.worst_score(), None);
        heap.push(2.0, 2);
        assert_eq!(heap.worst_score(), Some(1.0));
        heap.push(3.0, 3);
        assert_eq!(heap.worst_score(), Some(2.0));
    }
}
