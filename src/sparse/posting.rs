//! Per-token posting lists with incrementally maintained block-max arrays.

use crate::error::{Error, Result};

/// One `(doc_id, weight)` entry in a posting list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Posting {
    /// Document id this posting belongs to.
    pub doc_id: u64,
    /// Term weight for this document.
    pub weight: f32,
}

/// Postings for a single token, ordered by strictly ascending `doc_id`
/// (documents are appended in increasing id order, so this falls out of
/// append-only insertion), plus a block-max upper bound recomputed on
/// every append.
#[derive(Debug, Clone, Default)]
pub struct PostingList {
    postings: Vec<Posting>,
    block_max: Vec<f32>,
    block_size: usize,
}

impl PostingList {
    /// Create an empty posting list using `block_size` as the WAND block
    /// size `B`.
    pub fn new(block_size: usize) -> Self {
        Self {
            postings: Vec::new(),
            block_max: Vec::new(),
            block_size: block_size.max(1),
        }
    }

    /// Number of postings in this list.
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    /// True if this token has no postings.
    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Read access to the raw postings (ascending by `doc_id`).
    pub fn postings(&self) -> &[Posting] {
        &self.postings
    }

    /// Upper bound on weight for block `i`, i.e. `max` over postings at
    /// positions `[i*B, (i+1)*B)`.
    pub fn block_max(&self) -> &[f32] {
        &self.block_max
    }

    /// Global maximum weight across the whole list (used as the WAND
    /// cursor's `max_contribution` basis). `0.0` for an empty list.
    pub fn global_max(&self) -> f32 {
        self.block_max.iter().cloned().fold(0.0, f32::max)
    }

    /// Append a posting. `doc_id` must be strictly greater than the
    /// previous posting's `doc_id` (enforced by the caller, which only
    /// ever appends in increasing `doc_count` order).
    ///
    /// Returns `Err(Error::OutOfMemory)` and leaves the list unmodified
    /// if growing the backing storage fails.
    pub fn push(&mut self, doc_id: u64, weight: f32) -> Result<()> {
        debug_assert!(self
            .postings
            .last()
            .map(|p| p.doc_id < doc_id)
            .unwrap_or(true));

        self.postings
            .try_reserve(1)
            .map_err(|_| Error::OutOfMemory)?;
        self.postings.push(Posting { doc_id, weight });

        let block_idx = (self.postings.len() - 1) / self.block_size;
        if block_idx == self.block_max.len() {
            self.block_max
                .try_reserve(1)
                .map_err(|_| Error::OutOfMemory)?;
            self.block_max.push(weight);
        } else {
            let slot = &mut self.block_max[block_idx];
            if weight > *slot {
                *slot = weight;
            }
        }
        Ok(())
    }

    /// Recompute every block-max entry from the current postings. A
    /// no-op in correctness terms today (weights never change after
    /// insert), but the documented hook the Open Question in the spec
    /// invites for a future where postings can be pruned/rewritten.
    pub fn compact(&mut self) {
        self.block_max.clear();
        for chunk in self.postings.chunks(self.block_size) {
            let m = chunk.iter().map(|p| p.weight).fold(0.0, f32::max);
            self.block_max.push(m);
        }
    }

    /// Find the first posting with `doc_id >= target` at or after
    /// `from`, using block-level skipping: if the last posting of a
    /// block is still `< target`, the whole block is skipped; otherwise
    /// the block is scanned linearly.
    pub fn advance_to(&self, from: usize, target: u64) -> usize {
        let mut pos = from;
        let len = self.postings.len();
        while pos < len {
            let block_idx = pos / self.block_size;
            let block_end = ((block_idx + 1) * self.block_size).min(len);
            if self.postings[block_end - 1].doc_id < target {
                pos = block_end;
                continue;
            }
            while pos < block_end && self.postings[pos].doc_id < target {
                pos += 1;
            }
            break;
        }
        pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_max_tracks_running_max() {
        let mut list = PostingList::new(4);
        for (doc_id, weight) in [(0, 1.0), (1, 3.0), (2, 2.0), (3, 0.5), (4, 9.0)] {
            list.push(doc_id, weight).unwrap();
        }
        // block 0: docs 0..4, weights [1,3,2,0.5] -> max 3
        // block 1: doc 4, weight 9 -> max 9
        assert_eq!(list.block_max(), &[3.0, 9.0]);
    }

    #[test]
    fn advance_to_skips_whole_blocks() {
        let mut list = PostingList::new(4);
        for doc_id in [0u64, 2, 5, 7, 9, 12, 15] {
            list.push(doc_id, 1.0).unwrap();
        }
        let pos = list.advance_to(0, 9);
        assert_eq!(list.postings()[pos].doc_id, 9);
    }

    #[test]
    fn compact_matches_incremental_block_max() {
        let mut list = PostingList::new(3);
        for (doc_id, weight) in [(0, 0.1), (1, 0.9), (2, 0.4), (3, 0.2), (4, 0.8)] {
            list.push(doc_id, weight).unwrap();
        }
        let before = list.block_max().to_vec();
        list.compact();
        assert_eq!(list.block_max(), before.as_slice());
    }
}
