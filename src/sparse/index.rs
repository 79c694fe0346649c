//! The learned-sparse inverted index: insert/delete/search over a fixed
//! vocabulary, with both an accumulator-mode and a Block-Max WAND scoring
//! path that are required to agree on every top-k score set.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{instrument, trace};

use crate::error::{Error, Result};
use crate::heap::{Order, TopKHeap};
use crate::sparse::entry::SparseEntry;
use crate::sparse::posting::PostingList;
use crate::sparse::wand;

/// Per-document bookkeeping: how many non-zero terms it was inserted
/// with, and whether it has since been deleted.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocMeta {
    pub entry_count: usize,
    pub deleted: bool,
}

/// Tunables fixed at index construction.
#[derive(Debug, Clone)]
pub struct LearnedSparseConfig {
    /// Size of the fixed vocabulary; `token_id` must be `< vocab_size`.
    pub vocab_size: u32,
    /// Documents with more than this many non-zero entries are rejected.
    pub max_nonzeros: usize,
    /// Block size `B` used for every posting list's block-max array.
    pub wand_block_size: usize,
    /// Use the Block-Max WAND traversal for search. When `false`, search
    /// falls back to the accumulator-mode path (useful for testing the
    /// two scoring modes against each other).
    pub use_wand: bool,
}

impl Default for LearnedSparseConfig {
    fn default() -> Self {
        Self {
            vocab_size: 30522,
            max_nonzeros: 256,
            wand_block_size: 128,
            use_wand: true,
        }
    }
}

/// Point-in-time counters for an index, per the glossary's `get_stats`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LearnedSparseStats {
    pub doc_count: u64,
    pub active_docs: u64,
    pub total_postings: u64,
}

struct Inner {
    postings: Vec<PostingList>,
    doc_meta: Vec<DocMeta>,
    total_postings: u64,
}

/// A learned-sparse inverted index over a fixed vocabulary.
pub struct LearnedSparseIndex {
    config: LearnedSparseConfig,
    inner: RwLock<Inner>,
}

impl LearnedSparseIndex {
    /// Create an empty index.
    pub fn new(config: LearnedSparseConfig) -> Self {
        let vocab = config.vocab_size as usize;
        let block_size = config.wand_block_size;
        let postings = (0..vocab).map(|_| PostingList::new(block_size)).collect();
        Self {
            config,
            inner: RwLock::new(Inner {
                postings,
                doc_meta: Vec::new(),
                total_postings: 0,
            }),
        }
    }

    /// Insert a document's non-zero entries, returning its assigned
    /// `doc_id`. Entries with `token_id >= vocab_size` or `weight <= 0`
    /// are dropped silently. Returns [`Error::InvalidArgument`] if more
    /// than `max_nonzeros` entries survive filtering.
    ///
    /// If appending postings fails partway through (allocation failure),
    /// the document's `doc_id` is never bumped into existence: the
    /// orphaned postings already appended reference a `doc_id` that is
    /// `>= doc_count` and so can never be scored or deleted, and
    /// [`Error::OutOfMemory`] is returned.
    #[instrument(skip(self, entries))]
    pub fn insert(&self, entries: &[SparseEntry]) -> Result<u64> {
        let kept: Vec<SparseEntry> = entries
            .iter()
            .copied()
            .filter(|e| e.weight > 0.0 && e.token_id < self.config.vocab_size)
            .collect();
        if kept.len() > self.config.max_nonzeros {
            return Err(Error::InvalidArgument(format!(
                "document has {} non-zero entries, exceeds max_nonzeros {}",
                kept.len(),
                self.config.max_nonzeros
            )));
        }

        let mut inner = self.inner.write();
        let doc_id = inner.doc_meta.len() as u64;

        for entry in &kept {
            inner.postings[entry.token_id as usize].push(doc_id, entry.weight)?;
        }

        inner
            .doc_meta
            .try_reserve(1)
            .map_err(|_| Error::OutOfMemory)?;
        inner.doc_meta.push(DocMeta {
            entry_count: kept.len(),
            deleted: false,
        });
        inner.total_postings += kept.len() as u64;

        trace!(doc_id, entries = kept.len(), "inserted sparse document");
        Ok(doc_id)
    }

    /// Soft-delete `doc_id`. Returns [`Error::NotFound`] if the id was
    /// never assigned or has already been deleted.
    pub fn delete(&self, doc_id: u64) -> Result<()> {
        let mut inner = self.inner.write();
        match inner.doc_meta.get_mut(doc_id as usize) {
            Some(meta) if !meta.deleted => {
                meta.deleted = true;
                Ok(())
            }
            _ => Err(Error::NotFound { id: doc_id }),
        }
    }

    /// Search for the top `k` documents by dot-product score against
    /// `query`, with no score floor.
    pub fn search(&self, query: &[SparseEntry], k: usize) -> Result<Vec<(u64, f32)>> {
        self.search_with_threshold(query, k, f32::NEG_INFINITY)
    }

    /// Search for the top `k` documents with `score >= min_score`.
    /// Returns [`Error::InvalidArgument`] if `k == 0`. An empty `query`
    /// (after filtering) returns an empty result, not an error.
    #[instrument(skip(self, query))]
    pub fn search_with_threshold(
        &self,
        query: &[SparseEntry],
        k: usize,
        min_score: f32,
    ) -> Result<Vec<(u64, f32)>> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be > 0".into()));
        }

        let terms: Vec<(u32, f32)> = query
            .iter()
            .filter(|e| e.weight != 0.0 && e.token_id < self.config.vocab_size)
            .map(|e| (e.token_id, e.weight))
            .collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let inner = self.inner.read();

        let results = if self.config.use_wand {
            let cursors = terms.iter().filter_map(|&(token_id, weight)| {
                let list = &inner.postings[token_id as usize];
                if list.is_empty() {
                    None
                } else {
                    Some((weight, list))
                }
            });
            wand::search(cursors, k, min_score, &inner.doc_meta)
        } else {
            self.search_accumulator(&terms, &inner, k, min_score)
        };

        trace!(results = results.len(), "sparse search complete");
        Ok(results)
    }

    fn search_accumulator(
        &self,
        terms: &[(u32, f32)],
        inner: &Inner,
        k: usize,
        min_score: f32,
    ) -> Vec<(u64, f32)> {
        let mut acc: FxHashMap<u64, f32> = FxHashMap::default();
        for &(token_id, weight) in terms {
            let list = &inner.postings[token_id as usize];
            for posting in list.postings() {
                let doc_id = posting.doc_id as usize;
                if doc_id >= inner.doc_meta.len() || inner.doc_meta[doc_id].deleted {
                    continue;
                }
                *acc.entry(posting.doc_id).or_insert(0.0) += weight * posting.weight;
            }
        }

        let mut heap = TopKHeap::new(k, Order::MaxIsBest);
        for (doc_id, score) in acc {
            if score >= min_score {
                heap.push(score, doc_id);
            }
        }
        heap.into_sorted_vec()
    }

    /// Recompute block-max arrays for every posting list from scratch.
    /// Exposed for maintenance after bulk loads; not required for
    /// correctness since `insert` maintains block-max incrementally.
    pub fn compact(&self) {
        let mut inner = self.inner.write();
        for list in &mut inner.postings {
            list.compact();
        }
    }

    /// Current point-in-time counters.
    pub fn get_stats(&self) -> LearnedSparseStats {
        let inner = self.inner.read();
        let active_docs = inner.doc_meta.iter().filter(|m| !m.deleted).count() as u64;
        LearnedSparseStats {
            doc_count: inner.doc_meta.len() as u64,
            active_docs,
            total_postings: inner.total_postings,
        }
    }

    /// The configuration this index was constructed with.
    pub fn config(&self) -> &LearnedSparseConfig {
        &self.config
    }

    /// Snapshot of per-document bookkeeping, for persistence save.
    pub(crate) fn doc_meta_snapshot(&self) -> Vec<DocMeta> {
        self.inner.read().doc_meta.clone()
    }

    /// Snapshot of every non-empty posting list as `(token_id,
    /// [(doc_id, weight)])`, for persistence save.
    pub(crate) fn postings_snapshot(&self) -> Vec<(u32, Vec<(u64, f32)>)> {
        let inner = self.inner.read();
        inner
            .postings
            .iter()
            .enumerate()
            .filter(|(_, list)| !list.is_empty())
            .map(|(token_id, list)| {
                let entries = list.postings().iter().map(|p| (p.doc_id, p.weight)).collect();
                (token_id as u32, entries)
            })
            .collect()
    }

    /// Rebuild an index from a loaded config, doc-meta table, and the
    /// set of non-empty posting lists, used by persistence load.
    pub(crate) fn from_parts(
        config: LearnedSparseConfig,
        doc_meta: Vec<DocMeta>,
        postings_data: Vec<(u32, Vec<(u64, f32)>)>,
    ) -> Result<Self> {
        let vocab = config.vocab_size as usize;
        let block_size = config.wand_block_size;
        let mut postings: Vec<PostingList> = (0..vocab).map(|_| PostingList::new(block_size)).collect();
        let mut total_postings = 0u64;
        for (token_id, entries) in postings_data {
            if token_id as usize >= vocab {
                return Err(Error::Corrupt(format!(
                    "posting list token_id {token_id} >= vocab_size {vocab}"
                )));
            }
            let list = &mut postings[token_id as usize];
            for (doc_id, weight) in entries {
                list.push(doc_id, weight)?;
                total_postings += 1;
            }
        }
        Ok(Self {
            config,
            inner: RwLock::new(Inner {
                postings,
                doc_meta,
                total_postings,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pairs: &[(u32, f32)]) -> Vec<SparseEntry> {
        pairs
            .iter()
            .map(|&(t, w)| SparseEntry::new(t, w))
            .collect()
    }

    #[test]
    fn accumulator_and_wand_agree_on_top_k() {
        let docs = [
            vec![(10u32, 1.0f32), (20, 0.5)],
            vec![(10, 0.2), (30, 0.9)],
            vec![(20, 2.0), (30, 0.1)],
        ];

        let mk = |use_wand| {
            let idx = LearnedSparseIndex::new(LearnedSparseConfig {
                vocab_size: 64,
                use_wand,
                wand_block_size: 2,
                ..Default::default()
            });
            for d in &docs {
                idx.insert(&entries(d)).unwrap();
            }
            idx
        };

        let wand_idx = mk(true);
        let acc_idx = mk(false);

        let query = entries(&[(10, 1.0), (20, 1.0), (30, 1.0)]);
        let wand_out = wand_idx.search(&query, 3).unwrap();
        let acc_out = acc_idx.search(&query, 3).unwrap();
        assert_eq!(wand_out, acc_out);
    }

    #[test]
    fn deleted_documents_are_excluded() {
        let idx = LearnedSparseIndex::new(LearnedSparseConfig {
            vocab_size: 8,
            ..Default::default()
        });
        let d0 = idx.insert(&entries(&[(0, 1.0)])).unwrap();
        idx.insert(&entries(&[(0, 1.0)])).unwrap();
        idx.delete(d0).unwrap();

        let out = idx.search(&entries(&[(0, 1.0)]), 10).unwrap();
        assert_eq!(out.len(), 1);
        assert_ne!(out[0].0, d0);
    }

    #[test]
    fn double_delete_is_not_found() {
        let idx = LearnedSparseIndex::new(LearnedSparseConfig::default());
        let d0 = idx.insert(&entries(&[(0, 1.0)])).unwrap();
        idx.delete(d0).unwrap();
        assert!(matches!(idx.delete(d0), Err(Error::NotFound { id }) if id == d0));
    }

    #[test]
    fn delete_unknown_doc_is_not_found() {
        let idx = LearnedSparseIndex::new(LearnedSparseConfig::default());
        assert!(matches!(idx.delete(42), Err(Error::NotFound { id: 42 })));
    }

    #[test]
    fn threshold_filters_low_scores() {
        let idx = LearnedSparseIndex::new(LearnedSparseConfig {
            vocab_size: 8,
            ..Default::default()
        });
        idx.insert(&entries(&[(0, 0.1)])).unwrap();
        idx.insert(&entries(&[(0, 5.0)])).unwrap();

        let out = idx
            .search_with_threshold(&entries(&[(0, 1.0)]), 10, 1.0)
            .unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].1 >= 1.0);
    }

    #[test]
    fn zero_k_is_invalid_argument() {
        let idx = LearnedSparseIndex::new(LearnedSparseConfig::default());
        assert!(matches!(
            idx.search(&entries(&[(0, 1.0)]), 0),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn empty_query_returns_empty() {
        let idx = LearnedSparseIndex::new(LearnedSparseConfig::default());
        idx.insert(&entries(&[(0, 1.0)])).unwrap();
        let out = idx.search(&[], 10).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn too_many_nonzeros_is_rejected() {
        let idx = LearnedSparseIndex::new(LearnedSparseConfig {
            vocab_size: 8,
            max_nonzeros: 1,
            ..Default::default()
        });
        let result = idx.insert(&entries(&[(0, 1.0), (1, 1.0)]));
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn stats_track_inserts_and_deletes() {
        let idx = LearnedSparseIndex::new(LearnedSparseConfig {
            vocab_size: 8,
            ..Default::default()
        });
        let d0 = idx.insert(&entries(&[(0, 1.0), (1, 1.0)])).unwrap();
        idx.insert(&entries(&[(0, 1.0)])).unwrap();
        idx.delete(d0).unwrap();

        let stats = idx.get_stats();
        assert_eq!(stats.doc_count, 2);
        assert_eq!(stats.active_docs, 1);
        assert_eq!(stats.total_postings, 3);
    }
}
