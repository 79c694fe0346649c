//! Block-Max WAND top-k traversal over a set of query-term cursors.

use crate::heap::{Order, TopKHeap};
use crate::sparse::posting::PostingList;
use crate::sparse::DocMeta;

/// A cursor into one query term's posting list: its query weight, the
/// per-term upper-bound contribution (`q_t * global_max_weight(term)`),
/// and the current read position.
struct Cursor<'a> {
    list: &'a PostingList,
    weight: f32,
    max_contribution: f32,
    pos: usize,
}

impl Cursor<'_> {
    fn doc(&self) -> u64 {
        self.list
            .postings()
            .get(self.pos)
            .map(|p| p.doc_id)
            .unwrap_or(u64::MAX)
    }

    fn exhausted(&self) -> bool {
        self.pos >= self.list.len()
    }

    fn current_weight(&self) -> f32 {
        self.list.postings()[self.pos].weight
    }

    fn advance_to(&mut self, target: u64) {
        self.pos = self.list.advance_to(self.pos, target);
    }

    fn advance_one(&mut self) {
        self.pos += 1;
    }
}

/// Run the Block-Max WAND traversal over `terms` (query weight + posting
/// list for every query token that has a non-empty list), returning up
/// to `k` `(doc_id, score)` pairs with `score >= min_score`, ordered by
/// descending score.
pub fn search<'a>(
    terms: impl IntoIterator<Item = (f32, &'a PostingList)>,
    k: usize,
    min_score: f32,
    doc_meta: &[DocMeta],
) -> Vec<(u64, f32)> {
    let mut cursors: Vec<Cursor> = terms
        .into_iter()
        .map(|(weight, list)| {
            let max_contribution = weight * list.global_max();
            Cursor {
                list,
                weight,
                max_contribution,
                pos: 0,
            }
        })
        .collect();

    let mut heap = TopKHeap::new(k, Order::MaxIsBest);

    loop {
        cursors.sort_by_key(|c| c.doc());
        if cursors.is_empty() || cursors[0].doc() == u64::MAX {
            break;
        }

        let theta = heap.worst_score().unwrap_or(min_score).max(min_score);

        let mut running = 0.0f32;
        let mut pivot = None;
        for (i, c) in cursors.iter().enumerate() {
            if c.exhausted() {
                break;
            }
            running += c.max_contribution;
            if running > theta {
                pivot = Some(i);
                break;
            }
        }
        let Some(pivot) = pivot else {
            break;
        };

        let d_star = cursors[pivot].doc();
        if cursors[0].doc() == d_star {
            // `pivot` only marks where the running max-contribution first
            // exceeds theta; cursors sharing `d_star` can extend past it,
            // since cursors are sorted by doc but not by contribution.
            // Every cursor in the contiguous `d_star` prefix must be
            // scored and advanced, not just `cursors[0..=pivot]`.
            let span = cursors.iter().take_while(|c| c.doc() == d_star).count();
            let active = (d_star as usize) < doc_meta.len() && !doc_meta[d_star as usize].deleted;
            if active {
                let score: f32 = cursors[0..span]
                    .iter()
                    .map(|c| c.weight * c.current_weight())
                    .sum();
                if score >= min_score {
                    heap.push(score, d_star);
                }
            }
            for c in cursors[0..span].iter_mut() {
                c.advance_one();
            }
        } else {
            for c in cursors.iter_mut() {
                if c.doc() < d_star {
                    c.advance_to(d_star);
                }
            }
        }
    }

    heap.into_sorted_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_from(pairs: &[(u64, f32)], block_size: usize) -> PostingList {
        let mut list = PostingList::new(block_size);
        for &(doc_id, weight) in pairs {
            list.push(doc_id, weight).unwrap();
        }
        list
    }

    #[test]
    fn scores_shared_terms_correctly() {
        // doc0 = [(10,1.0),(20,0.5)], doc1 = [(10,0.2),(30,0.9)]
        let list10 = list_from(&[(0, 1.0), (1, 0.2)], 4);
        let list20 = list_from(&[(0, 0.5)], 4);
        let meta = vec![DocMeta::default(); 2];

        let terms = vec![(1.0f32, &list10), (1.0f32, &list20)];
        let results = search(terms, 10, 0.0, &meta);
        assert_eq!(results[0], (0, 1.5));
    }

    #[test]
    fn skips_deleted_docs() {
        let list = list_from(&[(0, 1.0), (1, 1.0)], 4);
        let mut meta = vec![DocMeta::default(); 2];
        meta[0].deleted = true;
        let terms = vec![(1.0f32, &list)];
        let results = search(terms, 10, 0.0, &meta);
        assert_eq!(results, vec![(1, 1.0)]);
    }

    #[test]
    fn empty_terms_returns_empty() {
        let meta = vec![DocMeta::default(); 2];
        let results: Vec<(u64, f32)> = search(Vec::<(f32, &PostingList)>::new(), 10, 0.0, &meta);
        assert!(results.is_empty());
    }
}
