//! Learned sparse inverted index: fixed-vocabulary posting lists scored
//! by either a plain accumulator or Block-Max WAND top-k traversal.

mod entry;
mod index;
mod posting;
mod wand;

pub use entry::SparseEntry;
pub use index::{DocMeta, LearnedSparseConfig, LearnedSparseIndex, LearnedSparseStats};
pub use posting::{Posting, PostingList};
