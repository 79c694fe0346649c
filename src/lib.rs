//! Core retrieval engine for a vector database: a learned-sparse inverted
//! index with Block-Max WAND top-k, a multi-table locality-sensitive-hash
//! index over dense vectors, and a quantization codec (binary, ternary,
//! and 2/4/8-bit scalar, with optional RaBitQ rotation).
//!
//! # Scope
//!
//! This crate is the core retrieval engine only. The HTTP front-end, rate
//! limiter, schema validator, BM25 text index, CDC event stream, and
//! LLM-backed auto-embedding layer that would sit on top of it are
//! external collaborators, not part of this crate. The [`ColumnStore`]
//! trait is the one storage contract the core consumes; the in-memory
//! implementation shipped here ([`InMemoryColumnStore`]) is a reference
//! collaborator, not a production store.
//!
//! # Modules
//!
//! - [`sparse`]: the learned-sparse inverted index (accumulator and
//!   Block-Max WAND scoring).
//! - [`lsh`]: the locality-sensitive-hash index over dense vectors.
//! - [`quant`]: the quantization codec (encode/decode/distance).
//! - [`persistence`]: bit-exact file formats for all three indexes.
//! - [`metric`]: the pure distance/similarity functions the LSH index and
//!   the quantization codec both build on.
//! - [`column_store`]: the storage collaborator contract.
//! - [`heap`]: the bounded top-k min-heap shared by every search path.
//! - [`error`]: the crate-wide error and result types.
//!
//! # Concurrency
//!
//! Each index type owns a single reader-writer lock ([`parking_lot::RwLock`]):
//! search/stats/save take the shared lock, insert/delete/update take the
//! exclusive lock. A writer's effects are atomic from a reader's
//! perspective; there is no cross-index ordering guarantee.

pub mod column_store;
pub mod error;
pub mod heap;
pub mod lsh;
pub mod metric;
pub mod persistence;
pub mod quant;
mod rng;
mod simd;
pub mod sparse;

pub use column_store::{ColumnStore, InMemoryColumnStore, MetaList};
pub use error::{Error, Result};
pub use heap::{Order, TopKHeap};
pub use lsh::{HyperplaneBank, LshConfig, LshIndex, MetadataFilter};
pub use metric::{metric, MetricKind};
pub use quant::{QuantCodebook, QuantConfig, QuantMode, QuantType};
pub use sparse::{
    DocMeta, LearnedSparseConfig, LearnedSparseIndex, LearnedSparseStats, Posting, PostingList,
    SparseEntry,
};
