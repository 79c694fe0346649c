//! Locality-sensitive hash index over dense vectors: signed random
//! hyperplane projections, multi-table bucket storage, and top-k /
//! range search with metadata filtering.

mod hyperplane;
mod index;

pub use hyperplane::HyperplaneBank;
pub use index::{LshConfig, LshIndex, MetadataFilter};
