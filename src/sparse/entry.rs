//! The sparse entry data model: `(token_id, weight)` pairs making up a
//! learned-sparse document or query.

/// One non-zero term in a learned-sparse document or query.
///
/// `token_id` indexes into the index's fixed vocabulary; `weight` is
/// expected to be non-negative (entries with `weight <= 0` are silently
/// dropped by [`crate::sparse::LearnedSparseIndex::insert`] and ignored
/// by search, per the spec's edge-case policy).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SparseEntry {
    /// Vocabulary index of this term.
    pub token_id: u32,
    /// Term weight (learned sparse activation).
    pub weight: f32,
}

impl SparseEntry {
    /// Construct a new entry.
    pub fn new(token_id: u32, weight: f32) -> Self {
        Self { token_id, weight }
    }
}
