//! The `ColumnStore` collaborator: append-only dense-vector storage with a
//! metadata sidecar.
//!
//! This crate does not implement the production column store (that is an
//! external collaborator per the purpose/scope boundary); it specifies the
//! trait the LSH index consumes and ships a minimal in-memory
//! implementation so the index can be constructed and exercised
//! standalone, matching the Design Note that the LSH index may either own
//! a freshly-created store or borrow an externally supplied one.

use parking_lot::RwLock;

/// Ordered key-value metadata for one id. A `Vec` rather than a `HashMap`:
/// field counts per document are small, so linear lookup beats hashing
/// overhead, per the Design Note on "linked-list metadata in the source."
pub type MetaList = Vec<(String, String)>;

/// Append-only dense vector storage with soft delete and a metadata
/// sidecar, consumed by [`crate::lsh::LshIndex`].
pub trait ColumnStore: Send + Sync {
    /// Append `vector` (and its metadata) and return its assigned id.
    /// Ids are assigned in insertion order and never reused.
    fn add(&self, vector: Vec<f32>, metadata: MetaList) -> u64;

    /// Borrow the raw vector data for `id`.
    fn get_data(&self, id: u64) -> Option<Vec<f32>>;

    /// Borrow the metadata for `id`.
    fn get_metadata(&self, id: u64) -> Option<MetaList>;

    /// Logically delete `id`. Idempotent: deleting twice is a no-op at
    /// this layer (callers enforce the `NotFound`-on-second-delete
    /// contract at the index level, since the store itself has no
    /// notion of "already deleted is an error").
    fn mark_deleted(&self, id: u64);

    /// True if `id` has been soft-deleted.
    fn is_deleted(&self, id: u64) -> bool;

    /// Total number of ids ever assigned, including deleted ones.
    fn count(&self) -> usize;

    /// Overwrite the vector data for `id` in place (used by
    /// `LshIndex::update`). Does not change `id`'s metadata or deleted
    /// state.
    fn update_data(&self, id: u64, data: &[f32]);
}

#[derive(Debug, Clone)]
struct Row {
    data: Vec<f32>,
    metadata: MetaList,
    deleted: bool,
}

/// Minimal in-memory [`ColumnStore`], suitable for tests, prototyping,
/// and any deployment that does not need a dedicated storage engine.
#[derive(Default)]
pub struct InMemoryColumnStore {
    rows: RwLock<Vec<Row>>,
}

impl InMemoryColumnStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
        }
    }
}

impl ColumnStore for InMemoryColumnStore {
    fn add(&self, vector: Vec<f32>, metadata: MetaList) -> u64 {
        let mut rows = self.rows.write();
        let id = rows.len() as u64;
        rows.push(Row {
            data: vector,
            metadata,
            deleted: false,
        });
        id
    }

    fn get_data(&self, id: u64) -> Option<Vec<f32>> {
        self.rows.read().get(id as usize).map(|r| r.data.clone())
    }

    fn get_metadata(&self, id: u64) -> Option<MetaList> {
        self.rows
            .read()
            .get(id as usize)
            .map(|r| r.metadata.clone())
    }

    fn mark_deleted(&self, id: u64) {
        if let Some(row) = self.rows.write().get_mut(id as usize) {
            row.deleted = true;
        }
    }

    fn is_deleted(&self, id: u64) -> bool {
        self.rows
            .read()
            .get(id as usize)
            .map(|r| r.deleted)
            .unwrap_or(true)
    }

    fn count(&self) -> usize {
        self.rows.read().len()
    }

    fn update_data(&self, id: u64, data: &[f32]) {
        if let Some(row) = self.rows.write().get_mut(id as usize) {
            row.data = data.to_vec();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_assigned_in_order_and_never_reused() {
        let store = InMemoryColumnStore::new();
        let id0 = store.add(vec![1.0], vec![]);
        let id1 = store.add(vec![2.0], vec![]);
        assert_eq!(id0, 0);
        assert_eq!(id1, 1);
        store.mark_deleted(id0);
        let id2 = store.add(vec![3.0], vec![]);
        assert_eq!(id2, 2);
        assert!(store.is_deleted(id0));
        assert!(!store.is_deleted(id1));
    }

    #[test]
    fn metadata_round_trips() {
        let store = InMemoryColumnStore::new();
        let meta = vec![("category".to_string(), "even".to_string())];
        let id = store.add(vec![1.0, 2.0], meta.clone());
        assert_eq!(store.get_metadata(id), Some(meta));
    }

    #[test]
    fn update_data_overwrites_vector() {
        let store = InMemoryColumnStore::new();
        let id = store.add(vec![1.0, 2.0], vec![]);
        store.update_data(id, &[9.0, 9.0]);
        assert_eq!(store.get_data(id), Some(vec![9.0, 9.0]));
    }
}
