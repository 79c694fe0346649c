//! Multi-table LSH index over dense vectors: bucket insertion, soft
//! delete, rehash-on-update, and bounded top-k / range search with
//! optional metadata filtering.

use std::cmp::Ordering;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{instrument, trace};

use crate::column_store::{ColumnStore, InMemoryColumnStore, MetaList};
use crate::error::{Error, Result};
use crate::heap::{Order, TopKHeap};
use crate::lsh::hyperplane::HyperplaneBank;
use crate::metric::{self, MetricKind};

/// Tunables fixed at index construction.
#[derive(Debug, Clone)]
pub struct LshConfig {
    /// Number `L` of independent hash tables.
    pub num_tables: usize,
    /// Hash bits per table; `num_buckets = min(2^num_hash_bits, 65536)`.
    pub num_hash_bits: usize,
    /// Seed for hyperplane bank generation.
    pub seed: u64,
}

impl Default for LshConfig {
    fn default() -> Self {
        Self {
            num_tables: 8,
            num_hash_bits: 16,
            seed: 42,
        }
    }
}

/// Whether the index owns its [`ColumnStore`] (dropped with the index)
/// or merely borrows a shared, externally owned one.
enum Storage {
    Owned(Box<dyn ColumnStore>),
    Borrowed(Arc<dyn ColumnStore>),
}

impl Storage {
    fn get(&self) -> &dyn ColumnStore {
        match self {
            Storage::Owned(s) => s.as_ref(),
            Storage::Borrowed(s) => s.as_ref(),
        }
    }
}

/// An exact-match metadata predicate: keep only candidates whose
/// metadata contains `(key, value)`.
pub type MetadataFilter<'a> = Option<(&'a str, &'a str)>;

/// A multi-table locality-sensitive hash index over fixed-dimension
/// dense vectors.
pub struct LshIndex {
    dimension: usize,
    config: LshConfig,
    num_buckets: usize,
    hyperplanes: HyperplaneBank,
    storage: Storage,
    buckets: RwLock<Vec<Vec<Vec<u64>>>>,
}

impl LshIndex {
    /// Create an index with a freshly generated hyperplane bank. If
    /// `storage` is `None`, an owned [`InMemoryColumnStore`] is
    /// constructed; otherwise the supplied store is borrowed.
    pub fn create(dimension: usize, config: LshConfig, storage: Option<Arc<dyn ColumnStore>>) -> Self {
        let hyperplanes =
            HyperplaneBank::generate(dimension, config.num_tables, config.num_hash_bits, config.seed);
        Self::with_hyperplanes(dimension, config, hyperplanes, storage)
    }

    /// Construct from a pre-built hyperplane bank (used by persistence
    /// load, which reads the bank's raw planes directly from the file
    /// rather than re-deriving them from the seed).
    pub(crate) fn with_hyperplanes(
        dimension: usize,
        config: LshConfig,
        hyperplanes: HyperplaneBank,
        storage: Option<Arc<dyn ColumnStore>>,
    ) -> Self {
        let num_buckets = (1u64 << config.num_hash_bits.min(63)).min(65536) as usize;
        let buckets = vec![vec![Vec::new(); num_buckets]; config.num_tables];
        let storage = match storage {
            Some(s) => Storage::Borrowed(s),
            None => Storage::Owned(Box::new(InMemoryColumnStore::new())),
        };
        Self {
            dimension,
            config,
            num_buckets,
            hyperplanes,
            storage,
            buckets: RwLock::new(buckets),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn config(&self) -> &LshConfig {
        &self.config
    }

    pub(crate) fn hyperplanes(&self) -> &HyperplaneBank {
        &self.hyperplanes
    }

    fn store(&self) -> &dyn ColumnStore {
        self.storage.get()
    }

    /// Read-only access to the backing store, for callers that own (or
    /// share) it and need to resolve ids to vectors/metadata directly.
    pub fn column_store(&self) -> &dyn ColumnStore {
        self.store()
    }

    /// Hash every id currently in the store into its buckets. Used by
    /// [`crate::persistence::load_lsh`] after the store has been
    /// repopulated from a file: bucket contents are not themselves
    /// persisted, only the raw vectors are, so they are rederived here
    /// rather than serialized redundantly.
    pub(crate) fn rebuild_buckets_from_store(&self) {
        let count = self.store().count();
        let mut buckets = self.buckets.write();
        for id in 0..count as u64 {
            let Some(data) = self.store().get_data(id) else {
                continue;
            };
            let buckets_for = self.hash_all_tables(&data);
            for (t, &b) in buckets_for.iter().enumerate() {
                buckets[t][b].push(id);
            }
        }
    }

    fn hash_all_tables(&self, vector: &[f32]) -> Vec<usize> {
        (0..self.config.num_tables)
            .map(|t| (self.hyperplanes.hash(t, vector) as usize) % self.num_buckets)
            .collect()
    }

    fn check_dimension(&self, v: &[f32]) -> Result<()> {
        if v.len() != self.dimension {
            return Err(Error::InvalidArgument(format!(
                "vector has length {}, expected {}",
                v.len(),
                self.dimension
            )));
        }
        Ok(())
    }

    /// Insert `vector` with no metadata. Returns the assigned id.
    pub fn insert(&self, vector: Vec<f32>) -> Result<u64> {
        self.insert_with_metadata(vector, Vec::new())
    }

    /// Insert `vector` with `metadata`, hashing it into every table's
    /// bucket. Bucket-capacity reservation happens before the store is
    /// touched, so an allocation failure never leaves a vector stored
    /// without a matching bucket entry.
    #[instrument(skip(self, vector, metadata))]
    pub fn insert_with_metadata(&self, vector: Vec<f32>, metadata: MetaList) -> Result<u64> {
        self.check_dimension(&vector)?;
        let buckets_for = self.hash_all_tables(&vector);

        let mut buckets = self.buckets.write();
        for (t, &b) in buckets_for.iter().enumerate() {
            buckets[t][b].try_reserve(1).map_err(|_| Error::OutOfMemory)?;
        }

        let id = self.store().add(vector, metadata);
        for (t, &b) in buckets_for.iter().enumerate() {
            buckets[t][b].push(id);
        }
        trace!(id, "inserted lsh vector");
        Ok(id)
    }

    /// Soft-delete `id`. Buckets are left stale; search filters deleted
    /// ids at scan time. Returns [`Error::NotFound`] if `id` was never
    /// assigned or is already deleted.
    pub fn delete(&self, id: u64) -> Result<()> {
        if id as usize >= self.store().count() || self.store().is_deleted(id) {
            return Err(Error::NotFound { id });
        }
        self.store().mark_deleted(id);
        trace!(id, "deleted lsh vector");
        Ok(())
    }

    /// Rehash `id` from its current vector to `new_data`: removes it
    /// from every bucket computed under the old vector, writes the new
    /// vector, then appends it to the buckets computed under the new
    /// vector. Rejects deleted or unknown ids.
    #[instrument(skip(self, new_data))]
    pub fn update(&self, id: u64, new_data: Vec<f32>) -> Result<()> {
        self.check_dimension(&new_data)?;
        if self.store().is_deleted(id) {
            return Err(Error::NotFound { id });
        }
        let old_vector = self.store().get_data(id).ok_or(Error::NotFound { id })?;

        let old_buckets_for = self.hash_all_tables(&old_vector);
        let new_buckets_for = self.hash_all_tables(&new_data);

        let mut buckets = self.buckets.write();
        for (t, &b) in new_buckets_for.iter().enumerate() {
            buckets[t][b].try_reserve(1).map_err(|_| Error::OutOfMemory)?;
        }

        for (t, &b) in old_buckets_for.iter().enumerate() {
            if let Some(pos) = buckets[t][b].iter().position(|&x| x == id) {
                buckets[t][b].swap_remove(pos);
            }
        }

        self.store().update_data(id, &new_data);

        for (t, &b) in new_buckets_for.iter().enumerate() {
            buckets[t][b].push(id);
        }
        trace!(id, "rehashed lsh vector after update");
        Ok(())
    }

    /// Union the buckets `query` hashes into across every table,
    /// deduplicated via a visited bitmap, filtered to non-deleted ids
    /// that satisfy `filter` if present.
    fn candidates(&self, query: &[f32], filter: MetadataFilter) -> Result<Vec<u64>> {
        let buckets = self.buckets.read();
        let count = self.store().count();
        let mut visited: Vec<bool> = Vec::new();
        visited.try_reserve(count).map_err(|_| Error::OutOfMemory)?;
        visited.resize(count, false);

        let mut candidates = Vec::new();
        for t in 0..self.config.num_tables {
            let bucket_idx = (self.hyperplanes.hash(t, query) as usize) % self.num_buckets;
            for &id in &buckets[t][bucket_idx] {
                let idx = id as usize;
                if idx >= visited.len() || visited[idx] {
                    continue;
                }
                visited[idx] = true;
                if self.store().is_deleted(id) {
                    continue;
                }
                if let Some((key, value)) = filter {
                    let matches = self
                        .store()
                        .get_metadata(id)
                        .map(|meta| meta.iter().any(|(k, v)| k == key && v == value))
                        .unwrap_or(false);
                    if !matches {
                        continue;
                    }
                }
                candidates.try_reserve(1).map_err(|_| Error::OutOfMemory)?;
                candidates.push(id);
            }
        }
        Ok(candidates)
    }

    /// Top-`k` nearest neighbors of `query` under `metric_kind`, with an
    /// optional exact-match metadata filter. Returns pairs sorted
    /// ascending by distance. Returns [`Error::InvalidArgument`] if
    /// `k == 0` or `query`'s dimension does not match the index.
    #[instrument(skip(self, query))]
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        metric_kind: MetricKind,
        filter: MetadataFilter,
    ) -> Result<Vec<(u64, f32)>> {
        self.check_dimension(query)?;
        if k == 0 {
            return Err(Error::InvalidArgument("k must be > 0".into()));
        }

        let ids = self.candidates(query, filter)?;
        let mut heap = TopKHeap::new(k, Order::MinIsBest);
        for id in ids {
            if let Some(data) = self.store().get_data(id) {
                let distance = metric::metric(query, &data, metric_kind);
                heap.push(distance, id);
            }
        }
        Ok(heap.into_sorted_vec())
    }

    /// Every candidate within `radius` of `query`, up to `max` results,
    /// sorted ascending by distance.
    #[instrument(skip(self, query))]
    pub fn range_search(
        &self,
        query: &[f32],
        radius: f32,
        max: usize,
        metric_kind: MetricKind,
        filter: MetadataFilter,
    ) -> Result<Vec<(u64, f32)>> {
        self.check_dimension(query)?;

        let ids = self.candidates(query, filter)?;
        let mut results: Vec<(u64, f32)> = Vec::new();
        for id in ids {
            if let Some(data) = self.store().get_data(id) {
                let distance = metric::metric(query, &data, metric_kind);
                if distance <= radius {
                    results
                        .try_reserve(1)
                        .map_err(|_| Error::OutOfMemory)?;
                    results.push((id, distance));
                }
            }
        }
        results.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        results.truncate(max);
        Ok(results)
    }
}
