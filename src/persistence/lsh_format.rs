//! File format for [`crate::lsh::LshIndex`] (§6, "LSH index file format").
//!
//! The spec's literal field list omits an explicit dimension, relying on
//! the caller already knowing `D` from how the index was constructed.
//! A self-describing file needs it to size every fixed-width array while
//! reading, so it is written as an extra `u64` right after a magic +
//! version header (the same shape the sparse and quant formats already
//! use, and consistent with `Corrupt` covering "magic mismatch, version
//! mismatch" generically for any loaded file).

use std::io::{Read, Write};
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::column_store::{ColumnStore, InMemoryColumnStore};
use crate::error::{Error, Result};
use crate::lsh::{HyperplaneBank, LshConfig, LshIndex};

const MAGIC: &[u8; 7] = b"GV_LSH1";
const VERSION: u32 = 1;

/// Write `index` to `writer`: header, flattened hyperplane bank, then
/// every vector's data, metadata, and deleted flag in id order.
pub fn save_lsh<W: Write>(index: &LshIndex, writer: &mut W) -> Result<()> {
    let mut body = Vec::new();
    body.write_all(MAGIC)?;
    body.write_u32::<LittleEndian>(VERSION)?;
    body.write_u64::<LittleEndian>(index.dimension() as u64)?;

    let config = index.config();
    body.write_u64::<LittleEndian>(config.num_tables as u64)?;
    body.write_u64::<LittleEndian>(config.num_hash_bits as u64)?;
    body.write_u64::<LittleEndian>(config.seed)?;

    for &v in index.hyperplanes().raw() {
        body.write_f32::<LittleEndian>(v)?;
    }

    let store = index.column_store();
    let count = store.count();
    body.write_u64::<LittleEndian>(count as u64)?;
    for id in 0..count as u64 {
        let data = store.get_data(id).ok_or_else(|| {
            Error::Corrupt(format!("missing vector data for live id {id}"))
        })?;
        for &x in &data {
            body.write_f32::<LittleEndian>(x)?;
        }
        let metadata = store.get_metadata(id).unwrap_or_default();
        body.write_u32::<LittleEndian>(metadata.len() as u32)?;
        for (key, value) in &metadata {
            body.write_u32::<LittleEndian>(key.len() as u32)?;
            body.write_all(key.as_bytes())?;
            body.write_u32::<LittleEndian>(value.len() as u32)?;
            body.write_all(value.as_bytes())?;
        }
        body.write_u32::<LittleEndian>(store.is_deleted(id) as u32)?;
    }

    let checksum = crc32fast::hash(&body);
    writer.write_all(&body)?;
    writer.write_u32::<LittleEndian>(checksum)?;
    Ok(())
}

/// Read an [`LshIndex`] back from `reader`, validating the trailing
/// checksum first. The hyperplane bank is read verbatim rather than
/// regenerated from the seed (matching the persisted-not-rederived
/// design for the RaBitQ rotation matrix), and an owned in-memory store
/// is repopulated in id order before buckets are rehashed from the
/// restored vectors.
pub fn load_lsh<R: Read>(reader: &mut R) -> Result<LshIndex> {
    let mut whole = Vec::new();
    reader.read_to_end(&mut whole)?;
    if whole.len() < 4 {
        return Err(Error::Corrupt("file too short for checksum footer".into()));
    }
    let split = whole.len() - 4;
    let stored_checksum = u32::from_le_bytes(whole[split..].try_into().unwrap());
    let body = &whole[..split];
    if crc32fast::hash(body) != stored_checksum {
        return Err(Error::Corrupt("checksum mismatch".into()));
    }
    let reader = &mut &body[..];

    let mut magic = [0u8; 7];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(Error::Corrupt("bad magic for LSH index".into()));
    }
    let version = reader.read_u32::<LittleEndian>()?;
    if version != VERSION {
        return Err(Error::Corrupt(format!("unsupported LSH version {version}")));
    }

    let dimension = reader.read_u64::<LittleEndian>()? as usize;
    if dimension == 0 {
        return Err(Error::Corrupt("dimension must be > 0".into()));
    }
    let num_tables = reader.read_u64::<LittleEndian>()? as usize;
    let num_hash_bits = reader.read_u64::<LittleEndian>()? as usize;
    let seed = reader.read_u64::<LittleEndian>()?;
    let config = LshConfig {
        num_tables,
        num_hash_bits,
        seed,
    };

    let plane_count = num_tables
        .checked_mul(num_hash_bits)
        .and_then(|n| n.checked_mul(dimension))
        .ok_or_else(|| Error::Corrupt("hyperplane bank size overflow".into()))?;
    let mut planes = Vec::with_capacity(plane_count);
    for _ in 0..plane_count {
        planes.push(reader.read_f32::<LittleEndian>()?);
    }
    let hyperplanes = HyperplaneBank::from_raw(dimension, num_tables, num_hash_bits, planes);

    let vector_count = reader.read_u64::<LittleEndian>()?;
    let store = InMemoryColumnStore::new();
    let mut deleted_ids = Vec::new();
    for id in 0..vector_count {
        let mut data = Vec::with_capacity(dimension);
        for _ in 0..dimension {
            data.push(reader.read_f32::<LittleEndian>()?);
        }
        let metadata_count = reader.read_u32::<LittleEndian>()?;
        let mut metadata = Vec::with_capacity(metadata_count as usize);
        for _ in 0..metadata_count {
            let key_len = reader.read_u32::<LittleEndian>()? as usize;
            let mut key_bytes = vec![0u8; key_len];
            reader.read_exact(&mut key_bytes)?;
            let key = String::from_utf8(key_bytes)
                .map_err(|_| Error::Corrupt("metadata key is not valid UTF-8".into()))?;
            let val_len = reader.read_u32::<LittleEndian>()? as usize;
            let mut val_bytes = vec![0u8; val_len];
            reader.read_exact(&mut val_bytes)?;
            let value = String::from_utf8(val_bytes)
                .map_err(|_| Error::Corrupt("metadata value is not valid UTF-8".into()))?;
            metadata.push((key, value));
        }
        let deleted = reader.read_u32::<LittleEndian>()? != 0;

        let assigned = store.add(data, metadata);
        if assigned != id {
            return Err(Error::Corrupt(format!(
                "vector {id} loaded out of order (assigned id {assigned})"
            )));
        }
        if deleted {
            deleted_ids.push(assigned);
        }
    }

    let storage: Arc<dyn ColumnStore> = Arc::new(store);
    let index = LshIndex::with_hyperplanes(dimension, config, hyperplanes, Some(storage));
    for id in deleted_ids {
        index.column_store().mark_deleted(id);
    }
    index.rebuild_buckets_from_store();
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::MetricKind;

    fn deterministic_vector(i: usize, d: usize) -> Vec<f32> {
        (0..d).map(|j| ((i * 31 + j * 7) % 11) as f32 - 5.0).collect()
    }

    #[test]
    fn round_trips_search_results() {
        let idx = LshIndex::create(8, LshConfig::default(), None);
        for i in 0..10 {
            idx.insert(deterministic_vector(i, 8)).unwrap();
        }

        let mut buf = Vec::new();
        save_lsh(&idx, &mut buf).unwrap();
        let loaded = load_lsh(&mut &buf[..]).unwrap();

        let query = vec![0.01f32; 8];
        let before = idx.search(&query, 5, MetricKind::Euclidean, None).unwrap();
        let after = loaded.search(&query, 5, MetricKind::Euclidean, None).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn round_trips_metadata_and_deletes() {
        let idx = LshIndex::create(4, LshConfig::default(), None);
        let mut ids = Vec::new();
        for i in 0..10 {
            let category = if i % 2 == 0 { "even" } else { "odd" };
            ids.push(
                idx.insert_with_metadata(
                    deterministic_vector(i, 4),
                    vec![("category".to_string(), category.to_string())],
                )
                .unwrap(),
            );
        }
        idx.delete(ids[2]).unwrap();

        let mut buf = Vec::new();
        save_lsh(&idx, &mut buf).unwrap();
        let loaded = load_lsh(&mut &buf[..]).unwrap();

        assert!(loaded.column_store().is_deleted(ids[2]));
        let results = loaded
            .search(
                &deterministic_vector(0, 4),
                10,
                MetricKind::Euclidean,
                Some(("category", "even")),
            )
            .unwrap();
        assert!(!results.iter().any(|&(id, _)| id == ids[2]));
    }

    #[test]
    fn bad_magic_is_corrupt() {
        let buf = vec![0u8; 32];
        assert!(matches!(load_lsh(&mut &buf[..]), Err(Error::Corrupt(_))));
    }
}
