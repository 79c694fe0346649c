//! File format for [`crate::sparse::LearnedSparseIndex`] (§6, "Learned-sparse
//! index file format").

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use crate::sparse::{DocMeta, LearnedSparseConfig, LearnedSparseIndex};

const MAGIC: &[u8; 7] = b"GV_LSPA";
const VERSION: u32 = 1;

/// Write `index` to `writer` in the format documented in §6, followed by
/// a trailing CRC32 of everything written before it (the same
/// write-body-then-checksum-footer shape the teacher's WAL and segment
/// footers use, kept outside the documented field list so the spec's
/// byte layout stays exact).
pub fn save_sparse<W: Write>(index: &LearnedSparseIndex, writer: &mut W) -> Result<()> {
    let mut body = Vec::new();
    body.write_all(MAGIC)?;
    body.write_u32::<LittleEndian>(VERSION)?;

    let config = index.config();
    body.write_u64::<LittleEndian>(config.vocab_size as u64)?;
    body.write_u64::<LittleEndian>(config.max_nonzeros as u64)?;
    body.write_u32::<LittleEndian>(config.use_wand as u32)?;
    body.write_u64::<LittleEndian>(config.wand_block_size as u64)?;

    let doc_meta = index.doc_meta_snapshot();
    body.write_u64::<LittleEndian>(doc_meta.len() as u64)?;
    for meta in &doc_meta {
        body.write_u64::<LittleEndian>(meta.entry_count as u64)?;
        body.write_u32::<LittleEndian>(meta.deleted as u32)?;
    }

    let postings = index.postings_snapshot();
    body.write_u64::<LittleEndian>(postings.len() as u64)?;
    for (token_id, entries) in &postings {
        body.write_u32::<LittleEndian>(*token_id)?;
        body.write_u64::<LittleEndian>(entries.len() as u64)?;
        for &(doc_id, weight) in entries {
            body.write_u64::<LittleEndian>(doc_id)?;
            body.write_f32::<LittleEndian>(weight)?;
        }
    }

    let checksum = crc32fast::hash(&body);
    writer.write_all(&body)?;
    writer.write_u32::<LittleEndian>(checksum)?;
    Ok(())
}

/// Read a [`LearnedSparseIndex`] back from `reader`, validating the
/// trailing checksum, the magic, the version, and every field that the
/// index's own invariants constrain (e.g. `token_id < vocab_size`).
pub fn load_sparse<R: Read>(reader: &mut R) -> Result<LearnedSparseIndex> {
    let mut body = Vec::new();
    reader.read_to_end(&mut body)?;
    if body.len() < 4 {
        return Err(Error::Corrupt("file too short for checksum footer".into()));
    }
    let split = body.len() - 4;
    let stored_checksum = u32::from_le_bytes(body[split..].try_into().unwrap());
    let body = &body[..split];
    if crc32fast::hash(body) != stored_checksum {
        return Err(Error::Corrupt("checksum mismatch".into()));
    }
    let reader = &mut &body[..];

    let mut magic = [0u8; 7];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(Error::Corrupt("bad magic for learned-sparse index".into()));
    }
    let version = reader.read_u32::<LittleEndian>()?;
    if version != VERSION {
        return Err(Error::Corrupt(format!(
            "unsupported learned-sparse version {version}"
        )));
    }

    let vocab_size = reader.read_u64::<LittleEndian>()?;
    let max_nonzeros = reader.read_u64::<LittleEndian>()? as usize;
    let use_wand = reader.read_u32::<LittleEndian>()? != 0;
    let wand_block_size = reader.read_u64::<LittleEndian>()? as usize;
    if vocab_size > u32::MAX as u64 {
        return Err(Error::Corrupt("vocab_size exceeds u32 range".into()));
    }
    let config = LearnedSparseConfig {
        vocab_size: vocab_size as u32,
        max_nonzeros,
        wand_block_size,
        use_wand,
    };

    let doc_count = reader.read_u64::<LittleEndian>()?;
    let mut doc_meta = Vec::with_capacity(doc_count as usize);
    for _ in 0..doc_count {
        let entry_count = reader.read_u64::<LittleEndian>()? as usize;
        let deleted = reader.read_u32::<LittleEndian>()? != 0;
        doc_meta.push(DocMeta {
            entry_count,
            deleted,
        });
    }

    let list_count = reader.read_u64::<LittleEndian>()?;
    let mut postings = Vec::with_capacity(list_count as usize);
    for _ in 0..list_count {
        let token_id = reader.read_u32::<LittleEndian>()?;
        if token_id as u64 >= vocab_size {
            return Err(Error::Corrupt(format!(
                "posting list token_id {token_id} >= vocab_size {vocab_size}"
            )));
        }
        let posting_count = reader.read_u64::<LittleEndian>()?;
        let mut entries = Vec::with_capacity(posting_count as usize);
        for _ in 0..posting_count {
            let doc_id = reader.read_u64::<LittleEndian>()?;
            if doc_id >= doc_count {
                return Err(Error::Corrupt(format!(
                    "posting doc_id {doc_id} >= doc_count {doc_count}"
                )));
            }
            let weight = reader.read_f32::<LittleEndian>()?;
            entries.push((doc_id, weight));
        }
        postings.push((token_id, entries));
    }

    LearnedSparseIndex::from_parts(config, doc_meta, postings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::SparseEntry;

    #[test]
    fn round_trips_inserts_and_deletes() {
        let idx = LearnedSparseIndex::new(LearnedSparseConfig {
            vocab_size: 64,
            ..Default::default()
        });
        let entries = |pairs: &[(u32, f32)]| -> Vec<SparseEntry> {
            pairs.iter().map(|&(t, w)| SparseEntry::new(t, w)).collect()
        };
        idx.insert(&entries(&[(10, 1.0), (20, 0.5)])).unwrap();
        let d1 = idx.insert(&entries(&[(10, 0.2), (30, 0.9)])).unwrap();
        idx.insert(&entries(&[(40, 0.7)])).unwrap();
        idx.delete(d1).unwrap();

        let mut buf = Vec::new();
        save_sparse(&idx, &mut buf).unwrap();
        let loaded = load_sparse(&mut &buf[..]).unwrap();

        let query = entries(&[(10, 1.0), (20, 1.0)]);
        assert_eq!(
            idx.search(&query, 10).unwrap(),
            loaded.search(&query, 10).unwrap()
        );
        assert_eq!(idx.get_stats().doc_count, loaded.get_stats().doc_count);
        assert_eq!(
            idx.get_stats().active_docs,
            loaded.get_stats().active_docs
        );
    }

    #[test]
    fn bad_magic_is_corrupt() {
        let buf = vec![0u8; 32];
        assert!(matches!(
            load_sparse(&mut &buf[..]),
            Err(Error::Corrupt(_))
        ));
    }

    #[test]
    fn truncated_file_is_io_error() {
        let idx = LearnedSparseIndex::new(LearnedSparseConfig {
            vocab_size: 8,
            ..Default::default()
        });
        idx.insert(&[SparseEntry::new(0, 1.0)]).unwrap();
        let mut buf = Vec::new();
        save_sparse(&idx, &mut buf).unwrap();
        buf.truncate(buf.len() - 4);
        assert!(load_sparse(&mut &buf[..]).is_err());
    }
}
