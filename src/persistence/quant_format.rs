//! File format for [`crate::quant::QuantCodebook`] (§6, "Quant codebook
//! file format").

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use crate::quant::{QuantCodebook, QuantMode, QuantType};

const MAGIC: &[u8; 4] = b"GVQT";
const VERSION: u32 = 1;

fn type_tag(t: QuantType) -> u32 {
    match t {
        QuantType::Binary => 0,
        QuantType::Ternary => 1,
        QuantType::Scalar2 => 2,
        QuantType::Scalar4 => 3,
        QuantType::Scalar8 => 4,
    }
}

fn type_from_tag(tag: u32) -> Result<QuantType> {
    match tag {
        0 => Ok(QuantType::Binary),
        1 => Ok(QuantType::Ternary),
        2 => Ok(QuantType::Scalar2),
        3 => Ok(QuantType::Scalar4),
        4 => Ok(QuantType::Scalar8),
        other => Err(Error::Corrupt(format!("unknown quant type tag {other}"))),
    }
}

fn mode_tag(m: QuantMode) -> u32 {
    match m {
        QuantMode::Symmetric => 0,
        QuantMode::Asymmetric => 1,
    }
}

fn mode_from_tag(tag: u32) -> Result<QuantMode> {
    match tag {
        0 => Ok(QuantMode::Symmetric),
        1 => Ok(QuantMode::Asymmetric),
        other => Err(Error::Corrupt(format!("unknown quant mode tag {other}"))),
    }
}

/// Write `codebook` to `writer` in the format documented in §6, followed
/// by a trailing CRC32 footer (see the sparse format's save for the
/// rationale).
pub fn save_quant<W: Write>(codebook: &QuantCodebook, writer: &mut W) -> Result<()> {
    let mut body = Vec::new();
    body.write_all(MAGIC)?;
    body.write_u32::<LittleEndian>(VERSION)?;
    body.write_u32::<LittleEndian>(type_tag(codebook.quant_type))?;
    body.write_u32::<LittleEndian>(mode_tag(codebook.mode))?;
    body.write_u32::<LittleEndian>(codebook.dimension as u32)?;
    body.write_u32::<LittleEndian>(codebook.rotation.is_some() as u32)?;
    body.write_u64::<LittleEndian>(codebook.rabitq_seed)?;
    body.write_f32::<LittleEndian>(codebook.ternary_threshold)?;

    for &v in &codebook.min {
        body.write_f32::<LittleEndian>(v)?;
    }
    for &v in &codebook.max {
        body.write_f32::<LittleEndian>(v)?;
    }
    for &v in &codebook.mean {
        body.write_f32::<LittleEndian>(v)?;
    }
    for &v in &codebook.std {
        body.write_f32::<LittleEndian>(v)?;
    }
    if let Some(rotation) = &codebook.rotation {
        for &v in rotation {
            body.write_f32::<LittleEndian>(v)?;
        }
    }

    let checksum = crc32fast::hash(&body);
    writer.write_all(&body)?;
    writer.write_u32::<LittleEndian>(checksum)?;
    Ok(())
}

/// Read a [`QuantCodebook`] back from `reader`, validating the trailing
/// checksum, the magic, the version, and the type/mode tags.
pub fn load_quant<R: Read>(reader: &mut R) -> Result<QuantCodebook> {
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

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(Error::Corrupt("bad magic for quant codebook".into()));
    }
    let version = reader.read_u32::<LittleEndian>()?;
    if version != VERSION {
        return Err(Error::Corrupt(format!("unsupported quant version {version}")));
    }

    let quant_type = type_from_tag(reader.read_u32::<LittleEndian>()?)?;
    let mode = mode_from_tag(reader.read_u32::<LittleEndian>()?)?;
    let dimension = reader.read_u32::<LittleEndian>()? as usize;
    let use_rabitq = reader.read_u32::<LittleEndian>()? != 0;
    let rabitq_seed = reader.read_u64::<LittleEndian>()?;
    let ternary_threshold = reader.read_f32::<LittleEndian>()?;

    if dimension == 0 {
        return Err(Error::Corrupt("dimension must be > 0".into()));
    }

    let read_array = |reader: &mut R| -> Result<Vec<f32>> {
        let mut out = Vec::with_capacity(dimension);
        for _ in 0..dimension {
            out.push(reader.read_f32::<LittleEndian>()?);
        }
        Ok(out)
    };
    let min = read_array(reader)?;
    let max = read_array(reader)?;
    let mean = read_array(reader)?;
    let std = read_array(reader)?;

    let rotation = if use_rabitq {
        let mut rot = Vec::with_capacity(dimension * dimension);
        for _ in 0..dimension * dimension {
            rot.push(reader.read_f32::<LittleEndian>()?);
        }
        Some(rot)
    } else {
        None
    };

    Ok(QuantCodebook::from_parts(
        dimension,
        quant_type,
        mode,
        ternary_threshold,
        min,
        max,
        mean,
        std,
        rotation,
        rabitq_seed,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quant::QuantConfig;

    fn corpus(n: usize, d: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut rng = crate::rng::Xorshift64::new(seed);
        (0..n)
            .map(|_| (0..d).map(|_| rng.next_standard_normal()).collect())
            .collect()
    }

    #[test]
    fn round_trips_scalar_codebook() {
        let vectors = corpus(32, 12, 3);
        let codebook = QuantCodebook::train(
            &vectors,
            QuantConfig {
                dimension: 12,
                quant_type: QuantType::Scalar8,
                mode: QuantMode::Asymmetric,
                ..Default::default()
            },
        )
        .unwrap();

        let mut buf = Vec::new();
        save_quant(&codebook, &mut buf).unwrap();
        let loaded = load_quant(&mut &buf[..]).unwrap();

        let v = &vectors[0];
        assert_eq!(codebook.encode(v).unwrap(), loaded.encode(v).unwrap());
        assert_eq!(codebook.decode(&codebook.encode(v).unwrap()), loaded.decode(&loaded.encode(v).unwrap()));
    }

    #[test]
    fn round_trips_rabitq_rotation() {
        let vectors = corpus(32, 10, 5);
        let codebook = QuantCodebook::train(
            &vectors,
            QuantConfig {
                dimension: 10,
                quant_type: QuantType::Binary,
                use_rabitq: true,
                rabitq_seed: 99,
                ..Default::default()
            },
        )
        .unwrap();

        let mut buf = Vec::new();
        save_quant(&codebook, &mut buf).unwrap();
        let loaded = load_quant(&mut &buf[..]).unwrap();
        assert!(loaded.uses_rabitq());

        let v = &vectors[0];
        let codes_a = codebook.encode(v).unwrap();
        let codes_b = loaded.encode(v).unwrap();
        assert_eq!(codes_a, codes_b);
    }

    #[test]
    fn bad_magic_is_corrupt() {
        let buf = vec![0u8; 32];
        assert!(matches!(load_quant(&mut &buf[..]), Err(Error::Corrupt(_))));
    }
}
