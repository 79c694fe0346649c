//! Bit-exact binary persistence for each index: a fixed magic + version
//! header followed by little-endian integers and IEEE-754 floats,
//! written and read with [`byteorder`], with a trailing [`crc32fast`]
//! checksum over the whole payload so a truncated or bit-flipped file is
//! caught as [`crate::error::Error::Corrupt`] instead of silently
//! misparsed.

mod lsh_format;
mod quant_format;
mod sparse_format;

pub use lsh_format::{load_lsh, save_lsh};
pub use quant_format::{load_quant, save_quant};
pub use sparse_format::{load_sparse, save_sparse};
