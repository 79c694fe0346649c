//! Vector quantization codec: binary/ternary/scalar encode-decode with
//! optional RaBitQ rotation, plus asymmetric and symmetric code distances.

mod codebook;
mod codec;
mod rabitq;

pub use codebook::{QuantCodebook, QuantConfig, QuantMode, QuantType};
