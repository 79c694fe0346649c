//! Encode/decode and distance computation over a trained [`QuantCodebook`].

use crate::error::{Error, Result};
use crate::quant::codebook::{QuantCodebook, QuantMode, QuantType};
use crate::quant::rabitq;

fn write_bits(buf: &mut [u8], bit_offset: usize, width: usize, value: u32) {
    for i in 0..width {
        let bit = (value >> (width - 1 - i)) & 1;
        if bit == 1 {
            let global = bit_offset + i;
            let byte = global / 8;
            let shift = 7 - (global % 8);
            buf[byte] |= 1 << shift;
        }
    }
}

fn read_bits(buf: &[u8], bit_offset: usize, width: usize) -> u32 {
    let mut value = 0u32;
    for i in 0..width {
        let global = bit_offset + i;
        let byte = global / 8;
        let shift = 7 - (global % 8);
        let bit = (buf[byte] >> shift) & 1;
        value = (value << 1) | bit as u32;
    }
    value
}

/// Mask that keeps only the first `dimension mod 8` bits (from the MSB
/// side) of the final byte of a bit-packed buffer; `0xFF` when
/// `dimension` is a multiple of 8.
fn tail_mask(dimension: usize) -> u8 {
    let rem = dimension % 8;
    if rem == 0 {
        0xFF
    } else {
        (0xFFu16 << (8 - rem)) as u8
    }
}

fn hamming_masked(a: &[u8], b: &[u8], dimension: usize) -> u32 {
    let mask = tail_mask(dimension);
    let last = a.len().saturating_sub(1);
    a.iter()
        .zip(b.iter())
        .enumerate()
        .map(|(i, (&x, &y))| {
            let mut bits = x ^ y;
            if i == last {
                bits &= mask;
            }
            bits.count_ones()
        })
        .sum()
}

impl QuantCodebook {
    fn bits_per_value(&self) -> usize {
        match self.quant_type {
            QuantType::Binary => 1,
            QuantType::Ternary => 2,
            QuantType::Scalar2 => 2,
            QuantType::Scalar4 => 4,
            QuantType::Scalar8 => 8,
        }
    }

    fn levels(&self) -> usize {
        match self.quant_type {
            QuantType::Binary => 2,
            QuantType::Ternary => 3,
            QuantType::Scalar2 => 4,
            QuantType::Scalar4 => 16,
            QuantType::Scalar8 => 256,
        }
    }

    /// Length in bytes of an encoded buffer for this codebook.
    pub fn code_len(&self) -> usize {
        (self.dimension * self.bits_per_value()).div_ceil(8)
    }

    /// The `(lo, hi)` bounds used to quantize dimension `d`: `(min, max)`
    /// in [`QuantMode::Asymmetric`], `(mean - 3*std, mean + 3*std)` in
    /// [`QuantMode::Symmetric`]. Meaningful only for the scalar types.
    pub fn scalar_bounds(&self, d: usize) -> (f32, f32) {
        match self.mode {
            QuantMode::Asymmetric => (self.min[d], self.max[d]),
            QuantMode::Symmetric => (
                self.mean[d] - 3.0 * self.std[d],
                self.mean[d] + 3.0 * self.std[d],
            ),
        }
    }

    fn decode_value(&self, d: usize, code: u32) -> f32 {
        match self.quant_type {
            QuantType::Binary => {
                if code == 1 {
                    1.0
                } else {
                    -1.0
                }
            }
            QuantType::Ternary => match code {
                2 => self.std[d],
                0 => -self.std[d],
                _ => 0.0,
            },
            QuantType::Scalar2 | QuantType::Scalar4 | QuantType::Scalar8 => {
                let (lo, hi) = self.scalar_bounds(d);
                if hi <= lo {
                    return lo;
                }
                let levels = self.levels();
                lo + (code as f32 / (levels - 1) as f32) * (hi - lo)
            }
        }
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

    /// Quantize `vector` into a code buffer of [`Self::code_len`] bytes.
    pub fn encode(&self, vector: &[f32]) -> Result<Vec<u8>> {
        self.check_dimension(vector)?;
        let bits = self.bits_per_value();
        let mut codes = vec![0u8; self.code_len()];

        let rotated;
        let values: &[f32] = if let Some(rotation) = &self.rotation {
            rotated = rabitq::rotate(rotation, vector, self.dimension);
            &rotated
        } else {
            vector
        };

        match self.quant_type {
            QuantType::Binary => {
                for d in 0..self.dimension {
                    let bit = if values[d] >= 0.0 { 1 } else { 0 };
                    write_bits(&mut codes, d, 1, bit);
                }
            }
            QuantType::Ternary => {
                for d in 0..self.dimension {
                    let tau = self.ternary_threshold * self.std[d];
                    let code = if values[d] > tau {
                        0b10
                    } else if values[d] < -tau {
                        0b00
                    } else {
                        0b01
                    };
                    write_bits(&mut codes, d * bits, bits, code);
                }
            }
            QuantType::Scalar2 | QuantType::Scalar4 | QuantType::Scalar8 => {
                let levels = self.levels();
                for d in 0..self.dimension {
                    let (lo, hi) = self.scalar_bounds(d);
                    let code = if hi <= lo {
                        0
                    } else {
                        let normalized = ((values[d] - lo) / (hi - lo)).clamp(0.0, 1.0);
                        (normalized * (levels - 1) as f32).round() as u32
                    };
                    write_bits(&mut codes, d * bits, bits, code);
                }
            }
        }
        Ok(codes)
    }

    /// Reconstruct an approximate vector from `codes`.
    pub fn decode(&self, codes: &[u8]) -> Vec<f32> {
        let bits = self.bits_per_value();
        let mut values = vec![0.0f32; self.dimension];
        for (d, slot) in values.iter_mut().enumerate() {
            let code = read_bits(codes, d * bits, bits);
            *slot = self.decode_value(d, code);
        }
        if let Some(rotation) = &self.rotation {
            rabitq::inverse_rotate(rotation, &values, self.dimension)
        } else {
            values
        }
    }

    fn squared_diff_table(&self, query: &[f32]) -> Vec<f32> {
        let levels = self.levels();
        let mut table = vec![0.0f32; self.dimension * levels];
        for d in 0..self.dimension {
            for code in 0..levels {
                let decoded = self.decode_value(d, code as u32);
                let diff = query[d] - decoded;
                table[d * levels + code] = diff * diff;
            }
        }
        table
    }

    /// Asymmetric distance between a raw `query` vector and an encoded
    /// `codes` buffer. Binary codebooks encode the query and return a
    /// tail-masked Hamming distance; scalar and ternary codebooks build
    /// a per-dimension squared-difference lookup table and sum it over
    /// the decoded codes.
    pub fn distance(&self, query: &[f32], codes: &[u8]) -> Result<f32> {
        self.check_dimension(query)?;
        match self.quant_type {
            QuantType::Binary => {
                let query_codes = self.encode(query)?;
                Ok(hamming_masked(&query_codes, codes, self.dimension) as f32)
            }
            _ => {
                let bits = self.bits_per_value();
                let levels = self.levels();
                let table = self.squared_diff_table(query);
                let total: f32 = (0..self.dimension)
                    .map(|d| {
                        let code = read_bits(codes, d * bits, bits) as usize;
                        table[d * levels + code]
                    })
                    .sum();
                Ok(total)
            }
        }
    }

    /// Symmetric distance between two encoded buffers: tail-masked
    /// Hamming distance for Binary, dequantize-and-sum-squared-diff for
    /// everything else.
    pub fn distance_qq(&self, codes_a: &[u8], codes_b: &[u8]) -> f32 {
        match self.quant_type {
            QuantType::Binary => hamming_masked(codes_a, codes_b, self.dimension) as f32,
            _ => {
                let a = self.decode(codes_a);
                let b = self.decode(codes_b);
                a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quant::codebook::{QuantConfig, QuantMode, QuantType};

    fn corpus(n: usize, d: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut rng = crate::rng::Xorshift64::new(seed);
        (0..n)
            .map(|_| (0..d).map(|_| rng.next_standard_normal() * 2.0).collect())
            .collect()
    }

    #[test]
    fn scalar8_roundtrip_within_half_step() {
        let vectors = corpus(64, 16, 7);
        let codebook = QuantCodebook::train(
            &vectors,
            QuantConfig {
                dimension: 16,
                quant_type: QuantType::Scalar8,
                mode: QuantMode::Asymmetric,
                ..Default::default()
            },
        )
        .unwrap();

        let v = &vectors[0];
        let codes = codebook.encode(v).unwrap();
        let decoded = codebook.decode(&codes);
        for d in 0..16 {
            let (lo, hi) = codebook.scalar_bounds(d);
            let step = (hi - lo) / 255.0;
            assert!((v[d] - decoded[d]).abs() <= step + 1e-4, "d={d}");
        }
    }

    #[test]
    fn distance_qq_self_is_zero() {
        let vectors = corpus(32, 8, 11);
        let codebook = QuantCodebook::train(
            &vectors,
            QuantConfig {
                dimension: 8,
                quant_type: QuantType::Scalar4,
                ..Default::default()
            },
        )
        .unwrap();
        let codes = codebook.encode(&vectors[0]).unwrap();
        assert_eq!(codebook.distance_qq(&codes, &codes), 0.0);
    }

    #[test]
    fn binary_distance_qq_self_is_zero() {
        let vectors = corpus(32, 12, 3);
        let codebook = QuantCodebook::train(
            &vectors,
            QuantConfig {
                dimension: 12,
                quant_type: QuantType::Binary,
                use_rabitq: true,
                rabitq_seed: 5,
                ..Default::default()
            },
        )
        .unwrap();
        let codes = codebook.encode(&vectors[0]).unwrap();
        assert_eq!(codebook.distance_qq(&codes, &codes), 0.0);
    }

    #[test]
    fn ternary_decodes_to_signed_std_or_zero() {
        let vectors = corpus(32, 4, 21);
        let codebook = QuantCodebook::train(
            &vectors,
            QuantConfig {
                dimension: 4,
                quant_type: QuantType::Ternary,
                ..Default::default()
            },
        )
        .unwrap();
        let codes = codebook.encode(&vectors[0]).unwrap();
        let decoded = codebook.decode(&codes);
        for (d, &x) in decoded.iter().enumerate() {
            assert!(x == 0.0 || (x - codebook.std[d]).abs() < 1e-6 || (x + codebook.std[d]).abs() < 1e-6);
        }
    }

    #[test]
    fn tail_bits_are_masked_for_non_byte_aligned_dimension() {
        let vectors = corpus(16, 5, 1);
        let codebook = QuantCodebook::train(
            &vectors,
            QuantConfig {
                dimension: 5,
                quant_type: QuantType::Binary,
                ..Default::default()
            },
        )
        .unwrap();
        let a = codebook.encode(&vectors[0]).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(codebook.distance_qq(&a, &a), 0.0);
    }

    #[test]
    fn dimension_mismatch_is_invalid_argument() {
        let vectors = corpus(8, 4, 9);
        let codebook = QuantCodebook::train(
            &vectors,
            QuantConfig {
                dimension: 4,
                ..Default::default()
            },
        )
        .unwrap();
        let result = codebook.encode(&[1.0, 2.0]);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn empty_training_set_is_null_input() {
        let result = QuantCodebook::train(
            &[],
            QuantConfig {
                dimension: 4,
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(Error::NullInput(_))));
    }
}
