//! Hyperplane bank generation: `num_tables * num_hash_bits` i.i.d.
//! standard-normal vectors of dimension `D`, drawn from a seeded
//! xorshift64 stream.

use crate::rng::Xorshift64;

/// `num_tables * num_hash_bits` vectors of dimension `D`, flattened
/// row-major (table-major, then hash-bit, then dimension).
#[derive(Debug, Clone)]
pub struct HyperplaneBank {
    dimension: usize,
    num_tables: usize,
    num_hash_bits: usize,
    planes: Vec<f32>,
}

impl HyperplaneBank {
    /// Generate a bank from `seed`. Same seed and shape always produce
    /// the same planes, since generation draws from [`Xorshift64`] in a
    /// fixed table-then-bit-then-dimension order.
    pub fn generate(dimension: usize, num_tables: usize, num_hash_bits: usize, seed: u64) -> Self {
        let mut rng = Xorshift64::new(seed);
        let count = num_tables * num_hash_bits * dimension;
        let planes: Vec<f32> = (0..count).map(|_| rng.next_standard_normal()).collect();
        Self {
            dimension,
            num_tables,
            num_hash_bits,
            planes,
        }
    }

    /// Reconstruct a bank from a flattened plane array (used by
    /// persistence load).
    pub fn from_raw(
        dimension: usize,
        num_tables: usize,
        num_hash_bits: usize,
        planes: Vec<f32>,
    ) -> Self {
        debug_assert_eq!(planes.len(), num_tables * num_hash_bits * dimension);
        Self {
            dimension,
            num_tables,
            num_hash_bits,
            planes,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn num_tables(&self) -> usize {
        self.num_tables
    }

    pub fn num_hash_bits(&self) -> usize {
        self.num_hash_bits
    }

    /// Flattened plane storage, for persistence.
    pub fn raw(&self) -> &[f32] {
        &self.planes
    }

    fn plane(&self, table: usize, bit: usize) -> &[f32] {
        let start = (table * self.num_hash_bits + bit) * self.dimension;
        &self.planes[start..start + self.dimension]
    }

    /// Hash `vector` under table `table`: bit `b` is set iff
    /// `<vector, H_{table,b}> >= 0`, packed as an integer with bit 0 the
    /// most significant of the `num_hash_bits` produced.
    pub fn hash(&self, table: usize, vector: &[f32]) -> u64 {
        let mut h: u64 = 0;
        for b in 0..self.num_hash_bits {
            let plane = self.plane(table, b);
            let dot: f32 = plane.iter().zip(vector.iter()).map(|(p, v)| p * v).sum();
            h <<= 1;
            if dot >= 0.0 {
                h |= 1;
            }
        }
        h
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_seed() {
        let a = HyperplaneBank::generate(8, 4, 16, 42);
        let b = HyperplaneBank::generate(8, 4, 16, 42);
        assert_eq!(a.raw(), b.raw());
    }

    #[test]
    fn differs_across_seeds() {
        let a = HyperplaneBank::generate(8, 2, 4, 1);
        let b = HyperplaneBank::generate(8, 2, 4, 2);
        assert_ne!(a.raw(), b.raw());
    }

    #[test]
    fn hash_is_stable_for_same_vector() {
        let bank = HyperplaneBank::generate(6, 3, 10, 9);
        let v = vec![1.0, -2.0, 0.5, 3.0, -1.0, 0.2];
        let h1 = bank.hash(0, &v);
        let h2 = bank.hash(0, &v);
        assert_eq!(h1, h2);
    }
}
