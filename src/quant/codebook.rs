//! Codebook types and the two-pass `train` statistics accumulation.

use tracing::instrument;

use crate::error::{Error, Result};
use crate::quant::rabitq;

/// Quantization granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantType {
    Binary,
    Ternary,
    Scalar2,
    Scalar4,
    Scalar8,
}

/// Whether scalar bounds come from the per-dimension `(min, max)` or
/// from `(mean - 3*std, mean + 3*std)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantMode {
    Symmetric,
    Asymmetric,
}

/// Parameters for [`QuantCodebook::train`].
#[derive(Debug, Clone)]
pub struct QuantConfig {
    /// Dimension `D` of every training and query vector.
    pub dimension: usize,
    pub quant_type: QuantType,
    pub mode: QuantMode,
    /// Apply a random-orthogonal rotation before sign-quantization.
    /// Only meaningful for `QuantType::Binary`.
    pub use_rabitq: bool,
    /// Seed for the rotation matrix's Householder-reflection generator.
    pub rabitq_seed: u64,
    /// Fraction of `std[d]` used as the ternary threshold `tau`.
    pub ternary_threshold: f32,
}

impl Default for QuantConfig {
    fn default() -> Self {
        Self {
            dimension: 0,
            quant_type: QuantType::Scalar8,
            mode: QuantMode::Symmetric,
            use_rabitq: false,
            rabitq_seed: 42,
            ternary_threshold: 0.5,
        }
    }
}

/// A trained codebook: per-dimension statistics, optional rotation, and
/// the configuration that produced it.
#[derive(Debug, Clone)]
pub struct QuantCodebook {
    pub(crate) dimension: usize,
    pub(crate) quant_type: QuantType,
    pub(crate) mode: QuantMode,
    pub(crate) ternary_threshold: f32,
    pub(crate) min: Vec<f32>,
    pub(crate) max: Vec<f32>,
    pub(crate) mean: Vec<f32>,
    pub(crate) std: Vec<f32>,
    pub(crate) rotation: Option<Vec<f32>>,
    pub(crate) rabitq_seed: u64,
}

impl QuantCodebook {
    /// Train a codebook from `vectors`, each of length `config.dimension`.
    ///
    /// Two passes: the first accumulates per-dimension `min`, `max`, and
    /// a running sum for `mean`; the second accumulates the sum of
    /// squared deviations for `std`, clamped to `>= 1e-9`. For
    /// `Binary` with `use_rabitq`, a `D x D` random-orthogonal rotation
    /// is generated from `config.rabitq_seed`.
    #[instrument(skip(vectors))]
    pub fn train(vectors: &[Vec<f32>], config: QuantConfig) -> Result<Self> {
        if config.dimension == 0 {
            return Err(Error::InvalidArgument("dimension must be > 0".into()));
        }
        if vectors.is_empty() {
            return Err(Error::NullInput("training vectors"));
        }
        let d = config.dimension;
        for v in vectors {
            if v.len() != d {
                return Err(Error::InvalidArgument(format!(
                    "training vector has length {}, expected {d}",
                    v.len()
                )));
            }
        }

        let n = vectors.len() as f64;
        let mut min = vec![f32::INFINITY; d];
        let mut max = vec![f32::NEG_INFINITY; d];
        let mut sum = vec![0.0f64; d];
        for v in vectors {
            for (dim, &x) in v.iter().enumerate() {
                if x < min[dim] {
                    min[dim] = x;
                }
                if x > max[dim] {
                    max[dim] = x;
                }
                sum[dim] += x as f64;
            }
        }
        let mean: Vec<f32> = sum.iter().map(|s| (s / n) as f32).collect();

        let mut sq_dev = vec![0.0f64; d];
        for v in vectors {
            for (dim, &x) in v.iter().enumerate() {
                let dev = x as f64 - mean[dim] as f64;
                sq_dev[dim] += dev * dev;
            }
        }
        let std: Vec<f32> = sq_dev
            .iter()
            .map(|s| ((s / n).sqrt() as f32).max(1e-9))
            .collect();

        let rotation = if config.quant_type == QuantType::Binary && config.use_rabitq {
            Some(rabitq::generate_rotation(d, config.rabitq_seed))
        } else {
            None
        };

        Ok(Self {
            dimension: d,
            quant_type: config.quant_type,
            mode: config.mode,
            ternary_threshold: config.ternary_threshold,
            min,
            max,
            mean,
            std,
            rotation,
            rabitq_seed: config.rabitq_seed,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn quant_type(&self) -> QuantType {
        self.quant_type
    }

    pub fn mode(&self) -> QuantMode {
        self.mode
    }

    pub fn uses_rabitq(&self) -> bool {
        self.rotation.is_some()
    }

    /// Rebuild a codebook from its persisted fields, used by
    /// [`crate::persistence::load_quant`]. No statistical validation is
    /// performed beyond the `hi > lo` shape the caller already checked;
    /// this is a pure field assembly step.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        dimension: usize,
        quant_type: QuantType,
        mode: QuantMode,
        ternary_threshold: f32,
        min: Vec<f32>,
        max: Vec<f32>,
        mean: Vec<f32>,
        std: Vec<f32>,
        rotation: Option<Vec<f32>>,
        rabitq_seed: u64,
    ) -> Self {
        Self {
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
        }
    }
}
