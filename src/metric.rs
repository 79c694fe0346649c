//! Pure distance/similarity functions over dense `[f32]` vectors.
//!
//! This is the `MetricFn` collaborator: `(a, b, kind) -> f32`. It never
//! allocates and never fails; callers are responsible for dimension
//! agreement (mismatched lengths are handled the same way `simd::dot`
//! handles them — by truncating to the shorter length — since this module
//! is a pure numerical leaf, not a validating boundary).

use crate::simd;

/// Which distance/similarity a caller wants out of [`metric`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Squared Euclidean distance. Smaller is more similar.
    Euclidean,
    /// `1 - cosine_similarity`. Smaller is more similar.
    Cosine,
    /// Negative dot product, so that smaller is more similar (consistent
    /// with the other variants being "distances").
    Dot,
    /// L1 (Manhattan) distance. Smaller is more similar.
    Manhattan,
}

/// Compute the distance between `a` and `b` under `kind`.
///
/// All variants are distances (smaller = closer), including `Dot`, which
/// negates the raw dot product so that every `MetricKind` can be plugged
/// into a min-heap top-k search uniformly.
#[inline]
#[must_use]
pub fn metric(a: &[f32], b: &[f32], kind: MetricKind) -> f32 {
    match kind {
        MetricKind::Euclidean => euclidean2(a, b),
        MetricKind::Cosine => 1.0 - simd::cosine(a, b),
        MetricKind::Dot => -simd::dot(a, b),
        MetricKind::Manhattan => manhattan(a, b),
    }
}

/// Squared Euclidean distance, derived from dot products so the fast
/// SIMD-accelerated `dot` path is reused: `|a-b|^2 = a.a + b.b - 2 a.b`.
#[inline]
#[must_use]
pub fn euclidean2(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    let (a, b) = (&a[..n], &b[..n]);
    let aa = simd::dot(a, a);
    let bb = simd::dot(b, b);
    let ab = simd::dot(a, b);
    (aa + bb - 2.0 * ab).max(0.0)
}

/// L1 (Manhattan) distance. No SIMD fast path exists for this in the
/// teacher's `simd` module, so it is computed portably.
#[inline]
#[must_use]
pub fn manhattan(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn euclidean_matches_definition() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 6.0, 3.0];
        // (1-4)^2 + (2-6)^2 + (3-3)^2 = 9 + 16 + 0 = 25
        assert!((euclidean2(&a, &b) - 25.0).abs() < 1e-5);
    }

    #[test]
    fn euclidean_self_is_zero() {
        let a = [1.0, -2.0, 3.5];
        assert!(euclidean2(&a, &a).abs() < 1e-5);
    }

    #[test]
    fn manhattan_matches_definition() {
        let a = [1.0, -2.0, 3.0];
        let b = [4.0, 2.0, 3.0];
        assert!((manhattan(&a, &b) - 7.0).abs() < 1e-5);
    }

    #[test]
    fn dot_metric_is_negated() {
        let a = [1.0, 0.0];
        let b = [1.0, 0.0];
        assert!((metric(&a, &b, MetricKind::Dot) + 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_metric_identical_is_zero() {
        let a = [1.0, 2.0, 3.0];
        assert!(metric(&a, &a, MetricKind::Cosine).abs() < 1e-4);
    }

    #[test]
    fn never_negative_for_real_distances() {
        let a = [0.1, 0.2, 0.3];
        let b = [0.4, -0.1, 0.2];
        assert!(metric(&a, &b, MetricKind::Euclidean) >= 0.0);
        assert!(metric(&a, &b, MetricKind::Manhattan) >= 0.0);
    }
}
