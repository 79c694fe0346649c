//! Random-orthogonal rotation matrix generation for RaBitQ, via a chain
//! of Householder reflections seeded from the deterministic xorshift64
//! generator (Stewart's construction).

use crate::rng::Xorshift64;

fn identity(d: usize) -> Vec<f32> {
    let mut m = vec![0.0f32; d * d];
    for i in 0..d {
        m[i * d + i] = 1.0;
    }
    m
}

fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-9);
    for x in v.iter_mut() {
        *x /= norm;
    }
}

fn householder(v: &[f32], d: usize) -> Vec<f32> {
    let mut h = identity(d);
    for i in 0..d {
        for j in 0..d {
            h[i * d + j] -= 2.0 * v[i] * v[j];
        }
    }
    h
}

fn matmul(a: &[f32], b: &[f32], d: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; d * d];
    for i in 0..d {
        for k in 0..d {
            let aik = a[i * d + k];
            if aik == 0.0 {
                continue;
            }
            for j in 0..d {
                out[i * d + j] += aik * b[k * d + j];
            }
        }
    }
    out
}

/// Generate a `D x D` row-major orthogonal matrix from `seed`, by
/// accumulating `D - 1` Householder reflections drawn from
/// `seed`-derived uniform samples in `[-1, 1]`, each normalized before
/// use, starting from the identity: `R <- H_k * R`.
pub fn generate_rotation(dimension: usize, seed: u64) -> Vec<f32> {
    let d = dimension;
    let mut rng = Xorshift64::new(seed);
    let mut r = identity(d);
    for _ in 0..d.saturating_sub(1) {
        let mut v: Vec<f32> = (0..d).map(|_| rng.next_uniform_signed()).collect();
        normalize(&mut v);
        let h = householder(&v, d);
        r = matmul(&h, &r, d);
    }
    r
}

/// Apply `matrix` (row-major `D x D`) to `v`.
pub fn rotate(matrix: &[f32], v: &[f32], d: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; d];
    for (i, slot) in out.iter_mut().enumerate() {
        let row = &matrix[i * d..i * d + d];
        *slot = row.iter().zip(v.iter()).map(|(m, x)| m * x).sum();
    }
    out
}

/// Apply `matrix`'s transpose to `v` (the inverse rotation, since the
/// matrix is orthogonal).
pub fn inverse_rotate(matrix: &[f32], v: &[f32], d: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; d];
    for i in 0..d {
        let vi = v[i];
        if vi == 0.0 {
            continue;
        }
        for j in 0..d {
            out[j] += matrix[i * d + j] * vi;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_is_orthogonal() {
        let d = 6;
        let r = generate_rotation(d, 7);
        // R * R^T should be close to identity.
        for i in 0..d {
            for j in 0..d {
                let dot: f32 = (0..d).map(|k| r[i * d + k] * r[j * d + k]).sum();
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((dot - expected).abs() < 1e-3, "i={i} j={j} dot={dot}");
            }
        }
    }

    #[test]
    fn rotate_then_inverse_rotate_round_trips() {
        let d = 5;
        let r = generate_rotation(d, 99);
        let v = vec![1.0, -2.0, 3.0, 0.5, -0.25];
        let rotated = rotate(&r, &v, d);
        let back = inverse_rotate(&r, &rotated, d);
        for (a, b) in v.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-3, "a={a} b={b}");
        }
    }

    #[test]
    fn deterministic_for_same_seed() {
        let a = generate_rotation(4, 123);
        let b = generate_rotation(4, 123);
        assert_eq!(a, b);
    }
}
