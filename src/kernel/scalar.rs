//! Scalar reference kernels.

/// Dot product accumulated in `f64`.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| x as f64 * y as f64)
        .sum()
}
