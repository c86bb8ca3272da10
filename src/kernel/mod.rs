//! Reduction kernels used by the correlation routine.
//!
//! Rows are reduced in `f32` lanes and accumulated into `f64` so that long
//! images do not lose precision in the running sums.

pub mod scalar;

#[cfg(feature = "simd")]
pub mod simd;

#[cfg(not(feature = "simd"))]
use scalar::dot as dot_impl;
#[cfg(feature = "simd")]
use simd::dot as dot_impl;

/// Dot product of two slices over their common prefix.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    dot_impl(a, b)
}

/// Sum of squares of a slice.
#[inline]
pub fn sum_sq(a: &[f32]) -> f64 {
    dot_impl(a, a)
}
