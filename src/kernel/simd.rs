//! SIMD kernels using the `wide` crate.
//!
//! The main loop processes 8 values at a time with `f32x8`; the remainder is
//! handled with scalar code.

use wide::f32x8;

const LANES: usize = 8;

/// Upper bound on the chunks accumulated in one `f32x8` before flushing to `f64`.
const FLUSH_CHUNKS: usize = 64;

#[inline]
fn load_f32x8(slice: &[f32]) -> f32x8 {
    f32x8::from([
        slice[0], slice[1], slice[2], slice[3], slice[4], slice[5], slice[6], slice[7],
    ])
}

#[inline]
fn hsum(v: f32x8) -> f64 {
    v.to_array().iter().map(|&x| x as f64).sum()
}

/// Dot product over the common prefix of `a` and `b`.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    let len = a.len().min(b.len());
    let (a, b) = (&a[..len], &b[..len]);
    let simd_end = len / LANES * LANES;

    let mut total = 0.0f64;
    let mut acc = f32x8::ZERO;
    let mut pending = 0usize;
    for (ca, cb) in a[..simd_end]
        .chunks_exact(LANES)
        .zip(b[..simd_end].chunks_exact(LANES))
    {
        acc += load_f32x8(ca) * load_f32x8(cb);
        pending += 1;
        if pending == FLUSH_CHUNKS {
            total += hsum(acc);
            acc = f32x8::ZERO;
            pending = 0;
        }
    }
    total += hsum(acc);

    for i in simd_end..len {
        total += a[i] as f64 * b[i] as f64;
    }
    total
}
