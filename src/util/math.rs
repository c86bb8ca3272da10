//! Numeric helpers shared by the filters and fits.

/// Sigma used for a Gaussian of `ksize` taps when none is given.
///
/// Matches the common `0.3 * ((ksize - 1) * 0.5 - 1) + 0.8` rule, so a 5-tap
/// kernel uses `sigma = 1.1`.
pub(crate) fn default_sigma(ksize: usize) -> f64 {
    0.3 * ((ksize as f64 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Builds a normalized 1D Gaussian kernel with `ksize` taps.
pub(crate) fn gaussian_kernel_1d(ksize: usize) -> Vec<f32> {
    let sigma = default_sigma(ksize);
    let center = (ksize as f64 - 1.0) * 0.5;
    let scale = -0.5 / (sigma * sigma);
    let mut taps: Vec<f64> = (0..ksize)
        .map(|i| {
            let d = i as f64 - center;
            (scale * d * d).exp()
        })
        .collect();
    let sum: f64 = taps.iter().sum();
    for tap in &mut taps {
        *tap /= sum;
    }
    taps.into_iter().map(|t| t as f32).collect()
}

/// Mirrors an index into `[0, len)` without repeating the edge sample.
///
/// `len` must be non-zero. Indices far outside the range are folded
/// repeatedly.
pub(crate) fn reflect_101(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let mut i = index.rem_euclid(period);
    if i >= len as isize {
        i = period - i;
    }
    i as usize
}

/// Returns true when `value` is within `tol` of zero.
pub(crate) fn near_zero(value: f64, tol: f64) -> bool {
    value.abs() <= tol
}

#[cfg(test)]
mod tests {
    use super::{default_sigma, gaussian_kernel_1d, reflect_101};

    #[test]
    fn default_sigma_for_five_taps() {
        assert!((default_sigma(5) - 1.1).abs() < 1e-12);
    }

    #[test]
    fn gaussian_kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel_1d(5);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!((k[0] - k[4]).abs() < 1e-7);
        assert!((k[1] - k[3]).abs() < 1e-7);
        assert!(k[2] > k[1] && k[1] > k[0]);
    }

    #[test]
    fn reflect_101_mirrors_without_edge_repeat() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-2, 5), 2);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(3, 5), 3);
        assert_eq!(reflect_101(-7, 1), 0);
    }
}
