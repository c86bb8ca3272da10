//! Area-average resampling for grayscale `u8` rasters.
//!
//! A destination pixel `(x, y)` averages the source box
//! `[x * f, (x + 1) * f) x [y * f, (y + 1) * f)`, weighting partially covered
//! source pixels by their coverage. For `f = 2` this is the 2x2 box filter
//! `((a + b + c + d) + 2) / 4`; for `f < 1` it degrades to nearest-neighbour
//! upsampling. The filter is separable and runs a horizontal pass into an
//! `f32` buffer before the vertical pass.

use crate::image::{ImageView, OwnedImage};
use crate::util::{AlignError, AlignResult};

/// Largest raster, in pixels, a resample may produce.
pub const MAX_RASTER_PIXELS: usize = 1 << 28;

fn downsampled_len(len: usize, factor: f64) -> Option<usize> {
    let scaled = (len as f64 / factor).floor();
    if !scaled.is_finite() || scaled > MAX_RASTER_PIXELS as f64 {
        return None;
    }
    Some((scaled as usize).max(1))
}

/// Returns the raster size of a `width x height` image read at `factor`.
///
/// Each side is `max(1, floor(len / factor))`. Fails with `InvalidArgument`
/// when the result would exceed [`MAX_RASTER_PIXELS`].
pub fn downsampled_size(width: usize, height: usize, factor: f64) -> AlignResult<(usize, usize)> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(AlignError::InvalidInput("downsample must be finite and > 0"));
    }
    let too_large = || {
        AlignError::InvalidArgument(format!(
            "downsample {factor} turns a {width}x{height} image into more than {MAX_RASTER_PIXELS} pixels"
        ))
    };
    let w = downsampled_len(width, factor).ok_or_else(too_large)?;
    let h = downsampled_len(height, factor).ok_or_else(too_large)?;
    match w.checked_mul(h) {
        Some(pixels) if pixels <= MAX_RASTER_PIXELS => Ok((w, h)),
        _ => Err(too_large()),
    }
}

/// Resamples `src` by `factor` using coverage-weighted box averaging.
pub fn downsample_area(src: ImageView<'_, u8>, factor: f64) -> AlignResult<OwnedImage> {
    let (dst_width, dst_height) = downsampled_size(src.width(), src.height(), factor)?;
    if factor == 1.0 {
        return Ok(src.to_owned_image());
    }

    let cols = coverage_table(src.width(), dst_width, factor);
    let rows = coverage_table(src.height(), dst_height, factor);

    let staged = dst_width
        .checked_mul(src.height())
        .filter(|&len| len <= MAX_RASTER_PIXELS)
        .ok_or_else(|| {
            AlignError::InvalidArgument(format!(
                "downsample {factor} needs an oversized intermediate raster"
            ))
        })?;
    let mut horizontal = vec![0.0f32; staged];
    for y in 0..src.height() {
        let row = src.row(y).ok_or(AlignError::BufferTooSmall {
            needed: (y + 1) * src.stride(),
            got: src.as_slice().len(),
        })?;
        let out = &mut horizontal[y * dst_width..(y + 1) * dst_width];
        for (dst, taps) in out.iter_mut().zip(cols.iter()) {
            *dst = taps.iter().map(|&(i, w)| f32::from(row[i]) * w).sum();
        }
    }

    let mut out = vec![0u8; dst_width * dst_height];
    for (y, taps) in rows.iter().enumerate() {
        for x in 0..dst_width {
            let value: f32 = taps
                .iter()
                .map(|&(i, w)| horizontal[i * dst_width + x] * w)
                .sum();
            out[y * dst_width + x] = (value + 0.5).floor().clamp(0.0, 255.0) as u8;
        }
    }

    OwnedImage::new(out, dst_width, dst_height)
}

/// For each destination index, lists `(source index, normalized weight)`.
fn coverage_table(src_len: usize, dst_len: usize, factor: f64) -> Vec<Vec<(usize, f32)>> {
    (0..dst_len)
        .map(|d| {
            let start = d as f64 * factor;
            let end = ((d + 1) as f64 * factor).min(src_len as f64);
            let first = start.floor() as usize;
            let last = (end.ceil() as usize).min(src_len).max(first + 1);
            let mut taps: Vec<(usize, f64)> = (first..last)
                .map(|i| {
                    let lo = start.max(i as f64);
                    let hi = end.min((i + 1) as f64);
                    (i.min(src_len - 1), (hi - lo).max(0.0))
                })
                .filter(|&(_, w)| w > 0.0)
                .collect();
            if taps.is_empty() {
                taps.push((first.min(src_len - 1), 1.0));
            }
            let total: f64 = taps.iter().map(|&(_, w)| w).sum();
            taps.into_iter()
                .map(|(i, w)| (i, (w / total) as f32))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{downsample_area, downsampled_size, MAX_RASTER_PIXELS};
    use crate::util::AlignError;
    use crate::image::ImageView;

    #[test]
    fn factor_two_matches_box_filter() {
        let data: Vec<u8> = (0u8..16).collect();
        let view = ImageView::from_slice(&data, 4, 4).unwrap();
        let out = downsample_area(view, 2.0).unwrap();
        assert_eq!((out.width(), out.height()), (2, 2));
        assert_eq!(out.data(), &[3u8, 5, 11, 13]);
    }

    #[test]
    fn factor_one_copies_input() {
        let data: Vec<u8> = (0u8..6).collect();
        let view = ImageView::from_slice(&data, 3, 2).unwrap();
        let out = downsample_area(view, 1.0).unwrap();
        assert_eq!(out.data(), data.as_slice());
    }

    #[test]
    fn fractional_factor_preserves_constant_images() {
        let data = vec![77u8; 10 * 7];
        let view = ImageView::from_slice(&data, 10, 7).unwrap();
        let out = downsample_area(view, 1.5).unwrap();
        assert_eq!((out.width(), out.height()), (6, 4));
        assert!(out.data().iter().all(|&v| v == 77));
    }

    #[test]
    fn upsampling_repeats_pixels() {
        let data = [10u8, 20, 30, 40];
        let view = ImageView::from_slice(&data, 2, 2).unwrap();
        let out = downsample_area(view, 0.5).unwrap();
        assert_eq!((out.width(), out.height()), (4, 4));
        assert_eq!(&out.data()[0..4], &[10, 10, 20, 20]);
        assert_eq!(&out.data()[12..16], &[30, 30, 40, 40]);
    }

    #[test]
    fn rejects_non_positive_factor() {
        let data = [0u8; 4];
        let view = ImageView::from_slice(&data, 2, 2).unwrap();
        assert!(downsample_area(view, 0.0).is_err());
        assert!(downsample_area(view, f64::NAN).is_err());
        assert_eq!(downsampled_size(3, 3, 4.0).unwrap(), (1, 1));
    }

    #[test]
    fn oversized_output_is_an_argument_error() {
        let data = [0u8; 16];
        let view = ImageView::from_slice(&data, 4, 4).unwrap();
        for factor in [1e-300, 1e-6, f64::MIN_POSITIVE] {
            assert!(matches!(
                downsample_area(view, factor),
                Err(AlignError::InvalidArgument(_))
            ));
        }
        assert!(downsampled_size(usize::MAX, usize::MAX, 1.0).is_err());
        let side = 1usize << 14;
        assert_eq!(downsampled_size(side, side, 1.0).unwrap(), (side, side));
        assert!(downsampled_size(side, side, 0.5).is_err());
        assert_eq!(side * side, MAX_RASTER_PIXELS);
    }
}
