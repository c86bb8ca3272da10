//! Grayscale raster provider.

use crate::image::OwnedImage;
use crate::source::ImageSource;
use crate::trace::trace_event;
use crate::util::AlignResult;

/// Reads the full extent of `source` at `downsample`.
pub fn read_grayscale(source: &dyn ImageSource, downsample: f64) -> AlignResult<OwnedImage> {
    let raster = source.read_full(downsample)?;
    trace_event!(
        "read_grayscale",
        width = raster.width(),
        height = raster.height(),
        downsample = downsample
    );
    Ok(raster)
}
