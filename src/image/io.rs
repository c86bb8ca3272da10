//! Loading image files as alignment sources.
//!
//! Available when the `image-io` feature is enabled. Color images are reduced
//! to 8-bit luma on load.

use crate::image::OwnedImage;
use crate::source::{InMemoryImage, PixelSize};
use crate::util::{AlignError, AlignResult};
use std::path::Path;

/// Converts a decoded image to an owned grayscale raster.
pub fn gray_from_dynamic(img: &image::DynamicImage) -> AlignResult<OwnedImage> {
    let gray = img.to_luma8();
    let (width, height) = (gray.width() as usize, gray.height() as usize);
    OwnedImage::new(gray.into_raw(), width, height)
}

/// Loads an image from disk as a grayscale raster.
pub fn load_gray_image<P: AsRef<Path>>(path: P) -> AlignResult<OwnedImage> {
    let path = path.as_ref();
    let img = image::open(path).map_err(|err| AlignError::ImageIo {
        reason: format!("{}: {err}", path.display()),
    })?;
    gray_from_dynamic(&img)
}

/// Loads an image from disk as an in-memory source, optionally calibrated.
pub fn load_source<P: AsRef<Path>>(
    path: P,
    pixel_size: Option<PixelSize>,
) -> AlignResult<InMemoryImage> {
    let source = InMemoryImage::new(load_gray_image(path)?);
    Ok(match pixel_size {
        Some(size) => source.with_pixel_size(size),
        None => source,
    })
}
