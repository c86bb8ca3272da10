//! Image source boundary.
//!
//! The estimator only needs the size of an image, its optional physical pixel
//! size, and the ability to read a region at a given downsample. File formats
//! and storage stay behind the `ImageSource` trait.

use crate::image::resample::downsample_area;
use crate::image::OwnedImage;
use crate::util::{AlignError, AlignResult};

/// Physical size of one pixel, in micrometres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelSize {
    pub width: f64,
    pub height: f64,
}

impl PixelSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Returns true when both components are finite and positive.
    pub fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    /// Mean of the width and height.
    pub fn averaged(&self) -> f64 {
        (self.width + self.height) * 0.5
    }
}

/// Read access to a 2D grayscale image.
pub trait ImageSource: Send + Sync {
    /// Full-resolution width in pixels.
    fn width(&self) -> usize;

    /// Full-resolution height in pixels.
    fn height(&self) -> usize;

    /// Physical pixel size, if calibrated.
    fn pixel_size(&self) -> Option<PixelSize>;

    /// Reads the full-resolution region `(x, y, w, h)` resampled by `downsample`.
    ///
    /// The result is `max(1, floor(w / downsample))` by
    /// `max(1, floor(h / downsample))` pixels.
    fn read_region(
        &self,
        downsample: f64,
        x: usize,
        y: usize,
        w: usize,
        h: usize,
    ) -> AlignResult<OwnedImage>;

    /// Reads the whole image at `downsample`.
    fn read_full(&self, downsample: f64) -> AlignResult<OwnedImage> {
        self.read_region(downsample, 0, 0, self.width(), self.height())
    }
}

/// An image source backed by an in-memory grayscale buffer.
#[derive(Clone, Debug)]
pub struct InMemoryImage {
    pixels: OwnedImage,
    pixel_size: Option<PixelSize>,
}

impl InMemoryImage {
    /// Wraps an owned grayscale image without calibration.
    pub fn new(pixels: OwnedImage) -> Self {
        Self {
            pixels,
            pixel_size: None,
        }
    }

    /// Builds a source from a contiguous row-major buffer.
    pub fn from_vec(data: Vec<u8>, width: usize, height: usize) -> AlignResult<Self> {
        Ok(Self::new(OwnedImage::new(data, width, height)?))
    }

    /// Attaches a physical pixel size.
    pub fn with_pixel_size(mut self, pixel_size: PixelSize) -> Self {
        self.pixel_size = Some(pixel_size);
        self
    }

    /// Returns the backing pixels.
    pub fn pixels(&self) -> &OwnedImage {
        &self.pixels
    }
}

impl ImageSource for InMemoryImage {
    fn width(&self) -> usize {
        self.pixels.width()
    }

    fn height(&self) -> usize {
        self.pixels.height()
    }

    fn pixel_size(&self) -> Option<PixelSize> {
        self.pixel_size
    }

    fn read_region(
        &self,
        downsample: f64,
        x: usize,
        y: usize,
        w: usize,
        h: usize,
    ) -> AlignResult<OwnedImage> {
        if !downsample.is_finite() || downsample <= 0.0 {
            return Err(AlignError::InvalidInput("downsample must be finite and > 0"));
        }
        let region = self.pixels.view().roi(x, y, w, h)?;
        downsample_area(region, downsample)
    }
}
