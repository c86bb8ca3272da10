//! Image views and owned raster buffers.
//!
//! `ImageView` is a borrowed 2D view into a 1D buffer with an explicit stride.
//! The stride counts elements between the starts of consecutive rows, so a
//! stride larger than the width represents padded rows. ROI slices are zero-copy
//! views into the same backing slice and retain the original stride.
//!
//! `OwnedImage` is the contiguous buffer handed across the image source
//! boundary and used internally for filtered and warped rasters.

use crate::util::{AlignError, AlignResult};

#[cfg(feature = "image-io")]
pub mod io;
pub mod resample;

/// Borrowed 2D image view with an explicit stride.
#[derive(Copy, Clone, Debug)]
pub struct ImageView<'a, T> {
    data: &'a [T],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a, T> ImageView<'a, T> {
    /// Creates a contiguous view with `stride == width`.
    pub fn from_slice(data: &'a [T], width: usize, height: usize) -> AlignResult<Self> {
        Self::new(data, width, height, width)
    }

    /// Creates a view with an explicit stride.
    pub fn new(data: &'a [T], width: usize, height: usize, stride: usize) -> AlignResult<Self> {
        let needed = required_len(width, height, stride)?;
        if data.len() < needed {
            return Err(AlignError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the stride in elements between row starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the backing slice including any row padding.
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// Returns the element at `(x, y)` if it is within bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<&'a T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y.checked_mul(self.stride)?.checked_add(x)?;
        self.data.get(idx)
    }

    /// Returns a contiguous slice for row `y` with length `width`.
    pub fn row(&self, y: usize) -> Option<&'a [T]> {
        if y >= self.height {
            return None;
        }
        let start = y.checked_mul(self.stride)?;
        let end = start.checked_add(self.width)?;
        self.data.get(start..end)
    }

    /// Returns a zero-copy ROI view into the same backing buffer.
    pub fn roi(&self, x: usize, y: usize, width: usize, height: usize) -> AlignResult<Self> {
        if width == 0 || height == 0 {
            return Err(AlignError::InvalidDimensions { width, height });
        }

        let out_of_bounds = AlignError::RoiOutOfBounds {
            x,
            y,
            width,
            height,
            img_width: self.width,
            img_height: self.height,
        };
        let end_x = x.checked_add(width).ok_or_else(|| out_of_bounds.clone())?;
        let end_y = y.checked_add(height).ok_or_else(|| out_of_bounds.clone())?;
        if end_x > self.width || end_y > self.height {
            return Err(out_of_bounds);
        }

        let start = y
            .checked_mul(self.stride)
            .and_then(|v| v.checked_add(x))
            .ok_or(AlignError::InvalidDimensions {
                width: self.width,
                height: self.height,
            })?;
        let data = self.data.get(start..).ok_or(AlignError::BufferTooSmall {
            needed: start.saturating_add(1),
            got: self.data.len(),
        })?;

        ImageView::new(data, width, height, self.stride)
    }
}

impl<T: Copy> ImageView<'_, T> {
    /// Copies the view into a contiguous owned image.
    pub fn to_owned_image(&self) -> OwnedImage<T> {
        let mut data = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            let start = y * self.stride;
            data.extend_from_slice(&self.data[start..start + self.width]);
        }
        OwnedImage {
            data,
            width: self.width,
            height: self.height,
        }
    }
}

/// Owned contiguous image buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct OwnedImage<T = u8> {
    data: Vec<T>,
    width: usize,
    height: usize,
}

impl<T> OwnedImage<T> {
    /// Wraps a contiguous row-major buffer of exactly `width * height` samples.
    pub fn new(data: Vec<T>, width: usize, height: usize) -> AlignResult<Self> {
        let needed = required_len(width, height, width)?;
        if data.len() < needed {
            return Err(AlignError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        if data.len() > needed {
            return Err(AlignError::InvalidDimensions { width, height });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Returns a borrowed view of the image.
    pub fn view(&self) -> ImageView<'_, T> {
        ImageView {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.width,
        }
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the row-major pixel buffer.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Consumes the image and returns its buffer.
    pub fn into_data(self) -> Vec<T> {
        self.data
    }
}

impl<T: Copy> OwnedImage<T> {
    /// Creates an image filled with `value`.
    pub fn filled(width: usize, height: usize, value: T) -> AlignResult<Self> {
        let needed = required_len(width, height, width)?;
        Ok(Self {
            data: vec![value; needed],
            width,
            height,
        })
    }

    /// Returns a new image with `f` applied to every sample.
    pub fn map<U, F: Fn(T) -> U>(&self, f: F) -> OwnedImage<U> {
        OwnedImage {
            data: self.data.iter().map(|&v| f(v)).collect(),
            width: self.width,
            height: self.height,
        }
    }
}

fn required_len(width: usize, height: usize, stride: usize) -> AlignResult<usize> {
    if width == 0 || height == 0 {
        return Err(AlignError::InvalidDimensions { width, height });
    }
    if stride < width {
        return Err(AlignError::InvalidStride { width, stride });
    }
    (height - 1)
        .checked_mul(stride)
        .and_then(|v| v.checked_add(width))
        .ok_or(AlignError::InvalidDimensions { width, height })
}
