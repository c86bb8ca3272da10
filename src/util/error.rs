//! Error types for imgalign.

use thiserror::Error;

/// Result alias for imgalign operations.
pub type AlignResult<T> = std::result::Result<T, AlignError>;

/// Errors that can occur while estimating or editing alignment transforms.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum AlignError {
    /// The input data or parameters are invalid.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Image dimensions are zero or overflow.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// Row stride is smaller than the row width.
    #[error("invalid stride {stride} for width {width}")]
    InvalidStride { width: usize, stride: usize },
    /// Backing buffer is shorter than the declared geometry requires.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// A requested region does not fit inside the image.
    #[error(
        "region ({x}, {y}, {width}x{height}) out of bounds for image {img_width}x{img_height}"
    )]
    RoiOutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        img_width: usize,
        img_height: usize,
    },
    /// Alignment inputs are mismatched or missing.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The iterative correlation did not converge.
    #[error("no convergence after {iterations} iterations: {reason}")]
    Convergence { iterations: usize, reason: String },
    /// A fitted transform is singular or otherwise unusable.
    #[error("degenerate result: {reason}")]
    DegenerateResult { reason: &'static str },
    /// The transform cannot be inverted.
    #[error("transform is not invertible (determinant {determinant:e})")]
    NonInvertible { determinant: f64 },
    /// Text could not be parsed as a transform.
    #[error("cannot parse transform at line {line}: {reason}")]
    TransformParse { line: usize, reason: String },
    /// Image decoding failed.
    #[cfg(feature = "image-io")]
    #[error("image io error: {reason}")]
    ImageIo { reason: String },
}
