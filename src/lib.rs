//! imgalign estimates 2D affine transforms between pairs of images.
//!
//! Three correspondence signals are supported: grayscale intensity and
//! rasterized area annotations (both through an ECC optimiser), and point
//! annotations (least-squares fits). [`TransformState`] keeps an observable
//! transform for interactive editing and maps ROIs through it.
//!
//! Optional features: `rayon` (row-parallel ECC), `simd` (`wide` reductions),
//! `image-io` (file loading) and `tracing` (spans and events).

pub mod annotation;
pub mod estimate;
pub mod geometry;
pub mod image;
pub mod kernel;
pub mod provider;
pub mod source;
pub mod state;
pub mod transform;
pub mod util;

mod trace;

pub use annotation::{Annotation, Classification};
pub use estimate::{
    downsample_for_pixel_size, estimate, AlignmentImage, AlignmentRequest, AlignmentType,
    EccConfig, Estimator, TransformationType,
};
pub use geometry::{Point2, Roi};
pub use image::{ImageView, OwnedImage};
pub use source::{ImageSource, InMemoryImage, PixelSize};
pub use state::{Calibration, TransformChanged, TransformListener, TransformState};
pub use transform::text::{format_transform, parse_transform};
pub use transform::AffineTransform2D;
pub use util::{AlignError, AlignResult};
