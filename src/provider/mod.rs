//! Providers turning image sources and annotations into estimator inputs.
//!
//! - `raster`: full-extent grayscale rasters at a downsample.
//! - `labels`: shared classification labels and label rasters.
//! - `points`: ordered landmark points from non-area annotations.

pub mod labels;
pub mod points;
pub mod raster;

pub use labels::{rasterize_labels, LabelMap, BACKGROUND_LABEL, UNCLASSIFIED_LABEL};
pub use points::collect_landmarks;
pub use raster::read_grayscale;
