//! Transform estimation between two images.
//!
//! An [`AlignmentRequest`] names a base image, an image to align, the signal
//! used to correlate them ([`AlignmentType`]) and the family of transforms to
//! fit ([`TransformationType`]). The estimated transform maps base
//! coordinates onto the image to align, in full-resolution pixels.
//!
//! Raster strategies (intensity and area labels) run the ECC optimiser at a
//! downsampled resolution; point strategies fit correspondences directly.
//!
//! ```no_run
//! use imgalign::{
//!     AlignmentImage, AlignmentRequest, AlignmentType, Estimator, InMemoryImage,
//!     TransformationType,
//! };
//!
//! # fn main() -> Result<(), imgalign::AlignError> {
//! let base = InMemoryImage::from_vec(vec![0u8; 64 * 64], 64, 64)?;
//! let moved = InMemoryImage::from_vec(vec![0u8; 64 * 64], 64, 64)?;
//! let request = AlignmentRequest::new(
//!     AlignmentImage::new(&base),
//!     AlignmentImage::new(&moved),
//!     AlignmentType::Intensity,
//!     TransformationType::Rigid,
//! )
//! .with_downsample(2.0);
//! let transform = Estimator::new().estimate(&request)?;
//! println!("{transform}");
//! # Ok(())
//! # }
//! ```

pub mod ecc;
pub mod points;

pub use ecc::{find_transform_ecc, EccConfig, EccOutcome, MotionModel};
pub use points::fit_points;

use crate::annotation::Annotation;
use crate::image::OwnedImage;
use crate::provider::{collect_landmarks, rasterize_labels, read_grayscale, LabelMap};
use crate::source::{ImageSource, PixelSize};
use crate::trace::{trace_event, trace_span};
use crate::transform::AffineTransform2D;
use crate::util::{AlignError, AlignResult};

/// Signal used to correlate the two images.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AlignmentType {
    /// Grayscale pixel intensities.
    Intensity,
    /// Area annotations rasterized to classification labels.
    AreaAnnotations,
    /// Points and line vertices of non-area annotations.
    PointAnnotations,
}

/// Family of transforms to estimate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransformationType {
    /// Full six-parameter affine transform.
    Affine,
    /// Rotation and translation (plus uniform scale for point fits).
    Rigid,
}

impl TransformationType {
    fn motion_model(self) -> MotionModel {
        match self {
            TransformationType::Affine => MotionModel::Affine,
            TransformationType::Rigid => MotionModel::Euclidean,
        }
    }
}

/// One side of an alignment: an image and its annotations.
#[derive(Clone, Copy)]
pub struct AlignmentImage<'a> {
    pub source: &'a dyn ImageSource,
    pub annotations: &'a [Annotation],
}

impl<'a> AlignmentImage<'a> {
    /// An image without annotations.
    pub fn new(source: &'a dyn ImageSource) -> Self {
        Self {
            source,
            annotations: &[],
        }
    }

    pub fn with_annotations(mut self, annotations: &'a [Annotation]) -> Self {
        self.annotations = annotations;
        self
    }
}

impl std::fmt::Debug for AlignmentImage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignmentImage")
            .field("width", &self.source.width())
            .field("height", &self.source.height())
            .field("annotations", &self.annotations.len())
            .finish()
    }
}

/// Inputs of one estimation.
#[derive(Clone, Copy, Debug)]
pub struct AlignmentRequest<'a> {
    pub base: AlignmentImage<'a>,
    pub to_align: AlignmentImage<'a>,
    /// Starting transform for the raster strategies; identity when `None`.
    pub initial: Option<AffineTransform2D>,
    pub alignment_type: AlignmentType,
    pub transformation_type: TransformationType,
    /// Resolution divisor for the raster strategies.
    pub downsample: f64,
}

impl<'a> AlignmentRequest<'a> {
    /// Creates a request with no initial transform and a downsample of 1.
    pub fn new(
        base: AlignmentImage<'a>,
        to_align: AlignmentImage<'a>,
        alignment_type: AlignmentType,
        transformation_type: TransformationType,
    ) -> Self {
        Self {
            base,
            to_align,
            initial: None,
            alignment_type,
            transformation_type,
            downsample: 1.0,
        }
    }

    pub fn with_initial(mut self, initial: AffineTransform2D) -> Self {
        self.initial = Some(initial);
        self
    }

    pub fn with_downsample(mut self, downsample: f64) -> Self {
        self.downsample = downsample;
        self
    }
}

/// Transform estimator.
#[derive(Clone, Debug, Default)]
pub struct Estimator {
    config: EccConfig,
}

impl Estimator {
    /// Creates an estimator with the default ECC configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the ECC configuration.
    pub fn with_config(mut self, config: EccConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EccConfig {
        &self.config
    }

    /// Estimates the transform mapping base coordinates onto the image to align.
    pub fn estimate(&self, request: &AlignmentRequest<'_>) -> AlignResult<AffineTransform2D> {
        let _span = trace_span!(
            "estimate",
            alignment = ?request.alignment_type,
            transformation = ?request.transformation_type
        )
        .entered();

        let transform = match request.alignment_type {
            AlignmentType::Intensity => {
                let downsample = checked_downsample(request.downsample)?;
                let base = read_grayscale(request.base.source, downsample)?;
                let to_align = read_grayscale(request.to_align.source, downsample)?;
                self.estimate_rasters(&base, &to_align, request, downsample)?
            }
            AlignmentType::AreaAnnotations => {
                let downsample = checked_downsample(request.downsample)?;
                let labels = LabelMap::from_annotations(
                    request.base.annotations,
                    request.to_align.annotations,
                )?;
                let base = label_raster(&request.base, &labels, downsample)?;
                let to_align = label_raster(&request.to_align, &labels, downsample)?;
                self.estimate_rasters(&base, &to_align, request, downsample)?
            }
            AlignmentType::PointAnnotations => {
                let base = collect_landmarks(request.base.annotations);
                let to_align = collect_landmarks(request.to_align.annotations);
                trace_event!(
                    "landmarks",
                    base = base.len(),
                    to_align = to_align.len()
                );
                fit_points(&base, &to_align, request.transformation_type)?
            }
        };
        Ok(transform)
    }

    fn estimate_rasters(
        &self,
        base: &OwnedImage,
        to_align: &OwnedImage,
        request: &AlignmentRequest<'_>,
        downsample: f64,
    ) -> AlignResult<AffineTransform2D> {
        trace_event!(
            "rasters",
            base_width = base.width(),
            base_height = base.height(),
            to_align_width = to_align.width(),
            to_align_height = to_align.height()
        );
        let initial = request.initial.unwrap_or_default();
        let (tx, ty) = initial.translation_components();
        let seed = initial.with_translation(tx / downsample, ty / downsample);

        let outcome = find_transform_ecc(
            base.view(),
            to_align.view(),
            seed,
            request.transformation_type.motion_model(),
            &self.config,
        )?;
        trace_event!(
            "ecc_result",
            iterations = outcome.iterations,
            correlation = outcome.correlation
        );
        let (tx, ty) = outcome.warp.translation_components();
        Ok(outcome.warp.with_translation(tx * downsample, ty * downsample))
    }
}

/// Estimates a transform with the default configuration.
pub fn estimate(request: &AlignmentRequest<'_>) -> AlignResult<AffineTransform2D> {
    Estimator::new().estimate(request)
}

/// Downsample that brings the base image to `requested_um` micrometres per pixel.
///
/// A request `<= 0` means full resolution. Fails when the base image has no
/// usable pixel size.
pub fn downsample_for_pixel_size(
    requested_um: f64,
    base_pixel_size: Option<PixelSize>,
) -> AlignResult<f64> {
    if !requested_um.is_finite() {
        return Err(AlignError::InvalidArgument(format!(
            "requested pixel size must be finite, got {requested_um}"
        )));
    }
    if requested_um <= 0.0 {
        return Ok(1.0);
    }
    match base_pixel_size {
        Some(size) if size.is_usable() => Ok(requested_um / size.averaged()),
        _ => Err(AlignError::InvalidArgument(
            "base image has no usable pixel size".to_string(),
        )),
    }
}

fn checked_downsample(downsample: f64) -> AlignResult<f64> {
    if downsample.is_finite() && downsample > 0.0 {
        Ok(downsample)
    } else {
        Err(AlignError::InvalidArgument(format!(
            "downsample must be finite and > 0, got {downsample}"
        )))
    }
}

fn label_raster(
    image: &AlignmentImage<'_>,
    labels: &LabelMap,
    downsample: f64,
) -> AlignResult<OwnedImage> {
    rasterize_labels(
        image.source.width(),
        image.source.height(),
        image.annotations,
        labels,
        downsample,
    )
}
