//! Observable transform of one image shown in a reference viewer.
//!
//! A [`TransformState`] owns the affine transform placing a target image in
//! the coordinate space of a reference image, together with a best-effort
//! inverse. All mutations are all-or-nothing: on error the stored transform
//! is untouched and no listener is called. Each successful mutation notifies
//! every subscribed listener exactly once, synchronously, in subscription
//! order.
//!
//! Listeners are held as `Rc`, so a state is confined to the thread that
//! created it.

pub mod roi;

use std::rc::Rc;

use crate::annotation::Annotation;
use crate::estimate::{AlignmentImage, AlignmentRequest, AlignmentType, Estimator, TransformationType};
use crate::geometry::Roi;
use crate::source::{ImageSource, PixelSize};
use crate::trace::{trace_event, trace_warn};
use crate::transform::AffineTransform2D;
use crate::util::{AlignError, AlignResult};

pub use roi::{map_annotations, map_roi, SHAPE_TOLERANCE};

/// Physical pixel sizes of the target and reference images.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Calibration {
    pub target: Option<PixelSize>,
    pub reference: Option<PixelSize>,
}

impl Calibration {
    /// Reads the pixel sizes of two image sources.
    pub fn from_sources(target: &dyn ImageSource, reference: &dyn ImageSource) -> Self {
        Self {
            target: target.pixel_size(),
            reference: reference.pixel_size(),
        }
    }

    /// Scale from target pixels to reference pixels, or the identity when
    /// either side is uncalibrated.
    pub fn initial_transform(&self) -> AffineTransform2D {
        match (self.target, self.reference) {
            (Some(target), Some(reference)) if target.is_usable() && reference.is_usable() => {
                AffineTransform2D::scale(
                    reference.width / target.width,
                    reference.height / target.height,
                )
            }
            _ => AffineTransform2D::identity(),
        }
    }
}

/// Payload of a change notification.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformChanged {
    pub previous: AffineTransform2D,
    pub current: AffineTransform2D,
}

/// Callback invoked after each committed change.
pub type TransformListener = Rc<dyn Fn(&TransformChanged)>;

/// Mutable, observable transform for one target/reference pairing.
pub struct TransformState {
    transform: AffineTransform2D,
    inverse: AffineTransform2D,
    inverse_stale: bool,
    calibration: Calibration,
    listeners: Vec<TransformListener>,
}

impl std::fmt::Debug for TransformState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformState")
            .field("transform", &self.transform)
            .field("inverse", &self.inverse)
            .field("inverse_stale", &self.inverse_stale)
            .field("calibration", &self.calibration)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl TransformState {
    /// Creates a state initialised from the calibration.
    pub fn new(calibration: Calibration) -> Self {
        let transform = calibration.initial_transform();
        let (inverse, inverse_stale) = match transform.inverse() {
            Ok(inverse) => (inverse, false),
            Err(_) => (AffineTransform2D::identity(), true),
        };
        Self {
            transform,
            inverse,
            inverse_stale,
            calibration,
            listeners: Vec::new(),
        }
    }

    /// Creates a state for `target` displayed over `reference`.
    pub fn for_images(target: &dyn ImageSource, reference: &dyn ImageSource) -> Self {
        Self::new(Calibration::from_sources(target, reference))
    }

    /// Current transform.
    pub fn transform(&self) -> AffineTransform2D {
        self.transform
    }

    /// Inverse of the last invertible transform.
    ///
    /// When the current transform is singular this is stale; see
    /// [`is_inverse_stale`](Self::is_inverse_stale).
    pub fn inverse(&self) -> AffineTransform2D {
        self.inverse
    }

    pub fn is_inverse_stale(&self) -> bool {
        self.inverse_stale
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    /// Replaces the reference pixel size used by [`reset`](Self::reset).
    ///
    /// The current transform is left as is.
    pub fn set_reference_calibration(&mut self, reference: Option<PixelSize>) {
        self.calibration.reference = reference;
    }

    /// Registers a listener. Registering the same `Rc` twice has no effect.
    pub fn subscribe(&mut self, listener: TransformListener) {
        if !self.listeners.iter().any(|l| Rc::ptr_eq(l, &listener)) {
            self.listeners.push(listener);
        }
    }

    /// Removes a listener; unknown listeners are ignored.
    pub fn unsubscribe(&mut self, listener: &TransformListener) {
        self.listeners.retain(|l| !Rc::ptr_eq(l, listener));
    }

    /// Sets the matrix directly, parameters in column order.
    pub fn set_matrix(
        &mut self,
        m00: f64,
        m10: f64,
        m01: f64,
        m11: f64,
        m02: f64,
        m12: f64,
    ) -> AlignResult<()> {
        let transform = AffineTransform2D::new(m00, m10, m01, m11, m02, m12);
        if !transform.is_finite() {
            return Err(AlignError::InvalidInput("matrix components must be finite"));
        }
        self.commit(transform);
        Ok(())
    }

    /// Post-multiplies by a translation of `(dx, dy)`.
    pub fn translate(&mut self, dx: f64, dy: f64) -> AlignResult<()> {
        if !dx.is_finite() || !dy.is_finite() {
            return Err(AlignError::InvalidInput("translation must be finite"));
        }
        self.commit(
            self.transform
                .concatenate(&AffineTransform2D::translation(dx, dy)),
        );
        Ok(())
    }

    /// Post-multiplies by a rotation of `theta` radians about the anchor.
    pub fn rotate(&mut self, theta: f64, anchor_x: f64, anchor_y: f64) -> AlignResult<()> {
        if !theta.is_finite() || !anchor_x.is_finite() || !anchor_y.is_finite() {
            return Err(AlignError::InvalidInput("rotation and anchor must be finite"));
        }
        self.commit(
            self.transform
                .concatenate(&AffineTransform2D::rotation_about(theta, anchor_x, anchor_y)),
        );
        Ok(())
    }

    /// Replaces the transform with its inverse.
    pub fn invert(&mut self) -> AlignResult<()> {
        let inverse = self.transform.inverse()?;
        self.commit(inverse);
        Ok(())
    }

    /// Restores the calibration-derived initial transform.
    pub fn reset(&mut self) {
        self.commit(self.calibration.initial_transform());
    }

    /// Runs the estimator from the current transform and commits its result.
    ///
    /// `target` is the image this state positions; `base` is the reference.
    pub fn align_automatically(
        &mut self,
        base: AlignmentImage<'_>,
        target: AlignmentImage<'_>,
        alignment_type: AlignmentType,
        transformation_type: TransformationType,
        downsample: f64,
    ) -> AlignResult<AffineTransform2D> {
        self.align_automatically_with(
            &Estimator::new(),
            base,
            target,
            alignment_type,
            transformation_type,
            downsample,
        )
    }

    /// Same as [`align_automatically`](Self::align_automatically) with an explicit estimator.
    pub fn align_automatically_with(
        &mut self,
        estimator: &Estimator,
        base: AlignmentImage<'_>,
        target: AlignmentImage<'_>,
        alignment_type: AlignmentType,
        transformation_type: TransformationType,
        downsample: f64,
    ) -> AlignResult<AffineTransform2D> {
        let request = AlignmentRequest::new(base, target, alignment_type, transformation_type)
            .with_initial(self.transform)
            .with_downsample(downsample);
        let estimated = estimator.estimate(&request)?;
        self.commit(estimated);
        Ok(estimated)
    }

    /// Maps a ROI through the current transform.
    pub fn transform_roi(&self, roi: &Roi) -> Roi {
        map_roi(&self.transform, roi)
    }

    /// Maps annotations through the current transform, keeping their metadata.
    pub fn transform_annotations(&self, annotations: &[Annotation]) -> Vec<Annotation> {
        map_annotations(&self.transform, annotations)
    }

    fn commit(&mut self, transform: AffineTransform2D) {
        let previous = self.transform;
        self.transform = transform;
        match transform.inverse() {
            Ok(inverse) => {
                self.inverse = inverse;
                self.inverse_stale = false;
            }
            Err(_) => {
                self.inverse_stale = true;
                trace_warn!(
                    "transform is not invertible; keeping the previous inverse",
                    determinant = transform.determinant()
                );
            }
        }
        trace_event!("transform_committed", listeners = self.listeners.len());

        let change = TransformChanged {
            previous,
            current: transform,
        };
        for listener in &self.listeners {
            listener(&change);
        }
    }
}
