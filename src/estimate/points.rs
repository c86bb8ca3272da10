//! Closed-form and least-squares fits on point correspondences.
//!
//! The i-th base point corresponds to the i-th point to align. Fits map base
//! coordinates to to-align coordinates, minimising the summed squared
//! residuals.

use nalgebra::{DMatrix, DVector, Vector2};

use super::TransformationType;
use crate::geometry::Point2;
use crate::trace::{trace_event, trace_span};
use crate::transform::AffineTransform2D;
use crate::util::math::near_zero;
use crate::util::{AlignError, AlignResult};

/// Singular values below this fraction of the largest are treated as zero.
const RANK_TOL: f64 = 1e-10;

/// Fits a transform taking `base` onto `to_align`.
///
/// `Affine` solves the full six-parameter least-squares problem and needs at
/// least three non-collinear pairs. `Rigid` fits a similarity (rotation,
/// uniform scale, translation) and needs at least two distinct base points.
pub fn fit_points(
    base: &[Point2],
    to_align: &[Point2],
    transformation_type: TransformationType,
) -> AlignResult<AffineTransform2D> {
    if base.is_empty() && to_align.is_empty() {
        return Err(AlignError::InvalidArgument(
            "no points found for either image".to_string(),
        ));
    }
    if base.len() != to_align.len() {
        return Err(AlignError::InvalidArgument(format!(
            "images have different numbers of annotated points ({} & {})",
            base.len(),
            to_align.len()
        )));
    }

    let _span = trace_span!("fit_points", points = base.len()).entered();
    let fitted = match transformation_type {
        TransformationType::Affine => fit_affine(base, to_align)?,
        TransformationType::Rigid => fit_similarity(base, to_align)?,
    };
    if !fitted.is_finite() || !fitted.is_invertible() {
        return Err(AlignError::DegenerateResult {
            reason: "fitted transform is singular",
        });
    }
    trace_event!("fit_points_done", points = base.len());
    Ok(fitted)
}

fn centroid(points: &[Point2]) -> Vector2<f64> {
    let sum = points
        .iter()
        .fold(Vector2::zeros(), |acc: Vector2<f64>, p| acc + Vector2::new(p.x, p.y));
    sum / points.len() as f64
}

fn fit_affine(base: &[Point2], to_align: &[Point2]) -> AlignResult<AffineTransform2D> {
    if base.len() < 3 {
        return Err(AlignError::DegenerateResult {
            reason: "an affine fit needs at least 3 point pairs",
        });
    }
    let n = base.len();
    // Centre the design matrix to keep it well conditioned.
    let c = centroid(base);
    let a_matrix = DMatrix::from_fn(n, 3, |r, col| match col {
        0 => base[r].x - c.x,
        1 => base[r].y - c.y,
        _ => 1.0,
    });
    let bx = DVector::from_fn(n, |r, _| to_align[r].x);
    let by = DVector::from_fn(n, |r, _| to_align[r].y);

    let svd = a_matrix.svd(true, true);
    let max_sv = svd.singular_values.max();
    let min_sv = svd.singular_values.min();
    if !min_sv.is_finite() || min_sv <= RANK_TOL * max_sv {
        return Err(AlignError::DegenerateResult {
            reason: "base points are collinear",
        });
    }
    let row_x = svd
        .solve(&bx, RANK_TOL)
        .map_err(|_| AlignError::DegenerateResult {
            reason: "least-squares solve failed",
        })?;
    let row_y = svd
        .solve(&by, RANK_TOL)
        .map_err(|_| AlignError::DegenerateResult {
            reason: "least-squares solve failed",
        })?;

    Ok(AffineTransform2D::from_row_major([
        [row_x[0], row_x[1], row_x[2] - row_x[0] * c.x - row_x[1] * c.y],
        [row_y[0], row_y[1], row_y[2] - row_y[0] * c.x - row_y[1] * c.y],
    ]))
}

/// `x' = a x - b y + tx`, `y' = b x + a y + ty` in closed form.
fn fit_similarity(base: &[Point2], to_align: &[Point2]) -> AlignResult<AffineTransform2D> {
    if base.len() < 2 {
        return Err(AlignError::DegenerateResult {
            reason: "a rigid fit needs at least 2 point pairs",
        });
    }
    let cp = centroid(base);
    let cq = centroid(to_align);

    let mut spread = 0.0;
    let mut dot = 0.0;
    let mut cross = 0.0;
    for (p, q) in base.iter().zip(to_align) {
        let p = Vector2::new(p.x, p.y) - cp;
        let q = Vector2::new(q.x, q.y) - cq;
        spread += p.norm_squared();
        dot += p.dot(&q);
        cross += p.perp(&q);
    }
    if near_zero(spread, f64::EPSILON * base.len() as f64) {
        return Err(AlignError::DegenerateResult {
            reason: "base points coincide",
        });
    }
    let a = dot / spread;
    let b = cross / spread;
    let tx = cq.x - (a * cp.x - b * cp.y);
    let ty = cq.y - (b * cp.x + a * cp.y);
    Ok(AffineTransform2D::from_row_major([[a, -b, tx], [b, a, ty]]))
}

#[cfg(test)]
mod tests {
    use super::fit_points;
    use crate::estimate::TransformationType;
    use crate::geometry::Point2;
    use crate::transform::AffineTransform2D;
    use crate::util::AlignError;
    use approx::assert_relative_eq;

    fn pts(raw: &[(f64, f64)]) -> Vec<Point2> {
        raw.iter().map(|&(x, y)| Point2::new(x, y)).collect()
    }

    #[test]
    fn affine_fit_recovers_shear() {
        let truth = AffineTransform2D::from_row_major([[1.2, 0.3, -4.0], [-0.1, 0.9, 7.5]]);
        let base = pts(&[(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (7.0, 3.0), (2.0, 9.0)]);
        let moved = truth.apply_all(&base);
        let fitted = fit_points(&base, &moved, TransformationType::Affine).unwrap();
        for (a, b) in fitted.to_array().iter().zip(truth.to_array()) {
            assert_relative_eq!(*a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn similarity_fit_recovers_rotation_and_scale() {
        let truth = AffineTransform2D::rotation(0.4)
            .pre_concatenate(&AffineTransform2D::scale(1.5, 1.5))
            .pre_concatenate(&AffineTransform2D::translation(3.0, -2.0));
        let base = pts(&[(1.0, 2.0), (8.0, -3.0), (-4.0, 5.0)]);
        let moved = truth.apply_all(&base);
        let fitted = fit_points(&base, &moved, TransformationType::Rigid).unwrap();
        assert!(fitted.approx_eq(&truth, 1e-9));
    }

    #[test]
    fn similarity_fit_ignores_shear() {
        let shear = AffineTransform2D::from_row_major([[1.0, 0.5, 0.0], [0.0, 1.0, 0.0]]);
        let base = pts(&[(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0)]);
        let fitted = fit_points(&base, &shear.apply_all(&base), TransformationType::Rigid).unwrap();
        assert_relative_eq!(fitted.m00(), fitted.m11(), epsilon = 1e-12);
        assert_relative_eq!(fitted.m01(), -fitted.m10(), epsilon = 1e-12);
    }

    #[test]
    fn count_errors_are_argument_errors() {
        assert!(matches!(
            fit_points(&[], &[], TransformationType::Affine),
            Err(AlignError::InvalidArgument(_))
        ));
        let one = pts(&[(1.0, 1.0)]);
        let two = pts(&[(1.0, 1.0), (2.0, 2.0)]);
        assert!(matches!(
            fit_points(&one, &two, TransformationType::Rigid),
            Err(AlignError::InvalidArgument(_))
        ));
    }

    #[test]
    fn degenerate_inputs() {
        let line = pts(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]);
        assert!(matches!(
            fit_points(&line, &line, TransformationType::Affine),
            Err(AlignError::DegenerateResult { .. })
        ));
        let two = pts(&[(0.0, 0.0), (1.0, 0.0)]);
        assert!(matches!(
            fit_points(&two, &two, TransformationType::Affine),
            Err(AlignError::DegenerateResult { .. })
        ));
        let same = pts(&[(3.0, 3.0), (3.0, 3.0)]);
        assert!(matches!(
            fit_points(&same, &same, TransformationType::Rigid),
            Err(AlignError::DegenerateResult { .. })
        ));
    }
}
