//! Mapping ROIs through an affine transform.

use crate::annotation::Annotation;
use crate::geometry::{roi_from_outline, Outline, Roi};
use crate::transform::AffineTransform2D;

/// Simplification tolerance applied when rebuilding mapped shapes.
pub const SHAPE_TOLERANCE: f64 = 0.5;

/// Maps `roi` through `transform`.
///
/// Points are mapped one by one. Rectangles and ellipses keep their kind
/// under transforms without rotation or shear; every other shape is mapped
/// through its outline and rebuilt with [`SHAPE_TOLERANCE`].
pub fn map_roi(transform: &AffineTransform2D, roi: &Roi) -> Roi {
    match roi {
        Roi::Points(points) => Roi::Points(transform.apply_all(points)),
        Roi::Rectangle {
            x,
            y,
            width,
            height,
        } if transform.preserves_axes() => {
            let (x, y, width, height) = map_box(transform, *x, *y, *width, *height);
            Roi::Rectangle {
                x,
                y,
                width,
                height,
            }
        }
        Roi::Ellipse {
            x,
            y,
            width,
            height,
        } if transform.preserves_axes() => {
            let (x, y, width, height) = map_box(transform, *x, *y, *width, *height);
            Roi::Ellipse {
                x,
                y,
                width,
                height,
            }
        }
        _ => {
            let outline = roi.outline();
            let mapped = Outline {
                vertices: transform.apply_all(&outline.vertices),
                closed: outline.closed,
            };
            roi_from_outline(mapped, SHAPE_TOLERANCE)
        }
    }
}

/// Maps every annotation, keeping classification and name.
pub fn map_annotations(transform: &AffineTransform2D, annotations: &[Annotation]) -> Vec<Annotation> {
    annotations
        .iter()
        .map(|annotation| Annotation {
            roi: map_roi(transform, &annotation.roi),
            classification: annotation.classification.clone(),
            name: annotation.name.clone(),
        })
        .collect()
}

fn map_box(transform: &AffineTransform2D, x: f64, y: f64, w: f64, h: f64) -> (f64, f64, f64, f64) {
    let x0 = transform.m00() * x + transform.m02();
    let x1 = transform.m00() * (x + w) + transform.m02();
    let y0 = transform.m11() * y + transform.m12();
    let y1 = transform.m11() * (y + h) + transform.m12();
    (x0.min(x1), y0.min(y1), (x1 - x0).abs(), (y1 - y0).abs())
}

#[cfg(test)]
mod tests {
    use super::{map_annotations, map_roi};
    use crate::annotation::{Annotation, Classification};
    use crate::geometry::{Point2, Roi};
    use crate::transform::AffineTransform2D;

    #[test]
    fn identity_keeps_points_lines_and_rectangles() {
        let id = AffineTransform2D::identity();
        let rois = [
            Roi::Points(vec![Point2::new(1.5, 2.0), Point2::new(-3.0, 4.25)]),
            Roi::Line {
                start: Point2::new(0.0, 0.0),
                end: Point2::new(10.0, 5.0),
            },
            Roi::Rectangle {
                x: 2.0,
                y: 3.0,
                width: 4.0,
                height: 5.0,
            },
        ];
        for roi in rois {
            assert_eq!(map_roi(&id, &roi), roi);
        }
    }

    #[test]
    fn translation_moves_line() {
        let t = AffineTransform2D::translation(3.0, -1.0);
        let line = Roi::Line {
            start: Point2::new(0.0, 0.0),
            end: Point2::new(10.0, 5.0),
        };
        assert_eq!(
            map_roi(&t, &line),
            Roi::Line {
                start: Point2::new(3.0, -1.0),
                end: Point2::new(13.0, 4.0),
            }
        );
    }

    #[test]
    fn flip_keeps_rectangle_normalised() {
        let flip = AffineTransform2D::scale(-2.0, 1.0);
        let rect = Roi::Rectangle {
            x: 1.0,
            y: 1.0,
            width: 3.0,
            height: 2.0,
        };
        assert_eq!(
            map_roi(&flip, &rect),
            Roi::Rectangle {
                x: -8.0,
                y: 1.0,
                width: 6.0,
                height: 2.0,
            }
        );
    }

    #[test]
    fn rotated_rectangle_becomes_polygon() {
        let r = AffineTransform2D::rotation(0.3);
        let rect = Roi::Rectangle {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
        };
        match map_roi(&r, &rect) {
            Roi::Polygon(vertices) => assert_eq!(vertices.len(), 4),
            other => panic!("expected polygon, got {other:?}"),
        }
    }

    #[test]
    fn quarter_turn_keeps_rectangle() {
        let r = AffineTransform2D::rotation(std::f64::consts::FRAC_PI_2);
        let rect = Roi::Rectangle {
            x: 0.0,
            y: 0.0,
            width: 4.0,
            height: 2.0,
        };
        let mapped = map_roi(&r, &rect);
        assert_eq!(mapped.bounds(), Some((-2.0, 0.0, 0.0, 4.0)));
    }

    #[test]
    fn annotations_keep_metadata() {
        let annotations = vec![Annotation::classified(
            Roi::Points(vec![Point2::new(1.0, 1.0)]),
            Classification::new("Landmark"),
        )
        .with_name("first")];
        let mapped = map_annotations(&AffineTransform2D::translation(1.0, 2.0), &annotations);
        assert_eq!(mapped[0].roi, Roi::Points(vec![Point2::new(2.0, 3.0)]));
        assert_eq!(mapped[0].classification, annotations[0].classification);
        assert_eq!(mapped[0].name.as_deref(), Some("first"));
    }
}
