//! Landmark point provider.

use crate::annotation::Annotation;
use crate::geometry::Point2;

/// Collects the vertices of every non-area annotation, in iteration order.
///
/// Point sets contribute all their points; lines and polylines contribute
/// their vertices. Area annotations are skipped.
pub fn collect_landmarks(annotations: &[Annotation]) -> Vec<Point2> {
    annotations
        .iter()
        .filter(|annotation| !annotation.roi.is_area())
        .flat_map(|annotation| annotation.roi.all_points())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::collect_landmarks;
    use crate::annotation::Annotation;
    use crate::geometry::{Point2, Roi};

    #[test]
    fn keeps_order_and_skips_areas() {
        let annotations = vec![
            Annotation::new(Roi::Points(vec![Point2::new(1.0, 2.0), Point2::new(3.0, 4.0)])),
            Annotation::new(Roi::Rectangle {
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
            }),
            Annotation::new(Roi::Line {
                start: Point2::new(5.0, 6.0),
                end: Point2::new(7.0, 8.0),
            }),
        ];
        assert_eq!(
            collect_landmarks(&annotations),
            vec![
                Point2::new(1.0, 2.0),
                Point2::new(3.0, 4.0),
                Point2::new(5.0, 6.0),
                Point2::new(7.0, 8.0),
            ]
        );
    }
}
