//! Planar geometry carried by annotations.
//!
//! A `Roi` is one of a small set of shapes in image pixel coordinates. Area
//! shapes (`Rectangle`, `Ellipse`, `Polygon`) enclose pixels and drive label
//! rasterization; the others (`Points`, `Line`, `Polyline`) are landmarks.

mod simplify;

pub use simplify::simplify_polyline;

/// A 2D point in pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: Point2) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<(f64, f64)> for Point2 {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Region of interest geometry.
#[derive(Clone, Debug, PartialEq)]
pub enum Roi {
    /// An ordered set of landmark points.
    Points(Vec<Point2>),
    /// A straight segment.
    Line { start: Point2, end: Point2 },
    /// An open chain of segments.
    Polyline(Vec<Point2>),
    /// Axis-aligned rectangle with top-left corner `(x, y)`.
    Rectangle {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    /// Axis-aligned ellipse inscribed in the given bounds.
    Ellipse {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    /// A closed polygon; the closing edge is implicit.
    Polygon(Vec<Point2>),
}

/// Closed or open vertex chain describing a ROI outline.
#[derive(Clone, Debug, PartialEq)]
pub struct Outline {
    pub vertices: Vec<Point2>,
    pub closed: bool,
}

/// Maximum deviation of a flattened ellipse from the true curve.
const ELLIPSE_FLATNESS: f64 = 0.25;

impl Roi {
    /// Returns true for point-set ROIs.
    pub fn is_point(&self) -> bool {
        matches!(self, Roi::Points(_))
    }

    /// Returns true for ROIs that enclose an area.
    pub fn is_area(&self) -> bool {
        matches!(
            self,
            Roi::Rectangle { .. } | Roi::Ellipse { .. } | Roi::Polygon(_)
        )
    }

    /// Returns true for open landmark shapes (segments and chains).
    pub fn is_line(&self) -> bool {
        matches!(self, Roi::Line { .. } | Roi::Polyline(_))
    }

    /// Returns the defining vertices in order.
    ///
    /// Rectangles yield their four corners clockwise from the top-left (in
    /// image coordinates, y down); ellipses yield their flattened outline.
    pub fn all_points(&self) -> Vec<Point2> {
        match self {
            Roi::Points(points) | Roi::Polyline(points) | Roi::Polygon(points) => points.clone(),
            Roi::Line { start, end } => vec![*start, *end],
            _ => self.outline().vertices,
        }
    }

    /// Returns the outline used when mapping the shape through a transform.
    pub fn outline(&self) -> Outline {
        match self {
            Roi::Points(points) | Roi::Polyline(points) => Outline {
                vertices: points.clone(),
                closed: false,
            },
            Roi::Line { start, end } => Outline {
                vertices: vec![*start, *end],
                closed: false,
            },
            Roi::Rectangle {
                x,
                y,
                width,
                height,
            } => Outline {
                vertices: vec![
                    Point2::new(*x, *y),
                    Point2::new(x + width, *y),
                    Point2::new(x + width, y + height),
                    Point2::new(*x, y + height),
                ],
                closed: true,
            },
            Roi::Ellipse {
                x,
                y,
                width,
                height,
            } => Outline {
                vertices: ellipse_vertices(*x, *y, *width, *height),
                closed: true,
            },
            Roi::Polygon(points) => Outline {
                vertices: points.clone(),
                closed: true,
            },
        }
    }

    /// Returns `(min_x, min_y, max_x, max_y)` of the outline, or `None` when empty.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let vertices = self.outline().vertices;
        let first = vertices.first()?;
        let init = (first.x, first.y, first.x, first.y);
        Some(vertices.iter().fold(init, |(x0, y0, x1, y1), p| {
            (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y))
        }))
    }

    /// Returns true when `(px, py)` lies inside an area ROI.
    ///
    /// Uses the even-odd rule on the outline; non-area ROIs contain nothing.
    pub fn contains(&self, px: f64, py: f64) -> bool {
        match self {
            Roi::Rectangle {
                x,
                y,
                width,
                height,
            } => px >= *x && px < x + width && py >= *y && py < y + height,
            Roi::Ellipse {
                x,
                y,
                width,
                height,
            } => {
                if *width <= 0.0 || *height <= 0.0 {
                    return false;
                }
                let rx = width * 0.5;
                let ry = height * 0.5;
                let dx = (px - (x + rx)) / rx;
                let dy = (py - (y + ry)) / ry;
                dx * dx + dy * dy <= 1.0
            }
            Roi::Polygon(points) => polygon_contains(points, px, py),
            _ => false,
        }
    }
}

/// Rebuilds a ROI from a mapped outline.
///
/// Open chains of two vertices become `Line`, longer ones `Polyline`. Closed
/// chains become `Polygon` unless they describe an axis-aligned rectangle.
pub fn roi_from_outline(outline: Outline, tolerance: f64) -> Roi {
    let Outline { vertices, closed } = outline;
    if closed {
        let simplified = simplify_ring(&vertices, tolerance);
        match axis_aligned_rectangle(&simplified) {
            Some(rect) => rect,
            None => Roi::Polygon(simplified),
        }
    } else {
        let simplified = simplify_polyline(&vertices, tolerance);
        match simplified.as_slice() {
            [start, end] => Roi::Line {
                start: *start,
                end: *end,
            },
            _ => Roi::Polyline(simplified),
        }
    }
}

fn simplify_ring(vertices: &[Point2], tolerance: f64) -> Vec<Point2> {
    if vertices.len() <= 3 {
        return vertices.to_vec();
    }
    // Split at the vertex farthest from the first one so both halves are open chains.
    let anchor = vertices[0];
    let (split, _) = vertices
        .iter()
        .enumerate()
        .skip(1)
        .fold((1, f64::NEG_INFINITY), |best, (i, p)| {
            let d = p.distance(anchor);
            if d > best.1 {
                (i, d)
            } else {
                best
            }
        });
    let first_half = simplify_polyline(&vertices[..=split], tolerance);
    let mut second: Vec<Point2> = vertices[split..].to_vec();
    second.push(anchor);
    let second_half = simplify_polyline(&second, tolerance);
    // Coincident vertices collapse a half to a single point.
    if first_half.len() < 2 || second_half.len() < 2 {
        return vertices.to_vec();
    }

    let mut ring = first_half;
    ring.extend_from_slice(&second_half[1..second_half.len() - 1]);
    if ring.len() < 3 {
        return vertices.to_vec();
    }
    ring
}

fn axis_aligned_rectangle(vertices: &[Point2]) -> Option<Roi> {
    if vertices.len() != 4 {
        return None;
    }
    for i in 0..4 {
        let a = vertices[i];
        let b = vertices[(i + 1) % 4];
        if a.x != b.x && a.y != b.y {
            return None;
        }
    }
    let [p0, _, p2, _] = [vertices[0], vertices[1], vertices[2], vertices[3]];
    let width = (p2.x - p0.x).abs();
    let height = (p2.y - p0.y).abs();
    if width == 0.0 || height == 0.0 {
        return None;
    }
    // Only the canonical corner order maps back to a rectangle exactly.
    let canonical = Roi::Rectangle {
        x: p0.x.min(p2.x),
        y: p0.y.min(p2.y),
        width,
        height,
    };
    if canonical.outline().vertices == vertices {
        Some(canonical)
    } else {
        None
    }
}

fn ellipse_vertices(x: f64, y: f64, width: f64, height: f64) -> Vec<Point2> {
    let rx = width.abs() * 0.5;
    let ry = height.abs() * 0.5;
    let cx = x + width * 0.5;
    let cy = y + height * 0.5;
    let r = rx.max(ry);
    // Sagitta r * (1 - cos(pi / n)) <= flatness.
    let n = if r <= ELLIPSE_FLATNESS {
        8
    } else {
        let step = (1.0 - ELLIPSE_FLATNESS / r).acos();
        ((std::f64::consts::PI / step).ceil() as usize).clamp(8, 4096)
    };
    (0..n)
        .map(|i| {
            let t = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
            Point2::new(cx + rx * t.cos(), cy + ry * t.sin())
        })
        .collect()
}

fn polygon_contains(points: &[Point2], px: f64, py: f64) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (points[i], points[j]);
        if (a.y > py) != (b.y > py) {
            let x_cross = a.x + (py - a.y) * (b.x - a.x) / (b.y - a.y);
            if px < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::{roi_from_outline, Outline, Point2, Roi};

    #[test]
    fn classification_of_roi_kinds() {
        assert!(Roi::Points(vec![]).is_point());
        assert!(Roi::Rectangle {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0
        }
        .is_area());
        let line = Roi::Line {
            start: Point2::new(0.0, 0.0),
            end: Point2::new(1.0, 1.0),
        };
        assert!(!line.is_area());
        assert!(line.is_line());
    }

    #[test]
    fn rectangle_outline_round_trips() {
        let rect = Roi::Rectangle {
            x: 2.0,
            y: 3.0,
            width: 4.0,
            height: 5.0,
        };
        assert_eq!(roi_from_outline(rect.outline(), 0.5), rect);
    }

    #[test]
    fn open_two_vertex_outline_is_a_line() {
        let outline = Outline {
            vertices: vec![Point2::new(4.3, -23.0), Point2::new(5.0, 50.0)],
            closed: false,
        };
        assert_eq!(
            roi_from_outline(outline, 0.5),
            Roi::Line {
                start: Point2::new(4.3, -23.0),
                end: Point2::new(5.0, 50.0),
            }
        );
    }

    #[test]
    fn ellipse_outline_stays_close_to_curve() {
        let ellipse = Roi::Ellipse {
            x: 0.0,
            y: 0.0,
            width: 200.0,
            height: 100.0,
        };
        let vertices = ellipse.all_points();
        assert!(vertices.len() >= 8);
        for p in vertices {
            let dx = (p.x - 100.0) / 100.0;
            let dy = (p.y - 50.0) / 50.0;
            assert!((dx * dx + dy * dy - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn polygon_contains_uses_even_odd_rule() {
        let tri = Roi::Polygon(vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(0.0, 10.0),
        ]);
        assert!(tri.contains(2.0, 2.0));
        assert!(!tri.contains(8.0, 8.0));
        assert_eq!(tri.bounds(), Some((0.0, 0.0, 10.0, 10.0)));
    }
}
