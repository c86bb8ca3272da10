//! Ramer-Douglas-Peucker simplification of open vertex chains.

use super::Point2;

/// Drops vertices that deviate less than `tolerance` from the simplified chain.
///
/// Endpoints are always kept. Consecutive duplicate vertices are removed first.
pub fn simplify_polyline(points: &[Point2], tolerance: f64) -> Vec<Point2> {
    let mut deduped: Vec<Point2> = Vec::with_capacity(points.len());
    for p in points {
        if deduped.last() != Some(p) {
            deduped.push(*p);
        }
    }
    if deduped.len() <= 2 || tolerance <= 0.0 {
        return deduped;
    }

    let mut keep = vec![false; deduped.len()];
    keep[0] = true;
    keep[deduped.len() - 1] = true;

    let mut stack = vec![(0usize, deduped.len() - 1)];
    while let Some((first, last)) = stack.pop() {
        if last <= first + 1 {
            continue;
        }
        let (mut index, mut max_dist) = (first, 0.0f64);
        for i in first + 1..last {
            let d = segment_distance(deduped[i], deduped[first], deduped[last]);
            if d > max_dist {
                index = i;
                max_dist = d;
            }
        }
        if max_dist > tolerance {
            keep[index] = true;
            stack.push((first, index));
            stack.push((index, last));
        }
    }

    deduped
        .into_iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(p))
        .collect()
}

fn segment_distance(p: Point2, a: Point2, b: Point2) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0);
    p.distance(Point2::new(a.x + t * dx, a.y + t * dy))
}
