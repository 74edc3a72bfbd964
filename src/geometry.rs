//! Planar geometry helpers for box silhouettes in pixel space.
//!
//! All predicates run on integer coordinates so that collinearity and hull
//! areas are exact; only the final area and the angular ordering use floats.
//! Products are widened to `i128`, which holds them for any `i32` input.

use std::cmp::Ordering;

use crate::types::Point2D;

/// Z component of `(a - o) × (b - o)`.
///
/// Positive for a counter-clockwise turn in a y-up frame, zero when the three
/// points are collinear.
#[inline]
pub fn cross(o: Point2D, a: Point2D, b: Point2D) -> i128 {
    let (ox, oy) = (i128::from(o.x), i128::from(o.y));
    (i128::from(a.x) - ox) * (i128::from(b.y) - oy) - (i128::from(a.y) - oy) * (i128::from(b.x) - ox)
}

/// Returns `true` when every point lies on the line through the first two.
///
/// Uses the 3×3 determinant `|x y 1|` of each triple `(p0, p1, pi)`, which is
/// the same quantity as [`cross`].
pub fn are_collinear(points: &[Point2D]) -> bool {
    if points.len() < 3 {
        return true;
    }
    let (p0, p1) = (points[0], points[1]);
    points[2..].iter().all(|&pi| cross(p0, p1, pi) == 0)
}

/// Convex hull via Andrew's monotone chain. Collinear boundary points are dropped.
pub fn convex_hull(points: &[Point2D]) -> Vec<Point2D> {
    let mut pts = points.to_vec();
    pts.sort_unstable();
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut hull: Vec<Point2D> = Vec::with_capacity(pts.len() * 2);
    for &p in &pts {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0 {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}

/// Twice the signed area of a closed polygon (shoelace formula).
pub fn doubled_signed_area(polygon: &[Point2D]) -> i128 {
    if polygon.len() < 3 {
        return 0;
    }
    polygon
        .iter()
        .zip(polygon.iter().cycle().skip(1))
        .map(|(a, b)| i128::from(a.x) * i128::from(b.y) - i128::from(b.x) * i128::from(a.y))
        .sum()
}

/// Area of the convex hull of `points`; zero for collinear or tiny sets.
pub fn hull_area(points: &[Point2D]) -> f64 {
    if points.len() < 3 || are_collinear(points) {
        return 0.0;
    }
    let hull = convex_hull(points);
    doubled_signed_area(&hull).abs() as f64 / 2.0
}

/// Arithmetic mean of the points.
pub fn centroid(points: &[Point2D]) -> (f64, f64) {
    if points.is_empty() {
        return (0.0, 0.0);
    }
    let n = points.len() as f64;
    let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), p| {
        (sx + f64::from(p.x), sy + f64::from(p.y))
    });
    (sx / n, sy / n)
}

/// Sorts points into the canonical traversal used for box outlines.
///
/// Points are ordered by ascending `atan2` angle around their centroid, which
/// in image space (y down) is a clockwise walk, and the sequence is then
/// rotated so that the point closest to the image origin comes first.
///
/// The result depends on the coordinate frame: callers must pass points that
/// share one frame, normally pixel space with the origin at the top-left.
pub fn order_clockwise(points: &mut [Point2D]) {
    if points.len() < 2 {
        return;
    }
    let (cx, cy) = centroid(points);
    points.sort_by(|a, b| {
        let angle_a = (f64::from(a.y) - cy).atan2(f64::from(a.x) - cx);
        let angle_b = (f64::from(b.y) - cy).atan2(f64::from(b.x) - cx);
        angle_a.partial_cmp(&angle_b).unwrap_or(Ordering::Equal)
    });

    let mut start = 0;
    let mut best = f64::INFINITY;
    for (idx, p) in points.iter().enumerate() {
        let norm = p.norm();
        if norm < best {
            best = norm;
            start = idx;
        }
    }
    points.rotate_left(start);
}

/// Perimeter of a closed polygon.
pub fn arc_length(contour: &[Point2D]) -> f64 {
    if contour.len() < 2 {
        return 0.0;
    }
    contour
        .iter()
        .zip(contour.iter().cycle().skip(1))
        .map(|(a, b)| a.distance_to(b))
        .sum()
}

/// Perpendicular distance from `point` to the line through `start` and `end`.
fn point_to_line_distance(point: Point2D, start: Point2D, end: Point2D) -> f64 {
    let length = start.distance_to(&end);
    if length == 0.0 {
        return point.distance_to(&start);
    }
    cross(start, end, point).abs() as f64 / length
}

/// Douglas-Peucker on the open chain `points[start..=end]`, marking kept indices.
fn douglas_peucker(points: &[Point2D], start: usize, end: usize, epsilon: f64, keep: &mut [bool]) {
    let mut stack = vec![(start, end)];

    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }

        let mut max_dist = 0.0;
        let mut max_index = start;
        for i in (start + 1)..end {
            let dist = point_to_line_distance(points[i], points[start], points[end]);
            if dist > max_dist {
                max_dist = dist;
                max_index = i;
            }
        }

        if max_dist > epsilon {
            keep[max_index] = true;
            stack.push((start, max_index));
            stack.push((max_index, end));
        }
    }
}

/// Simplifies a closed contour so that no dropped point lies further than
/// `epsilon` from the simplified outline.
///
/// The contour is split at its first point and the point farthest from it;
/// both halves are simplified independently.
pub fn simplify_closed(contour: &[Point2D], epsilon: f64) -> Vec<Point2D> {
    if contour.len() <= 3 {
        return contour.to_vec();
    }

    let anchor = contour[0];
    let mut far = 0;
    let mut far_dist = -1.0;
    for (idx, p) in contour.iter().enumerate() {
        let dist = anchor.distance_to(p);
        if dist > far_dist {
            far_dist = dist;
            far = idx;
        }
    }
    if far == 0 {
        return vec![anchor];
    }

    // Close the loop so the second half ends back at the anchor.
    let mut closed = contour.to_vec();
    closed.push(anchor);
    let last = closed.len() - 1;

    let mut keep = vec![false; closed.len()];
    keep[0] = true;
    keep[far] = true;
    douglas_peucker(&closed, 0, far, epsilon, &mut keep);
    douglas_peucker(&closed, far, last, epsilon, &mut keep);

    closed[..last]
        .iter()
        .zip(&keep[..last])
        .filter_map(|(p, &k)| k.then_some(*p))
        .collect()
}
