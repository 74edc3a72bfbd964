//! Corner selection for box silhouettes.
//!
//! A box seen from above and in front shows a hexagonal outline. Given the
//! vertices of a simplified polygon around its segmentation mask, this module
//! picks the six points that best describe that hexagon and splits them into
//! the front and back faces.
//!
//! The six-from-n search is exhaustive (`C(n, 6)` hull evaluations), so the
//! number of candidate points is capped by [`CornerSelector::max_candidates`].
//! Callers with a dense contour should go through [`approximate_corners`],
//! which tightens the polygon simplification until few enough points remain.

use log::{debug, trace};
use serde::Serialize;
use utoipa::ToSchema;

use crate::geometry::{arc_length, hull_area, order_clockwise, simplify_closed};
use crate::types::Point2D;

/// Reasons why no usable set of six corners could be produced.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("only {unique} unique points, at least 6 are required")]
    InsufficientGeometry { unique: usize },
    #[error("every 6-point subset is degenerate")]
    DegenerateGeometry,
    #[error("{count} candidate points exceed the limit of {limit}")]
    TooManyCandidates { count: usize, limit: usize },
}

/// Number of corners of a box outline.
pub const CORNER_COUNT: usize = 6;

/// Selects and orders the six visible corners of a box outline.
#[derive(Clone, Copy, Debug)]
pub struct CornerSelector {
    /// Upper bound on unique candidate points accepted by the subset search.
    pub max_candidates: usize,
}

impl CornerSelector {
    pub const DEFAULT_MAX_CANDIDATES: usize = 12;
    /// Largest cap accepted from configuration or requests; C(20, 6) is
    /// already close to 40k subsets.
    pub const MAX_CANDIDATES_LIMIT: usize = 20;

    pub fn new(max_candidates: usize) -> Self {
        Self {
            max_candidates: max_candidates.max(CORNER_COUNT),
        }
    }

    /// Picks the six points whose convex hull has the largest area and returns
    /// them in canonical order (see [`order_clockwise`]).
    ///
    /// Duplicated points are removed first. With exactly six unique points the
    /// input is only reordered. Subsets enumerate in lexicographic order over the
    /// canonically ordered candidates and the first subset reaching the maximum
    /// area wins.
    pub fn select(&self, points: &[Point2D]) -> Result<[Point2D; CORNER_COUNT], GeometryError> {
        let mut unique = dedup_points(points);
        if unique.len() < CORNER_COUNT {
            return Err(GeometryError::InsufficientGeometry {
                unique: unique.len(),
            });
        }
        if unique.len() > self.max_candidates {
            return Err(GeometryError::TooManyCandidates {
                count: unique.len(),
                limit: self.max_candidates,
            });
        }

        order_clockwise(&mut unique);

        if unique.len() == CORNER_COUNT {
            if hull_area(&unique) <= 0.0 {
                return Err(GeometryError::DegenerateGeometry);
            }
            return Ok(to_array(&unique));
        }

        let mut best: Option<([Point2D; CORNER_COUNT], f64)> = None;
        let mut evaluated = 0usize;
        for_each_combination(unique.len(), |indices| {
            let subset = indices.map(|i| unique[i]);
            let area = hull_area(&subset);
            evaluated += 1;
            let improves = match &best {
                Some((_, best_area)) => area > *best_area,
                None => area > 0.0,
            };
            if improves {
                best = Some((subset, area));
            }
        });
        trace!(
            "evaluated {} subsets of {} candidates",
            evaluated,
            unique.len()
        );

        let (mut corners, area) = best.ok_or(GeometryError::DegenerateGeometry)?;
        order_clockwise(&mut corners);
        debug!("selected corners {:?} with hull area {:.1}", corners, area);
        Ok(corners)
    }
}

impl Default for CornerSelector {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_CANDIDATES)
    }
}

/// Selects six canonical corners with the default candidate limit.
///
/// Returns `None` for fewer than six unique points, for degenerate input and
/// for more candidates than the default limit.
pub fn select_corners(points: &[Point2D]) -> Option<[Point2D; CORNER_COUNT]> {
    CornerSelector::default().select(points).ok()
}

fn dedup_points(points: &[Point2D]) -> Vec<Point2D> {
    let mut unique: Vec<Point2D> = Vec::with_capacity(points.len());
    for p in points {
        if !unique.contains(p) {
            unique.push(*p);
        }
    }
    unique
}

fn to_array(points: &[Point2D]) -> [Point2D; CORNER_COUNT] {
    let mut out = [Point2D::new(0, 0); CORNER_COUNT];
    out.copy_from_slice(&points[..CORNER_COUNT]);
    out
}

/// Calls `visit` with every strictly increasing 6-tuple of indices below `n`.
fn for_each_combination(n: usize, mut visit: impl FnMut([usize; CORNER_COUNT])) {
    if n < CORNER_COUNT {
        return;
    }
    let mut idx: [usize; CORNER_COUNT] = [0, 1, 2, 3, 4, 5];
    loop {
        visit(idx);

        // Advance the rightmost index that still has room.
        let mut pos = CORNER_COUNT;
        while pos > 0 {
            pos -= 1;
            if idx[pos] < n - CORNER_COUNT + pos {
                break;
            }
            if pos == 0 {
                return;
            }
        }
        idx[pos] += 1;
        for next in (pos + 1)..CORNER_COUNT {
            idx[next] = idx[next - 1] + 1;
        }
    }
}

/// Tolerance sweep used to turn a dense contour into six corners.
#[derive(Clone, Copy, Debug)]
pub struct ContourApproximation {
    /// Initial simplification tolerance as a fraction of the contour length.
    pub initial_factor: f64,
    /// Increment of the factor per attempt.
    pub factor_step: f64,
    /// Number of simplification attempts.
    pub max_attempts: usize,
}

impl Default for ContourApproximation {
    fn default() -> Self {
        Self {
            initial_factor: 0.002,
            factor_step: 0.001,
            max_attempts: 100,
        }
    }
}

/// Simplifies a closed contour with growing tolerance and selects corners.
///
/// Keeps the smallest approximation with at least six vertices and stops as
/// soon as one has exactly six.
pub fn approximate_corners(
    contour: &[Point2D],
    sweep: &ContourApproximation,
    selector: &CornerSelector,
) -> Result<[Point2D; CORNER_COUNT], GeometryError> {
    let length = arc_length(contour);
    let mut best: Option<Vec<Point2D>> = None;
    let mut factor = sweep.initial_factor;

    for _ in 0..sweep.max_attempts {
        let approx = simplify_closed(contour, length * factor);
        factor += sweep.factor_step;

        let replace = match &best {
            None => true,
            Some(current) => approx.len() < current.len() && approx.len() >= CORNER_COUNT,
        };
        if replace {
            best = Some(approx);
        }
        if best.as_ref().is_some_and(|b| b.len() == CORNER_COUNT) {
            break;
        }
    }

    let candidates = best.unwrap_or_default();
    debug!(
        "contour of {} points approximated by {} vertices",
        contour.len(),
        candidates.len()
    );
    selector.select(&candidates)
}

/// Six corners split into the front and back faces of the box.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct FrontBack {
    #[schema(value_type = Vec<Point2D>)]
    pub front: [Point2D; 3],
    #[schema(value_type = Vec<Point2D>)]
    pub back: [Point2D; 3],
}

impl FrontBack {
    /// Classifies ordered corners into front and back triangles.
    ///
    /// The two lowest points in the image (largest `y`) are taken as the
    /// bottom-front edge. Of the remaining points, the one horizontally closest
    /// to the second-lowest point closes the front triangle. Both triangles are
    /// returned in canonical order.
    pub fn build(corners: &[Point2D; CORNER_COUNT]) -> Self {
        let mut by_y: Vec<usize> = (0..CORNER_COUNT).collect();
        by_y.sort_by(|&a, &b| corners[b].y.cmp(&corners[a].y));
        let lowest = by_y[0];
        let second_lowest = by_y[1];

        let anchor_x = corners[second_lowest].x;
        let paired = (0..CORNER_COUNT)
            .filter(|&i| i != lowest && i != second_lowest)
            .min_by_key(|&i| (i64::from(corners[i].x) - i64::from(anchor_x)).abs())
            .unwrap_or(by_y[2]);

        let mut front = [corners[lowest], corners[second_lowest], corners[paired]];
        let mut back = [Point2D::new(0, 0); 3];
        let rest = (0..CORNER_COUNT).filter(|&i| i != lowest && i != second_lowest && i != paired);
        for (slot, i) in back.iter_mut().zip(rest) {
            *slot = corners[i];
        }

        order_clockwise(&mut front);
        order_clockwise(&mut back);
        Self { front, back }
    }

    fn front_sorted_by_y(&self) -> [Point2D; 3] {
        let mut sorted = self.front;
        sorted.sort_by_key(|p| p.y);
        sorted
    }

    /// Front point closest to the bottom of the image.
    pub fn lowest_front_point(&self) -> Point2D {
        self.front_sorted_by_y()[2]
    }

    /// Front point closest to the top of the image.
    pub fn highest_front_point(&self) -> Point2D {
        self.front_sorted_by_y()[0]
    }

    /// Extrapolated centre of the front face, used for overlays.
    ///
    /// The extrapolated `y` saturates at the `i32` range.
    pub fn mid_front_point(&self) -> Point2D {
        let sorted = self.front_sorted_by_y();
        let (highest, second_highest, lowest) = (sorted[0], sorted[1], sorted[2]);
        let y = i64::from(lowest.y) - (i64::from(second_highest.y) - i64::from(highest.y));
        let y = y.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
        Point2D::new(lowest.x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(raw: &[(i32, i32)]) -> Vec<Point2D> {
        raw.iter().copied().map(Point2D::from).collect()
    }

    /// Outline of a box photographed from above and in front.
    fn box_outline() -> Vec<Point2D> {
        pts(&[(150, 50), (350, 50), (350, 180), (300, 300), (100, 300), (100, 170)])
    }

    fn sorted(points: &[Point2D]) -> Vec<Point2D> {
        let mut v = points.to_vec();
        v.sort_unstable();
        v
    }

    #[test]
    fn six_points_are_returned_reordered() {
        let mut shuffled = box_outline();
        shuffled.reverse();
        shuffled.swap(0, 3);

        let corners = select_corners(&shuffled).expect("six corners");
        assert_eq!(sorted(&corners), sorted(&box_outline()));
        assert_eq!(corners[0], Point2D::new(150, 50));
    }

    #[test]
    fn canonical_order_is_a_clockwise_loop() {
        let corners = select_corners(&box_outline()).expect("six corners");
        assert_eq!(corners.to_vec(), box_outline());
    }

    #[test]
    fn duplicates_are_removed_before_counting() {
        let mut points = box_outline();
        points.truncate(5);
        points.push(Point2D::new(150, 50));
        points.push(Point2D::new(350, 50));

        assert_eq!(
            CornerSelector::default().select(&points),
            Err(GeometryError::InsufficientGeometry { unique: 5 })
        );
        assert_eq!(select_corners(&points), None);
    }

    #[test]
    fn collinear_points_are_degenerate() {
        let line = pts(&[(0, 0), (1, 1), (2, 2), (3, 3), (4, 4), (5, 5), (6, 6)]);
        assert_eq!(
            CornerSelector::default().select(&line),
            Err(GeometryError::DegenerateGeometry)
        );

        let six_on_line = pts(&[(0, 0), (2, 0), (4, 0), (6, 0), (8, 0), (10, 0)]);
        assert_eq!(select_corners(&six_on_line), None);
    }

    #[test]
    fn interior_noise_points_are_ignored() {
        let mut points = box_outline();
        points.push(Point2D::new(200, 150));
        points.push(Point2D::new(220, 200));
        points.push(Point2D::new(160, 100));

        let corners = select_corners(&points).expect("six corners");
        assert_eq!(sorted(&corners), sorted(&box_outline()));
    }

    #[test]
    fn selected_subset_has_maximal_hull_area() {
        let points = pts(&[
            (10, 0),
            (30, 2),
            (42, 20),
            (35, 41),
            (12, 44),
            (0, 25),
            (20, 20),
            (28, 38),
            (5, 8),
        ]);
        let corners = select_corners(&points).expect("six corners");
        let chosen = hull_area(&corners);

        let mut max_area: f64 = 0.0;
        for_each_combination(points.len(), |idx| {
            max_area = max_area.max(hull_area(&idx.map(|i| points[i])));
        });
        assert!((chosen - max_area).abs() < 1e-9);
    }

    #[test]
    fn candidate_limit_is_enforced() {
        let ring: Vec<Point2D> = (0..20)
            .map(|i| {
                let a = f64::from(i) * std::f64::consts::TAU / 20.0;
                Point2D::new((100.0 * a.cos()) as i32 + 200, (100.0 * a.sin()) as i32 + 200)
            })
            .collect();
        assert_eq!(
            CornerSelector::new(12).select(&ring),
            Err(GeometryError::TooManyCandidates {
                count: 20,
                limit: 12
            })
        );
    }

    #[test]
    fn combinations_are_counted_exactly() {
        let mut count = 0;
        for_each_combination(8, |_| count += 1);
        assert_eq!(count, 28);

        let mut first = None;
        let mut last = None;
        for_each_combination(7, |idx| {
            first.get_or_insert(idx);
            last = Some(idx);
        });
        assert_eq!(first, Some([0, 1, 2, 3, 4, 5]));
        assert_eq!(last, Some([1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn approximate_corners_reduces_dense_contour() {
        let outline = box_outline();
        let mut contour = Vec::new();
        for (a, b) in outline.iter().zip(outline.iter().cycle().skip(1)) {
            for step in 0..20 {
                let t = f64::from(step) / 20.0;
                contour.push(Point2D::new(
                    (f64::from(a.x) + t * f64::from(b.x - a.x)).round() as i32,
                    (f64::from(a.y) + t * f64::from(b.y - a.y)).round() as i32,
                ));
            }
        }

        let corners = approximate_corners(
            &contour,
            &ContourApproximation::default(),
            &CornerSelector::default(),
        )
        .expect("six corners");
        assert_eq!(sorted(&corners), sorted(&outline));
    }

    #[test]
    fn front_back_split_uses_lowest_edge() {
        let corners = select_corners(&box_outline()).expect("six corners");
        let split = FrontBack::build(&corners);

        // bottom edge (300,300)-(100,300) plus the vertical edge above (100,300)
        assert_eq!(
            sorted(&split.front),
            pts(&[(100, 170), (100, 300), (300, 300)])
        );
        assert_eq!(sorted(&split.back), pts(&[(150, 50), (350, 50), (350, 180)]));
        assert_eq!(split.lowest_front_point().y, 300);
        assert_eq!(split.highest_front_point(), Point2D::new(100, 170));
    }

    #[test]
    fn extreme_coordinates_are_handled() {
        let (lo, hi) = (i32::MIN, i32::MAX);
        let outline = pts(&[(lo, lo), (0, lo), (hi, 0), (hi, hi), (0, hi), (lo, 0)]);
        let corners = select_corners(&outline).expect("six corners");
        assert_eq!(sorted(&corners), sorted(&outline));

        let split = FrontBack::build(&corners);
        let mid = split.mid_front_point();
        assert_eq!(mid.x, split.lowest_front_point().x);
        assert!(mid.y <= split.lowest_front_point().y);
    }

    #[test]
    fn mid_front_point_is_extrapolated_from_front_face() {
        let corners = select_corners(&box_outline()).expect("six corners");
        let split = FrontBack::build(&corners);
        let lowest = split.lowest_front_point();
        let mid = split.mid_front_point();

        // front by y: (100,170), (300,300), (100,300)
        assert_eq!(lowest, Point2D::new(100, 300));
        assert_eq!(mid, Point2D::new(100, 300 - (300 - 170)));
    }
}
