//! Loading-plan heuristic for a single container.
//!
//! Boxes are placed one after another into the container, filling from the
//! back-left floor corner outward. Each box takes the position with the lowest
//! y (vertical), then the lowest z (depth, back to front), then the lowest x
//! (left to right), subject to:
//! - staying inside the container,
//! - not intersecting a previously placed box,
//! - resting on the floor or on boxes covering enough of its footprint,
//!   including the center of the footprint.
//!
//! Boxes that cannot be placed are reported as left-overs and planning
//! continues with the rest. The result is deterministic for identical input.

use std::cmp::Ordering;

use log::{debug, info};
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::{BoxId, BoxRecord, Container, LoadingPlan, Orientation, PlacedItem};
use crate::types::{BoundingBox, Dimensional, EPSILON_GENERAL, EPSILON_HEIGHT, Vec3};

/// Tunables of the placement heuristic.
#[derive(Copy, Clone, Debug)]
pub struct PlannerConfig {
    /// Minimum share of the footprint that must rest on supporting boxes (0.0 to 1.0).
    pub support_ratio: f64,
    /// Extra candidate positions every `grid_step` units; 0 uses box edges only.
    pub grid_step: f64,
    /// Tolerance for vertical comparisons.
    pub height_epsilon: f64,
    /// General numeric tolerance.
    pub general_epsilon: f64,
    /// Try all six axis-aligned orientations per box.
    pub allow_rotations: bool,
    /// Place boxes largest volume first instead of in input order.
    pub largest_first: bool,
}

impl PlannerConfig {
    pub const DEFAULT_SUPPORT_RATIO: f64 = 0.6;
    pub const DEFAULT_GRID_STEP: f64 = 0.0;
    pub const DEFAULT_HEIGHT_EPSILON: f64 = EPSILON_HEIGHT;
    pub const DEFAULT_GENERAL_EPSILON: f64 = EPSILON_GENERAL;
    pub const DEFAULT_ALLOW_ROTATIONS: bool = false;
    pub const DEFAULT_LARGEST_FIRST: bool = true;
    /// Smallest grid step accepted from configuration.
    pub const MIN_GRID_STEP: f64 = 0.5;
    /// Upper bound on grid positions per axis; finer steps are coarsened.
    pub const MAX_GRID_POSITIONS: usize = 1000;

    pub fn builder() -> PlannerConfigBuilder {
        PlannerConfigBuilder::default()
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            support_ratio: Self::DEFAULT_SUPPORT_RATIO,
            grid_step: Self::DEFAULT_GRID_STEP,
            height_epsilon: Self::DEFAULT_HEIGHT_EPSILON,
            general_epsilon: Self::DEFAULT_GENERAL_EPSILON,
            allow_rotations: Self::DEFAULT_ALLOW_ROTATIONS,
            largest_first: Self::DEFAULT_LARGEST_FIRST,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PlannerConfigBuilder {
    config: PlannerConfig,
}

impl PlannerConfigBuilder {
    pub fn support_ratio(mut self, ratio: f64) -> Self {
        self.config.support_ratio = ratio;
        self
    }

    pub fn grid_step(mut self, step: f64) -> Self {
        self.config.grid_step = step;
        self
    }

    pub fn height_epsilon(mut self, epsilon: f64) -> Self {
        self.config.height_epsilon = epsilon;
        self
    }

    pub fn general_epsilon(mut self, epsilon: f64) -> Self {
        self.config.general_epsilon = epsilon;
        self
    }

    pub fn allow_rotations(mut self, allow: bool) -> Self {
        self.config.allow_rotations = allow;
        self
    }

    pub fn largest_first(mut self, enabled: bool) -> Self {
        self.config.largest_first = enabled;
        self
    }

    pub fn build(self) -> PlannerConfig {
        self.config
    }
}

/// Why a box ended up in `left_over_boxes`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UnplacedReason {
    DimensionsExceedContainer,
    NoStablePosition,
    InvalidContainer,
    InvalidDimensions,
    CapacityReached,
}

impl UnplacedReason {
    pub fn code(&self) -> &'static str {
        match self {
            UnplacedReason::DimensionsExceedContainer => "dimensions_exceed_container",
            UnplacedReason::NoStablePosition => "no_stable_position",
            UnplacedReason::InvalidContainer => "invalid_container",
            UnplacedReason::InvalidDimensions => "invalid_dimensions",
            UnplacedReason::CapacityReached => "capacity_reached",
        }
    }
}

impl std::fmt::Display for UnplacedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnplacedReason::DimensionsExceedContainer => {
                write!(f, "Box exceeds the container in at least one dimension")
            }
            UnplacedReason::NoStablePosition => {
                write!(f, "No supported position left inside the container")
            }
            UnplacedReason::InvalidContainer => {
                write!(f, "Container has a non-positive dimension")
            }
            UnplacedReason::InvalidDimensions => {
                write!(f, "Box has a non-positive or non-finite dimension")
            }
            UnplacedReason::CapacityReached => {
                write!(f, "Container already holds its maximum number of items")
            }
        }
    }
}

/// A left-over box and the reason it was not placed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct Rejection {
    pub box_id: BoxId,
    pub reason: UnplacedReason,
}

/// Progress events emitted while planning, for live visualisation.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanEvent {
    /// A box was placed at a physical position.
    ItemPlaced {
        box_id: BoxId,
        #[schema(value_type = Vec<f64>)]
        position: [f64; 3],
        #[schema(value_type = Vec<f64>)]
        dims: [f64; 3],
        orientation: Orientation,
    },
    /// A box could not be placed.
    ItemRejected {
        box_id: BoxId,
        reason_code: String,
        reason_text: String,
    },
    /// Planning finished.
    Finished {
        placed: usize,
        left_over: usize,
        utilized_space: f64,
    },
}

/// Physical placement of a box inside the container.
#[derive(Clone, Debug)]
struct Placement {
    box_id: BoxId,
    bounds: BoundingBox,
    orientation: Orientation,
    source: usize,
}

/// Single-container loading planner.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContainerPlanner {
    config: PlannerConfig,
}

/// Plans `boxes` into `container` with the default configuration.
pub fn plan_container(container: &Container, boxes: &[BoxRecord]) -> LoadingPlan {
    ContainerPlanner::default().plan(container, boxes)
}

impl ContainerPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn plan(&self, container: &Container, boxes: &[BoxRecord]) -> LoadingPlan {
        self.plan_with_progress(container, boxes, |_| {})
    }

    /// Plans like [`ContainerPlanner::plan`] and reports every decision to
    /// `on_event` (suitable for SSE).
    pub fn plan_with_progress(
        &self,
        container: &Container,
        boxes: &[BoxRecord],
        mut on_event: impl FnMut(&PlanEvent),
    ) -> LoadingPlan {
        let config = &self.config;
        let mut placements: Vec<Placement> = Vec::new();
        let mut rejections: Vec<Rejection> = Vec::new();

        if let Err(err) = container.validate() {
            info!("rejecting {} boxes: {}", boxes.len(), err);
            for b in boxes {
                reject(&b.id, UnplacedReason::InvalidContainer, &mut rejections, &mut on_event);
            }
        } else {
            let container_dims = container.dimensions();
            for index in placement_order(boxes, config) {
                let b = &boxes[index];
                let dims = b.dimensions();

                if !dims.is_valid_dimension() {
                    reject(&b.id, UnplacedReason::InvalidDimensions, &mut rejections, &mut on_event);
                    continue;
                }
                if container.max_items.is_some_and(|max| placements.len() >= max) {
                    reject(&b.id, UnplacedReason::CapacityReached, &mut rejections, &mut on_event);
                    continue;
                }

                let orientations: &[Orientation] = if config.allow_rotations {
                    &Orientation::ALL
                } else {
                    &[Orientation::Whd]
                };
                let fitting: Vec<(Orientation, Vec3)> = orientations
                    .iter()
                    .map(|o| (*o, o.apply(dims)))
                    .filter(|(_, d)| d.fits_within(&container_dims, config.general_epsilon))
                    .collect();
                if fitting.is_empty() {
                    reject(
                        &b.id,
                        UnplacedReason::DimensionsExceedContainer,
                        &mut rejections,
                        &mut on_event,
                    );
                    continue;
                }

                let mut best: Option<(Placement, PlacementScore)> = None;
                for (orientation, oriented) in fitting {
                    let Some((position, score)) =
                        find_stable_position(oriented, &container_dims, &placements, config)
                    else {
                        continue;
                    };
                    let better = match &best {
                        None => true,
                        Some((_, current)) => is_better_score(score, *current, config),
                    };
                    if better {
                        let placement = Placement {
                            box_id: b.id.clone(),
                            bounds: BoundingBox::from_position_and_dims(position, oriented),
                            orientation,
                            source: index,
                        };
                        best = Some((placement, score));
                    }
                }

                match best {
                    Some((placement, _)) => {
                        on_event(&PlanEvent::ItemPlaced {
                            box_id: placement.box_id.clone(),
                            position: vec3_array(placement.bounds.min),
                            dims: vec3_array(placement.bounds.dimensions()),
                            orientation: placement.orientation,
                        });
                        placements.push(placement);
                    }
                    None => reject(&b.id, UnplacedReason::NoStablePosition, &mut rejections, &mut on_event),
                }
            }
        }

        let container_volume = container.volume();
        let placed_volume: f64 = placements
            .iter()
            .map(|p| p.bounds.dimensions().volume())
            .sum();
        let utilized_space = if container.is_valid() && container_volume > 0.0 {
            placed_volume / container_volume
        } else {
            0.0
        };

        let plan = ordinal_items(&placements, boxes, config.general_epsilon);
        let left_over_boxes: Vec<BoxId> = rejections.iter().map(|r| r.box_id.clone()).collect();

        on_event(&PlanEvent::Finished {
            placed: plan.len(),
            left_over: left_over_boxes.len(),
            utilized_space,
        });
        info!(
            "planned {} boxes: {} placed, {} left over, {:.1}% utilised",
            boxes.len(),
            plan.len(),
            left_over_boxes.len(),
            utilized_space * 100.0
        );

        LoadingPlan {
            plan,
            remarks: LoadingPlan::remarks_for(left_over_boxes.len()),
            left_over_boxes,
            utilized_space,
            rejections,
        }
    }
}

fn reject(
    box_id: &BoxId,
    reason: UnplacedReason,
    rejections: &mut Vec<Rejection>,
    on_event: &mut impl FnMut(&PlanEvent),
) {
    debug!("box {} not placed: {}", box_id, reason.code());
    on_event(&PlanEvent::ItemRejected {
        box_id: box_id.clone(),
        reason_code: reason.code().to_string(),
        reason_text: reason.to_string(),
    });
    rejections.push(Rejection {
        box_id: box_id.clone(),
        reason,
    });
}

/// Indices of `boxes` in the order they are offered to the container.
fn placement_order(boxes: &[BoxRecord], config: &PlannerConfig) -> Vec<usize> {
    let mut order: Vec<usize> = (0..boxes.len()).collect();
    if config.largest_first {
        order.sort_by(|&a, &b| {
            boxes[b]
                .volume()
                .partial_cmp(&boxes[a].volume())
                .unwrap_or(Ordering::Equal)
                .then_with(|| boxes[a].id.cmp(&boxes[b].id))
                .then_with(|| a.cmp(&b))
        });
    }
    order
}

fn vec3_array(v: Vec3) -> [f64; 3] {
    [v.x, v.y, v.z]
}

/// Converts physical placements to plan items with ordinal slot indices.
fn ordinal_items(placements: &[Placement], boxes: &[BoxRecord], epsilon: f64) -> Vec<PlacedItem> {
    let xs = ordinal_ranks(placements.iter().map(|p| p.bounds.min.x), epsilon);
    let ys = ordinal_ranks(placements.iter().map(|p| p.bounds.min.y), epsilon);
    let zs = ordinal_ranks(placements.iter().map(|p| p.bounds.min.z), epsilon);

    placements
        .iter()
        .enumerate()
        .map(|(i, p)| PlacedItem {
            box_id: p.box_id.clone(),
            x: xs[i],
            y: ys[i],
            z: zs[i],
            orientation: p.orientation,
            image_ref: boxes[p.source].image_ref.clone(),
        })
        .collect()
}

/// Dense rank of every value among the distinct values (within `epsilon`).
fn ordinal_ranks(values: impl Iterator<Item = f64> + Clone, epsilon: f64) -> Vec<usize> {
    let mut distinct: Vec<f64> = values.clone().collect();
    distinct.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    distinct.dedup_by(|a, b| (*a - *b).abs() <= epsilon);

    values
        .map(|v| {
            distinct
                .iter()
                .position(|d| (v - d).abs() <= epsilon)
                .unwrap_or(distinct.len())
        })
        .collect()
}

/// Finds the best supported position for a box of (already oriented) `dims`.
///
/// Candidate coordinates are the container origin and the far faces of the
/// placed boxes on each axis, plus grid positions when a grid step is set.
fn find_stable_position(
    dims: Vec3,
    container: &Vec3,
    placed: &[Placement],
    config: &PlannerConfig,
) -> Option<(Vec3, PlacementScore)> {
    let eps = config.general_epsilon;
    let xs = axis_positions(
        container.x,
        dims.x,
        config.grid_step,
        eps,
        placed.iter().map(|p| p.bounds.max.x),
    );
    let zs = axis_positions(
        container.z,
        dims.z,
        config.grid_step,
        eps,
        placed.iter().map(|p| p.bounds.max.z),
    );

    // Floor plus the top faces of all placed boxes
    let mut y_levels: Vec<f64> = placed.iter().map(|p| p.bounds.top_y()).collect();
    y_levels.push(0.0);
    y_levels.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    y_levels.dedup_by(|a, b| (*a - *b).abs() < config.height_epsilon);

    let mut best: Option<(Vec3, PlacementScore)> = None;

    for &y in &y_levels {
        if y + dims.y > container.y + eps {
            continue;
        }
        for &z in &zs {
            for &x in &xs {
                let position = Vec3::new(x, y, z);
                let candidate = BoundingBox::from_position_and_dims(position, dims);

                if placed.iter().any(|p| p.bounds.intersects(&candidate, eps)) {
                    continue;
                }

                if y > config.height_epsilon {
                    if !has_sufficient_support(&candidate, placed, config) {
                        continue;
                    }
                    if !is_center_supported(&candidate, placed, config) {
                        continue;
                    }
                }

                let score = PlacementScore { y, z, x };
                let better = match &best {
                    None => true,
                    Some((_, current)) => is_better_score(score, *current, config),
                };
                if better {
                    best = Some((position, score));
                }
            }
        }
        // Every position on a higher level scores worse.
        if best.is_some() {
            break;
        }
    }

    best
}

/// Candidate coordinates along one axis, sorted and deduplicated.
fn axis_positions(
    container_len: f64,
    object_len: f64,
    step: f64,
    epsilon: f64,
    edges: impl Iterator<Item = f64>,
) -> Vec<f64> {
    let max_pos = container_len - object_len;
    if max_pos < -epsilon {
        return Vec::new();
    }
    let max_pos = max_pos.max(0.0);

    let mut positions = vec![0.0];
    positions.extend(edges.filter(|e| *e <= max_pos + epsilon).map(|e| e.min(max_pos)));

    if step > epsilon {
        let step = step.max(max_pos / PlannerConfig::MAX_GRID_POSITIONS as f64);
        let mut pos = step;
        while pos <= max_pos + epsilon {
            positions.push(pos.min(max_pos));
            pos += step;
        }
        positions.push(max_pos);
    }

    positions.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    positions.dedup_by(|a, b| (*a - *b).abs() < epsilon);
    positions
}

/// Share of the footprint resting on top faces at the candidate's height.
fn has_sufficient_support(candidate: &BoundingBox, placed: &[Placement], config: &PlannerConfig) -> bool {
    let base_area = candidate.dimensions().footprint_area();
    if base_area <= config.general_epsilon {
        return false;
    }

    let support_area: f64 = placed
        .iter()
        .filter(|p| (candidate.min.y - p.bounds.top_y()).abs() < config.height_epsilon)
        .map(|p| candidate.overlap_area_xz(&p.bounds))
        .sum();

    support_area / base_area + config.general_epsilon >= config.support_ratio
}

/// Whether a supporting top face lies directly under the footprint center.
fn is_center_supported(candidate: &BoundingBox, placed: &[Placement], config: &PlannerConfig) -> bool {
    let center_x = (candidate.min.x + candidate.max.x) / 2.0;
    let center_z = (candidate.min.z + candidate.max.z) / 2.0;

    placed.iter().any(|p| {
        (candidate.min.y - p.bounds.top_y()).abs() < config.height_epsilon
            && p.bounds.footprint_contains(center_x, center_z)
    })
}

/// Lower is better: y first, then z, then x.
#[derive(Clone, Copy, Debug)]
struct PlacementScore {
    y: f64,
    z: f64,
    x: f64,
}

fn is_better_score(new: PlacementScore, current: PlacementScore, config: &PlannerConfig) -> bool {
    match compare_with_epsilon(new.y, current.y, config.height_epsilon) {
        Ordering::Less => return true,
        Ordering::Greater => return false,
        Ordering::Equal => {}
    }

    match compare_with_epsilon(new.z, current.z, config.general_epsilon) {
        Ordering::Less => return true,
        Ordering::Greater => return false,
        Ordering::Equal => {}
    }

    compare_with_epsilon(new.x, current.x, config.general_epsilon) == Ordering::Less
}

fn compare_with_epsilon(a: f64, b: f64, eps: f64) -> Ordering {
    if (a - b).abs() <= eps {
        Ordering::Equal
    } else if a < b {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn boxed(n: u64, w: f64, h: f64, d: f64) -> BoxRecord {
        BoxRecord::new(n, w, h, d).unwrap()
    }

    fn id(n: u64) -> BoxId {
        BoxId::from(n)
    }

    fn cube_container(side: f64) -> Container {
        Container::new(side, side, side).unwrap()
    }

    /// Every input id appears exactly once across plan and left-overs.
    fn assert_partition(plan: &LoadingPlan, boxes: &[BoxRecord]) {
        let mut ids: Vec<BoxId> = plan
            .plan
            .iter()
            .map(|p| p.box_id.clone())
            .chain(plan.left_over_boxes.iter().cloned())
            .collect();
        ids.sort_unstable();
        let mut expected: Vec<BoxId> = boxes.iter().map(|b| b.id.clone()).collect();
        expected.sort_unstable();
        assert_eq!(ids, expected);
    }

    #[test]
    fn single_box_fits() {
        let boxes = vec![boxed(1, 50.0, 50.0, 50.0)];
        let plan = plan_container(&cube_container(100.0), &boxes);

        assert_eq!(plan.plan.len(), 1);
        assert_eq!(plan.plan[0].box_id, id(1));
        assert_eq!((plan.plan[0].x, plan.plan[0].y, plan.plan[0].z), (0, 0, 0));
        assert!(plan.left_over_boxes.is_empty());
        assert_eq!(plan.remarks, "All boxes fitted in the container.");
        assert_relative_eq!(plan.utilized_space, 0.125);
    }

    #[test]
    fn oversized_box_is_left_over() {
        let boxes = vec![boxed(9, 50.0, 50.0, 50.0)];
        let plan = plan_container(&cube_container(10.0), &boxes);

        assert!(plan.plan.is_empty());
        assert_eq!(plan.left_over_boxes, vec![id(9)]);
        assert_eq!(plan.remarks, "1 boxes did not fit in the container.");
        assert_eq!(
            plan.rejections,
            vec![Rejection {
                box_id: id(9),
                reason: UnplacedReason::DimensionsExceedContainer
            }]
        );
        assert_eq!(plan.utilized_space, 0.0);
    }

    #[test]
    fn empty_input_gives_empty_plan() {
        let plan = plan_container(&cube_container(10.0), &[]);
        assert!(plan.plan.is_empty());
        assert!(plan.left_over_boxes.is_empty());
        assert_eq!(plan.remarks, "All boxes fitted in the container.");
    }

    #[test]
    fn invalid_container_rejects_everything() {
        let boxes = vec![boxed(1, 1.0, 1.0, 1.0), boxed(2, 2.0, 2.0, 2.0)];
        let plan = plan_container(&Container::unchecked(10.0, 0.0, 10.0), &boxes);

        assert!(plan.plan.is_empty());
        assert_eq!(plan.left_over_boxes, vec![id(1), id(2)]);
        assert_eq!(plan.remarks, "2 boxes did not fit in the container.");
        assert!(plan
            .rejections
            .iter()
            .all(|r| r.reason == UnplacedReason::InvalidContainer));
        assert_eq!(plan.utilized_space, 0.0);
    }

    #[test]
    fn planning_is_deterministic() {
        let boxes = vec![
            boxed(1, 30.0, 20.0, 30.0),
            boxed(2, 20.0, 40.0, 25.0),
            boxed(3, 10.0, 20.0, 10.0),
            boxed(4, 50.0, 30.0, 40.0),
            boxed(5, 60.0, 40.0, 50.0),
            boxed(6, 30.0, 20.0, 30.0),
        ];
        let container = cube_container(100.0);
        let first = plan_container(&container, &boxes);
        let second = plan_container(&container, &boxes);
        assert_eq!(first, second);
        assert_partition(&first, &boxes);
    }

    #[test]
    fn uuid_ids_flow_through_the_plan() {
        let boxes = vec![
            BoxRecord::new("9b1deb4d-3b7d-4bad-9bdd-2b0d7b3dcb6d", 10.0, 10.0, 10.0).unwrap(),
            BoxRecord::new("1b9d6bcd-bbfd-4b2d-9b5d-ab8dfbbd4bed", 50.0, 50.0, 50.0).unwrap(),
        ];
        let plan = plan_container(&cube_container(20.0), &boxes);

        assert_eq!(plan.plan[0].box_id.as_str(), "9b1deb4d-3b7d-4bad-9bdd-2b0d7b3dcb6d");
        assert_eq!(
            plan.left_over_boxes,
            vec![BoxId::new("1b9d6bcd-bbfd-4b2d-9b5d-ab8dfbbd4bed")]
        );
        assert_partition(&plan, &boxes);
    }

    #[test]
    fn largest_box_goes_first_into_the_corner() {
        let boxes = vec![boxed(1, 10.0, 10.0, 10.0), boxed(2, 40.0, 40.0, 40.0)];
        let plan = plan_container(&cube_container(100.0), &boxes);

        assert_eq!(plan.plan[0].box_id, id(2));
        assert_eq!((plan.plan[0].x, plan.plan[0].y, plan.plan[0].z), (0, 0, 0));
    }

    #[test]
    fn floor_fills_left_to_right_before_moving_forward() {
        // Two cubes per axis fit on the floor; no stacking room.
        let container = Container::new(20.0, 10.0, 20.0).unwrap();
        let boxes: Vec<BoxRecord> = (1..=4).map(|id| boxed(id, 10.0, 10.0, 10.0)).collect();
        let plan = plan_container(&container, &boxes);

        assert!(plan.is_complete());
        let slots: Vec<(usize, usize, usize)> = plan.plan.iter().map(|p| (p.x, p.y, p.z)).collect();
        assert_eq!(slots, vec![(0, 0, 0), (1, 0, 0), (0, 0, 1), (1, 0, 1)]);
        assert_relative_eq!(plan.utilized_space, 1.0);
    }

    #[test]
    fn boxes_stack_once_the_floor_is_full() {
        let container = Container::new(10.0, 30.0, 10.0).unwrap();
        let boxes: Vec<BoxRecord> = (1..=3).map(|id| boxed(id, 10.0, 10.0, 10.0)).collect();
        let plan = plan_container(&container, &boxes);

        assert!(plan.is_complete());
        let levels: Vec<usize> = plan.plan.iter().map(|p| p.y).collect();
        assert_eq!(levels, vec![0, 1, 2]);
    }

    #[test]
    fn overhanging_box_needs_support() {
        // A 10x10 footprint on top of a 4x10 box is only 40% supported.
        let container = Container::new(10.0, 20.0, 10.0).unwrap();
        let boxes = vec![boxed(1, 4.0, 10.0, 10.0), boxed(2, 10.0, 5.0, 10.0)];
        let planner = ContainerPlanner::new(PlannerConfig::builder().largest_first(false).build());
        let plan = planner.plan(&container, &boxes);

        assert_eq!(plan.left_over_boxes, vec![id(2)]);
        assert_eq!(plan.rejections[0].reason, UnplacedReason::NoStablePosition);
    }

    #[test]
    fn lower_support_ratio_accepts_overhang_with_center_support() {
        let container = Container::new(10.0, 20.0, 10.0).unwrap();
        let boxes = vec![boxed(1, 6.0, 10.0, 10.0), boxed(2, 10.0, 5.0, 10.0)];
        let planner = ContainerPlanner::new(
            PlannerConfig::builder()
                .largest_first(false)
                .support_ratio(0.5)
                .build(),
        );
        let plan = planner.plan(&container, &boxes);
        assert!(plan.is_complete());
        assert_eq!(plan.plan[1].y, 1);
    }

    #[test]
    fn capacity_limits_the_plan() {
        let container = cube_container(100.0).with_max_items(2);
        let boxes: Vec<BoxRecord> = (1..=3).map(|id| boxed(id, 10.0, 10.0, 10.0)).collect();
        let plan = plan_container(&container, &boxes);

        assert_eq!(plan.plan.len(), 2);
        assert_eq!(plan.left_over_boxes, vec![id(3)]);
        assert_eq!(plan.rejections[0].reason, UnplacedReason::CapacityReached);
    }

    #[test]
    fn invalid_box_dimensions_are_rejected() {
        let mut bad = boxed(1, 1.0, 1.0, 1.0);
        bad.depth = -1.0;
        let plan = plan_container(&cube_container(10.0), &[bad]);
        assert_eq!(plan.rejections[0].reason, UnplacedReason::InvalidDimensions);
    }

    #[test]
    fn rotation_lets_a_tall_box_lie_down() {
        let container = Container::new(100.0, 20.0, 20.0).unwrap();
        let boxes = vec![boxed(1, 10.0, 80.0, 10.0)];

        let fixed = plan_container(&container, &boxes);
        assert_eq!(fixed.left_over_boxes, vec![id(1)]);

        let rotating = ContainerPlanner::new(PlannerConfig::builder().allow_rotations(true).build());
        let plan = rotating.plan(&container, &boxes);
        assert!(plan.is_complete());
        assert_eq!(plan.plan[0].orientation, Orientation::Hwd);
    }

    #[test]
    fn progress_events_mirror_the_plan() {
        let boxes = vec![boxed(1, 10.0, 10.0, 10.0), boxed(2, 50.0, 50.0, 50.0)];
        let mut events = Vec::new();
        let plan = ContainerPlanner::default().plan_with_progress(
            &cube_container(20.0),
            &boxes,
            |e| events.push(e.clone()),
        );

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], PlanEvent::ItemRejected { box_id, .. } if *box_id == id(2)));
        assert!(matches!(&events[1], PlanEvent::ItemPlaced { box_id, .. } if *box_id == id(1)));
        match &events[2] {
            PlanEvent::Finished {
                placed, left_over, ..
            } => {
                assert_eq!(*placed, plan.plan.len());
                assert_eq!(*left_over, plan.left_over_boxes.len());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn grid_step_adds_positions() {
        let positions = axis_positions(10.0, 2.0, 3.0, 1e-6, std::iter::empty());
        assert_eq!(positions, vec![0.0, 3.0, 6.0, 8.0]);

        let edges_only = axis_positions(10.0, 2.0, 0.0, 1e-6, [4.0, 9.0].into_iter());
        assert_eq!(edges_only, vec![0.0, 4.0]);
    }

    #[test]
    fn fine_grid_is_coarsened() {
        let positions = axis_positions(1000.0, 0.0, 1e-5, 1e-9, std::iter::empty());
        assert!(positions.len() <= PlannerConfig::MAX_GRID_POSITIONS + 2);
        assert_eq!(positions.first(), Some(&0.0));
        assert_eq!(positions.last(), Some(&1000.0));
    }

    #[test]
    fn ordinal_ranks_are_dense() {
        let ranks = ordinal_ranks([0.0, 10.0, 0.0, 25.0, 10.0].into_iter(), 1e-6);
        assert_eq!(ranks, vec![0, 1, 0, 2, 1]);
    }
}
