//! Data models for measured boxes and loading plans.
//!
//! - `BoxId`: opaque box identifier (UUID strings in persisted records)
//! - `BoxRecord`: a measured box with its source detection metadata
//! - `Container`: the target volume of a loading plan
//! - `Orientation`: axis permutation applied to a box before placement
//! - `PlacedItem` / `LoadingPlan`: planner output
//!
//! Field names follow the persisted JSON records (`box_id`, `x`, `y`, `z`,
//! `width`, `height`, `depth`, `left_over_boxes`, `remarks`).

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToSchema;

use crate::dimensions::Dimensions;
use crate::planner::Rejection;
use crate::types::{Dimensional, Point2D, Vec3};

/// Validation error for box and container data.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid container: {0}")]
    InvalidContainer(String),
}

fn validate_dimension(value: f64, name: &str) -> Result<(), ValidationError> {
    if value <= 0.0 || !value.is_finite() {
        return Err(ValidationError::InvalidDimension(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_container_dims(width: f64, height: f64, depth: f64) -> Result<(), ValidationError> {
    for (value, name) in [(width, "width"), (height, "height"), (depth, "depth")] {
        if value <= 0.0 || !value.is_finite() {
            return Err(ValidationError::InvalidContainer(format!(
                "container {} must be positive, got: {}",
                name, value
            )));
        }
    }
    Ok(())
}

/// Opaque identifier of a box.
///
/// Persisted records carry UUID strings. Integer ids are accepted on input and
/// kept in their decimal form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = String, example = "3f2b8c1e-7a4d-4e8b-9c0f-1d2e3a4b5c6d")]
pub struct BoxId(String);

impl BoxId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last 12 characters of the id.
    pub fn short(&self) -> &str {
        let start = self
            .0
            .char_indices()
            .rev()
            .nth(11)
            .map_or(0, |(idx, _)| idx);
        &self.0[start..]
    }
}

impl fmt::Display for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BoxId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for BoxId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for BoxId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for BoxId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(id) => Self(id),
            RawId::Number(id) => Self(id.to_string()),
        })
    }
}

/// A measured box as produced by one accepted detection.
///
/// Width runs along the container's x axis, height is vertical (y) and depth
/// runs back to front (z).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "3f2b8c1e-7a4d-4e8b-9c0f-1d2e3a4b5c6d",
    "width": 30.0,
    "height": 20.0,
    "depth": 40.0
}))]
pub struct BoxRecord {
    pub id: BoxId,
    /// Reference to the source image of the detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    #[serde(default)]
    pub x1: i32,
    #[serde(default)]
    pub y1: i32,
    #[serde(default)]
    pub x2: i32,
    #[serde(default)]
    pub y2: i32,
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    /// Whether the box was selected for planning.
    #[serde(default)]
    pub inplan: bool,
}

impl BoxRecord {
    /// Creates a box with validated dimensions and no detection metadata.
    ///
    /// ```
    /// use boxfit::model::BoxRecord;
    ///
    /// assert!(BoxRecord::new("a1", 10.0, 20.0, 30.0).is_ok());
    /// assert!(BoxRecord::new("a1", -10.0, 20.0, 30.0).is_err());
    /// ```
    pub fn new(
        id: impl Into<BoxId>,
        width: f64,
        height: f64,
        depth: f64,
    ) -> Result<Self, ValidationError> {
        validate_dimension(width, "Width")?;
        validate_dimension(height, "Height")?;
        validate_dimension(depth, "Depth")?;
        Ok(Self {
            id: id.into(),
            image_ref: None,
            x1: 0,
            y1: 0,
            x2: 0,
            y2: 0,
            width,
            height,
            depth,
            inplan: false,
        })
    }

    /// Creates a box from stabilised measurements; sides 3, 4 and 5 become
    /// width, height and depth.
    pub fn from_dimensions(
        id: impl Into<BoxId>,
        dimensions: &Dimensions,
    ) -> Result<Self, ValidationError> {
        Self::new(
            id,
            dimensions.width(),
            dimensions.height(),
            dimensions.depth(),
        )
    }

    /// Attaches the detection's bounding box in image pixels.
    pub fn with_bbox(mut self, top_left: Point2D, bottom_right: Point2D) -> Self {
        self.x1 = top_left.x;
        self.y1 = top_left.y;
        self.x2 = bottom_right.x;
        self.y2 = bottom_right.y;
        self
    }

    pub fn with_image_ref(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    pub fn volume(&self) -> f64 {
        self.width * self.height * self.depth
    }

    /// Last 12 characters of the id, as shown in box lists.
    pub fn short_id(&self) -> &str {
        self.id.short()
    }

    /// Detection bounding box as (top-left, bottom-right).
    pub fn bbox(&self) -> (Point2D, Point2D) {
        (Point2D::new(self.x1, self.y1), Point2D::new(self.x2, self.y2))
    }

    #[inline]
    pub fn dims_as_vec3(&self) -> Vec3 {
        Vec3::new(self.width, self.height, self.depth)
    }
}

impl Dimensional for BoxRecord {
    fn dimensions(&self) -> Vec3 {
        self.dims_as_vec3()
    }
}

/// Sum of the volumes of `boxes`.
pub fn total_volume(boxes: &[BoxRecord]) -> f64 {
    boxes.iter().map(BoxRecord::volume).sum()
}

/// Container a loading plan is computed for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({"width": 120.0, "height": 100.0, "depth": 80.0, "max_items": 20}))]
pub struct Container {
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    /// Upper bound on placed boxes; unlimited when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
}

impl Container {
    /// Creates a container after validating its dimensions.
    pub fn new(width: f64, height: f64, depth: f64) -> Result<Self, ValidationError> {
        validate_container_dims(width, height, depth)?;
        Ok(Self::unchecked(width, height, depth))
    }

    /// Creates a container without validation. The planner treats an invalid
    /// container as one that fits nothing.
    pub fn unchecked(width: f64, height: f64, depth: f64) -> Self {
        Self {
            width,
            height,
            depth,
            max_items: None,
        }
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_container_dims(self.width, self.height, self.depth)
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    #[inline]
    pub fn dims_as_vec3(&self) -> Vec3 {
        Vec3::new(self.width, self.height, self.depth)
    }
}

impl Dimensional for Container {
    fn dimensions(&self) -> Vec3 {
        self.dims_as_vec3()
    }
}

/// Axis permutation of a box, named by which box measure lies along the
/// container's x, y and z axes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Width, height, depth: the measured orientation.
    #[default]
    Whd,
    Wdh,
    Hwd,
    Hdw,
    Dwh,
    Dhw,
}

impl Orientation {
    /// All orientations in the order the planner tries them.
    pub const ALL: [Orientation; 6] = [
        Orientation::Whd,
        Orientation::Dhw,
        Orientation::Wdh,
        Orientation::Dwh,
        Orientation::Hwd,
        Orientation::Hdw,
    ];

    /// Dimensions along the container axes for a box measured as `dims`
    /// (width, height, depth).
    pub fn apply(self, dims: Vec3) -> Vec3 {
        let (w, h, d) = (dims.x, dims.y, dims.z);
        match self {
            Orientation::Whd => Vec3::new(w, h, d),
            Orientation::Wdh => Vec3::new(w, d, h),
            Orientation::Hwd => Vec3::new(h, w, d),
            Orientation::Hdw => Vec3::new(h, d, w),
            Orientation::Dwh => Vec3::new(d, w, h),
            Orientation::Dhw => Vec3::new(d, h, w),
        }
    }
}

/// A box in the loading plan.
///
/// `x`, `y` and `z` are ordinal slot indices: the rank of the box's minimum
/// coordinate among the distinct minimum coordinates of all placed boxes on
/// that axis. Boxes sharing a slot edge share the index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PlacedItem {
    pub box_id: BoxId,
    pub x: usize,
    pub y: usize,
    pub z: usize,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
}

/// Result of one planning invocation.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct LoadingPlan {
    /// Placed boxes in placement order.
    pub plan: Vec<PlacedItem>,
    /// Ids of the boxes that could not be placed.
    pub left_over_boxes: Vec<BoxId>,
    pub remarks: String,
    /// Placed volume divided by container volume.
    pub utilized_space: f64,
    /// Reason for every left-over box.
    pub rejections: Vec<Rejection>,
}

impl LoadingPlan {
    /// Remarks text for a plan with `left_over` unplaced boxes.
    pub fn remarks_for(left_over: usize) -> String {
        if left_over == 0 {
            "All boxes fitted in the container.".to_string()
        } else {
            format!("{} boxes did not fit in the container.", left_over)
        }
    }

    pub fn is_complete(&self) -> bool {
        self.left_over_boxes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimensions::Side;
    use approx::assert_relative_eq;

    #[test]
    fn box_validation_rejects_non_positive_sides() {
        assert!(BoxRecord::new("b1", 10.0, 10.0, 10.0).is_ok());
        assert!(matches!(
            BoxRecord::new("b1", 0.0, 10.0, 10.0),
            Err(ValidationError::InvalidDimension(_))
        ));
        assert!(BoxRecord::new("b1", 10.0, f64::NAN, 10.0).is_err());
        assert!(BoxRecord::new("b1", 10.0, 10.0, f64::INFINITY).is_err());
    }

    #[test]
    fn container_validation() {
        assert!(Container::new(100.0, 100.0, 100.0).is_ok());
        assert!(matches!(
            Container::new(100.0, -1.0, 100.0),
            Err(ValidationError::InvalidContainer(_))
        ));
        assert!(!Container::unchecked(0.0, 10.0, 10.0).is_valid());
    }

    #[test]
    fn short_id_keeps_the_last_twelve_characters() {
        let mut record = BoxRecord::new("42", 1.0, 1.0, 1.0).unwrap();
        assert_eq!(record.short_id(), "42");

        record.id = BoxId::new("3f2b8c1e-7a4d-4e8b-9c0f-1d2e3a4b5c6d");
        assert_eq!(record.short_id(), "1d2e3a4b5c6d");

        record.id = BoxId::new("kiste-äöüäöüäöüäöü");
        assert_eq!(record.short_id(), "äöüäöüäöüäöü");
    }

    #[test]
    fn box_ids_accept_uuid_and_integer_json() {
        let uuid: BoxRecord = serde_json::from_value(json!({
            "id": "3f2b8c1e-7a4d-4e8b-9c0f-1d2e3a4b5c6d",
            "width": 1.0, "height": 2.0, "depth": 3.0
        }))
        .unwrap();
        assert_eq!(uuid.id.as_str(), "3f2b8c1e-7a4d-4e8b-9c0f-1d2e3a4b5c6d");

        let legacy: BoxRecord = serde_json::from_value(json!({
            "id": 17, "width": 1.0, "height": 2.0, "depth": 3.0
        }))
        .unwrap();
        assert_eq!(legacy.id, BoxId::from(17u64));
        assert_eq!(serde_json::to_value(&legacy.id).unwrap(), json!("17"));
    }

    #[test]
    fn volumes() {
        let a = BoxRecord::new("b1", 2.0, 3.0, 4.0).unwrap();
        let b = BoxRecord::new("b2", 1.0, 1.0, 1.0).unwrap();
        assert_relative_eq!(a.volume(), 24.0);
        assert_relative_eq!(Dimensional::volume(&a), 24.0);
        assert_relative_eq!(total_volume(&[a, b]), 25.0);
        assert_relative_eq!(total_volume(&[]), 0.0);
    }

    #[test]
    fn from_dimensions_maps_sides_three_to_five() {
        let p = Point2D::new(0, 0);
        let side = |v: f64| Side::new(p, p, Some(v));
        let dims = Dimensions::new([side(1.0), side(2.0), side(30.0), side(20.0), side(40.0), side(6.0)]);

        let record = BoxRecord::from_dimensions("b3", &dims).unwrap();
        assert_eq!(record.width, 30.0);
        assert_eq!(record.height, 20.0);
        assert_eq!(record.depth, 40.0);
    }

    #[test]
    fn bbox_round_trips_through_builder() {
        let record = BoxRecord::new("b1", 1.0, 1.0, 1.0)
            .unwrap()
            .with_bbox(Point2D::new(10, 20), Point2D::new(110, 220))
            .with_image_ref("frame-0001.png");
        assert_eq!(record.bbox(), (Point2D::new(10, 20), Point2D::new(110, 220)));
        assert_eq!(record.image_ref.as_deref(), Some("frame-0001.png"));
    }

    #[test]
    fn orientations_are_distinct_permutations() {
        let dims = Vec3::new(1.0, 2.0, 3.0);
        let mut seen: Vec<(f64, f64, f64)> = Orientation::ALL
            .iter()
            .map(|o| o.apply(dims))
            .map(|v| (v.x, v.y, v.z))
            .collect();
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
        seen.dedup();
        assert_eq!(seen.len(), 6);
        assert_eq!(Orientation::Whd.apply(dims), dims);
        assert_eq!(Orientation::ALL[0], Orientation::default());
    }

    #[test]
    fn remarks_text() {
        assert_eq!(LoadingPlan::remarks_for(0), "All boxes fitted in the container.");
        assert_eq!(LoadingPlan::remarks_for(1), "1 boxes did not fit in the container.");
    }

    #[test]
    fn box_json_uses_persisted_field_names() {
        let record: BoxRecord = serde_json::from_value(json!({
            "id": "b5", "width": 1.0, "height": 2.0, "depth": 3.0
        }))
        .unwrap();
        assert!(!record.inplan);
        assert_eq!(record.bbox(), (Point2D::new(0, 0), Point2D::new(0, 0)));

        let item = PlacedItem {
            box_id: record.id.clone(),
            x: 0,
            y: 1,
            z: 2,
            orientation: Orientation::Whd,
            image_ref: None,
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["box_id"], "b5");
        assert_eq!(value["y"], 1);
        assert_eq!(value["orientation"], "whd");
        assert!(value.get("image_ref").is_none());
    }
}
