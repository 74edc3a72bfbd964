//! Side lengths of a measured box outline.

use log::debug;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::corners::CORNER_COUNT;
use crate::distance::DistanceProvider;
use crate::types::Point2D;

/// Edge of the outline between two consecutive corners.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Side {
    pub point1: Point2D,
    pub point2: Point2D,
    /// Real-world length, `None` while unresolved.
    #[serde(default)]
    pub value: Option<f64>,
}

impl Side {
    pub fn new(point1: Point2D, point2: Point2D, value: Option<f64>) -> Self {
        Self {
            point1,
            point2,
            value,
        }
    }

    /// Length or `0.0` when unresolved.
    #[inline]
    pub fn length(&self) -> f64 {
        self.value.unwrap_or(0.0)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DimensionsError {
    #[error("a box outline has exactly 6 sides, got {got}")]
    SideCount { got: usize },
}

/// Six sides forming a closed loop around the outline.
///
/// Positions are fixed once the corners are ordered: side 3, 4 and 5 carry
/// the width, height and depth of the box respectively.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Dimensions {
    #[schema(value_type = Vec<Side>)]
    sides: [Side; CORNER_COUNT],
}

impl Dimensions {
    pub fn new(sides: [Side; CORNER_COUNT]) -> Self {
        Self { sides }
    }

    pub fn sides(&self) -> &[Side; CORNER_COUNT] {
        &self.sides
    }

    /// Side at a 1-based position.
    ///
    /// # Panics
    /// If `position` is not in `1..=6`.
    pub fn side(&self, position: usize) -> &Side {
        assert!(
            (1..=CORNER_COUNT).contains(&position),
            "side position {position} out of range"
        );
        &self.sides[position - 1]
    }

    pub fn side1(&self) -> &Side {
        &self.sides[0]
    }

    pub fn side2(&self) -> &Side {
        &self.sides[1]
    }

    pub fn side3(&self) -> &Side {
        &self.sides[2]
    }

    pub fn side4(&self) -> &Side {
        &self.sides[3]
    }

    pub fn side5(&self) -> &Side {
        &self.sides[4]
    }

    pub fn side6(&self) -> &Side {
        &self.sides[5]
    }

    pub fn width(&self) -> f64 {
        self.side3().length()
    }

    pub fn height(&self) -> f64 {
        self.side4().length()
    }

    pub fn depth(&self) -> f64 {
        self.side5().length()
    }

    /// Product of all six side values, `0.0` if any side is unresolved.
    pub fn volume(&self) -> f64 {
        if self.sides.iter().any(|s| s.value.is_none()) {
            return 0.0;
        }
        self.sides.iter().map(Side::length).product()
    }

    /// Whether every side has a resolved length.
    pub fn is_complete(&self) -> bool {
        self.sides.iter().all(|s| s.value.is_some())
    }

    /// Copy with the value at a 1-based position replaced.
    ///
    /// # Panics
    /// If `position` is not in `1..=6`.
    pub(crate) fn with_value(mut self, position: usize, value: Option<f64>) -> Self {
        assert!(
            (1..=CORNER_COUNT).contains(&position),
            "side position {position} out of range"
        );
        self.sides[position - 1].value = value;
        self
    }
}

impl TryFrom<Vec<Side>> for Dimensions {
    type Error = DimensionsError;

    fn try_from(sides: Vec<Side>) -> Result<Self, Self::Error> {
        let got = sides.len();
        let sides: [Side; CORNER_COUNT] = sides
            .try_into()
            .map_err(|_| DimensionsError::SideCount { got })?;
        Ok(Self::new(sides))
    }
}

/// Builds the six sides of an ordered corner loop and resolves their lengths.
///
/// Side `i` connects `corners[i]` to `corners[(i + 1) % 6]`. A side whose
/// distance cannot be resolved stays unset.
pub fn compute_dimensions<D>(corners: &[Point2D; CORNER_COUNT], distance: &D) -> Dimensions
where
    D: DistanceProvider + ?Sized,
{
    let sides = std::array::from_fn(|i| {
        let point1 = corners[i];
        let point2 = corners[(i + 1) % CORNER_COUNT];
        let value = match distance.distance(point1, point2) {
            Ok(value) if value.is_finite() && value >= 0.0 => Some(value),
            Ok(value) => {
                debug!("discarding invalid length {} for side {}", value, i + 1);
                None
            }
            Err(err) => {
                debug!("side {} unresolved: {}", i + 1, err);
                None
            }
        };
        Side::new(point1, point2, value)
    });
    Dimensions::new(sides)
}
