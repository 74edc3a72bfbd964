//! Common types and traits for 2D image geometry and 3D container space.
//!
//! Pixel space uses integer [`Point2D`] with the origin at the top-left corner
//! of the image and `y` growing downwards. Container space uses [`Vec3`] with
//! `x` = width (left to right), `y` = height (floor upwards) and
//! `z` = depth (back to front).

use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Tolerance for bound and overlap checks in container space.
pub const EPSILON_GENERAL: f64 = 1e-6;

/// Tolerance for resting-height comparisons while stacking.
pub const EPSILON_HEIGHT: f64 = 1e-3;

/// Integer pixel coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub struct Point2D {
    pub x: i32,
    pub y: i32,
}

impl Point2D {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean norm, i.e. the distance to the image origin.
    #[inline]
    pub fn norm(&self) -> f64 {
        let x = f64::from(self.x);
        let y = f64::from(self.y);
        (x * x + y * y).sqrt()
    }

    /// Euclidean distance to another pixel.
    #[inline]
    pub fn distance_to(&self, other: &Self) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<(i32, i32)> for Point2D {
    #[inline]
    fn from(tuple: (i32, i32)) -> Self {
        Self::new(tuple.0, tuple.1)
    }
}

impl From<Point2D> for (i32, i32) {
    #[inline]
    fn from(point: Point2D) -> Self {
        (point.x, point.y)
    }
}

/// Position or extent in container space.
///
/// ```
/// use boxfit::types::Vec3;
///
/// let origin = Vec3::new(0.0, 12.0, 0.0);
/// let extent = Vec3::new(30.0, 20.0, 40.0);
/// assert_eq!(origin + extent, Vec3::new(30.0, 32.0, 40.0));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn volume(&self) -> f64 {
        self.x * self.y * self.z
    }

    /// Floor area covered by an extent.
    #[inline]
    pub fn footprint_area(&self) -> f64 {
        self.x * self.z
    }

    /// A usable box extent has three finite, strictly positive sides.
    #[inline]
    pub fn is_valid_dimension(&self) -> bool {
        self.x > 0.0
            && self.y > 0.0
            && self.z > 0.0
            && self.x.is_finite()
            && self.y.is_finite()
            && self.z.is_finite()
    }

    /// Whether this extent fits inside `outer` without rotation.
    #[inline]
    pub fn fits_within(&self, outer: &Self, tolerance: f64) -> bool {
        [(self.x, outer.x), (self.y, outer.y), (self.z, outer.z)]
            .iter()
            .all(|&(inner, limit)| inner <= limit + tolerance)
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Anything with a width, height and depth in container space.
pub trait Dimensional {
    fn dimensions(&self) -> Vec3;

    fn volume(&self) -> f64 {
        self.dimensions().volume()
    }
}

/// Axis-aligned bounding box in container space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// Back-left floor corner.
    pub min: Vec3,
    /// Front-right top corner.
    pub max: Vec3,
}

impl BoundingBox {
    #[inline]
    pub fn from_position_and_dims(position: Vec3, dims: Vec3) -> Self {
        Self {
            min: position,
            max: position + dims,
        }
    }

    /// Volume overlap test; boxes sharing a face do not intersect.
    #[inline]
    pub fn intersects(&self, other: &Self, tolerance: f64) -> bool {
        !(self.max.x <= other.min.x + tolerance
            || other.max.x <= self.min.x + tolerance
            || self.max.y <= other.min.y + tolerance
            || other.max.y <= self.min.y + tolerance
            || self.max.z <= other.min.z + tolerance
            || other.max.z <= self.min.z + tolerance)
    }

    /// Shared floor area of the two footprints.
    #[inline]
    pub fn overlap_area_xz(&self, other: &Self) -> f64 {
        let overlap_x = overlap_1d(self.min.x, self.max.x, other.min.x, other.max.x);
        let overlap_z = overlap_1d(self.min.z, self.max.z, other.min.z, other.max.z);
        overlap_x * overlap_z
    }

    /// Whether the floor point `(x, z)` lies on this footprint, edges included.
    #[inline]
    pub fn footprint_contains(&self, x: f64, z: f64) -> bool {
        x >= self.min.x && x <= self.max.x && z >= self.min.z && z <= self.max.z
    }

    #[inline]
    pub fn top_y(&self) -> f64 {
        self.max.y
    }

    #[inline]
    pub fn dimensions(&self) -> Vec3 {
        self.max - self.min
    }
}

/// Length of the overlap of two intervals, at least 0.0.
///
/// ```
/// use boxfit::types::overlap_1d;
///
/// assert_eq!(overlap_1d(0.0, 5.0, 3.0, 8.0), 2.0);
/// ```
#[inline]
pub fn overlap_1d(a1: f64, a2: f64, b1: f64, b2: f64) -> f64 {
    (a2.min(b2) - a1.max(b1)).max(0.0)
}
