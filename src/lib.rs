//! Box geometry and loading-plan engine.
//!
//! The measurement pipeline turns a polygon around a detected box into six
//! ordered corners ([`select_corners`]), resolves the side lengths through a
//! [`DistanceProvider`] ([`compute_dimensions`]), and smooths repeated
//! observations of the same box ([`stabilize`]). Measured boxes are then
//! placed into a container by [`plan_container`].

pub mod api;
pub mod config;
pub mod corners;
pub mod dimensions;
pub mod distance;
pub mod geometry;
pub mod model;
pub mod planner;
pub mod stats;
pub mod tracker;
pub mod types;

pub use corners::{CornerSelector, FrontBack, GeometryError, approximate_corners, select_corners};
pub use dimensions::{Dimensions, Side, compute_dimensions};
pub use distance::{DistanceError, DistanceProvider};
pub use model::{BoxId, BoxRecord, Container, LoadingPlan, PlacedItem};
pub use planner::{ContainerPlanner, PlanEvent, PlannerConfig, UnplacedReason, plan_container};
pub use tracker::{MeasurementTracker, TrackState, TrackerConfig, stabilize};
pub use types::Point2D;
