//! Real-world distance between two pixels.
//!
//! Side lengths are resolved through the [`DistanceProvider`] capability. Any
//! `Fn(Point2D, Point2D) -> f64` is a provider; [`DepthDistanceEstimator`]
//! resolves distances from an aligned depth frame and pinhole intrinsics.

use serde::Deserialize;
use utoipa::ToSchema;

use crate::stats::iqr_filtered_median;
use crate::types::Point2D;

/// Failure to resolve a distance for a pixel pair.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DistanceError {
    #[error("pixel ({x}, {y}) lies outside the {width}x{height} frame")]
    OutOfFrame {
        x: i32,
        y: i32,
        width: usize,
        height: usize,
    },
    #[error("no valid depth samples around ({x}, {y})")]
    NoDepth { x: i32, y: i32 },
}

/// Resolves the real-world distance between two pixels.
pub trait DistanceProvider {
    fn distance(&self, p1: Point2D, p2: Point2D) -> Result<f64, DistanceError>;
}

impl<F> DistanceProvider for F
where
    F: Fn(Point2D, Point2D) -> f64,
{
    fn distance(&self, p1: Point2D, p2: Point2D) -> Result<f64, DistanceError> {
        Ok(self(p1, p2))
    }
}

/// Euclidean distance in pixels multiplied by a fixed scale (units per pixel).
#[derive(Clone, Copy, Debug)]
pub struct PixelDistance {
    pub scale: f64,
}

impl DistanceProvider for PixelDistance {
    fn distance(&self, p1: Point2D, p2: Point2D) -> Result<f64, DistanceError> {
        Ok(p1.distance_to(&p2) * self.scale)
    }
}

/// Pinhole intrinsics of the depth stream (no lens distortion).
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, ToSchema)]
pub struct Intrinsics {
    /// Principal point x in pixels.
    pub ppx: f64,
    /// Principal point y in pixels.
    pub ppy: f64,
    /// Focal length along x in pixels.
    pub fx: f64,
    /// Focal length along y in pixels.
    pub fy: f64,
}

impl Intrinsics {
    /// Back-projects a pixel with known depth to a 3D point in camera space.
    pub fn deproject(&self, pixel: Point2D, depth: f64) -> [f64; 3] {
        let x = (f64::from(pixel.x) - self.ppx) / self.fx;
        let y = (f64::from(pixel.y) - self.ppy) / self.fy;
        [x * depth, y * depth, depth]
    }
}

/// Row-major depth image in raw sensor units (0 = no reading).
#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct DepthFrame {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u16>,
}

impl DepthFrame {
    /// Checks that the buffer matches the declared size.
    pub fn is_consistent(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.width * self.height
    }

    #[inline]
    fn at(&self, x: usize, y: usize) -> u16 {
        self.data[y * self.width + x]
    }
}

/// Tunables of the depth-based estimator.
#[derive(Clone, Copy, Debug)]
pub struct DepthSampling {
    /// Multiplier applied to the metric distance.
    pub distance_factor: f64,
    /// Converts raw depth units to the output unit.
    pub to_centimeter: f64,
    /// Half-size of the square sampling window around each endpoint, at most
    /// [`DepthSampling::MAX_WINDOW`].
    pub window: usize,
    /// IQR fence factor applied to the window samples.
    pub iqr_sigma: f64,
}

impl DepthSampling {
    pub const DEFAULT_DISTANCE_FACTOR: f64 = 0.75;
    pub const DEFAULT_TO_CENTIMETER: f64 = 0.1;
    pub const DEFAULT_WINDOW: usize = 11;
    pub const DEFAULT_IQR_SIGMA: f64 = 1.5;
    /// Largest accepted window half-size.
    pub const MAX_WINDOW: usize = 64;
}

impl Default for DepthSampling {
    fn default() -> Self {
        Self {
            distance_factor: Self::DEFAULT_DISTANCE_FACTOR,
            to_centimeter: Self::DEFAULT_TO_CENTIMETER,
            window: Self::DEFAULT_WINDOW,
            iqr_sigma: Self::DEFAULT_IQR_SIGMA,
        }
    }
}

/// Distance provider backed by a depth frame aligned to the color image.
pub struct DepthDistanceEstimator<'a> {
    frame: &'a DepthFrame,
    intrinsics: Intrinsics,
    sampling: DepthSampling,
}

impl<'a> DepthDistanceEstimator<'a> {
    pub fn new(frame: &'a DepthFrame, intrinsics: Intrinsics, sampling: DepthSampling) -> Self {
        Self {
            frame,
            intrinsics,
            sampling,
        }
    }

    /// Robust depth around `pixel`: the integer median of the positive samples
    /// in the window that survive the IQR fence.
    pub fn stable_depth(&self, pixel: Point2D) -> Result<f64, DistanceError> {
        let (w, h) = (self.frame.width, self.frame.height);
        if pixel.x < 0 || pixel.y < 0 || pixel.x as usize >= w || pixel.y as usize >= h {
            return Err(DistanceError::OutOfFrame {
                x: pixel.x,
                y: pixel.y,
                width: w,
                height: h,
            });
        }

        let (px, py) = (pixel.x as usize, pixel.y as usize);
        let k = self.sampling.window.min(DepthSampling::MAX_WINDOW);
        let (x_min, x_max) = (px.saturating_sub(k), (px + k + 1).min(w));
        let (y_min, y_max) = (py.saturating_sub(k), (py + k + 1).min(h));

        let mut samples = Vec::with_capacity((x_max - x_min) * (y_max - y_min));
        for y in y_min..y_max {
            for x in x_min..x_max {
                let raw = self.frame.at(x, y);
                if raw > 0 {
                    samples.push(f64::from(raw));
                }
            }
        }

        iqr_filtered_median(&samples, self.sampling.iqr_sigma)
            .map(f64::trunc)
            .ok_or(DistanceError::NoDepth {
                x: pixel.x,
                y: pixel.y,
            })
    }
}

impl DistanceProvider for DepthDistanceEstimator<'_> {
    fn distance(&self, p1: Point2D, p2: Point2D) -> Result<f64, DistanceError> {
        let a = self.intrinsics.deproject(p1, self.stable_depth(p1)?);
        let b = self.intrinsics.deproject(p2, self.stable_depth(p2)?);
        let norm = a
            .iter()
            .zip(b.iter())
            .map(|(u, v)| (u - v) * (u - v))
            .sum::<f64>()
            .sqrt();
        Ok(norm * self.sampling.to_centimeter * self.sampling.distance_factor)
    }
}
