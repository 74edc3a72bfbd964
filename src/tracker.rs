//! Temporal stabilisation of side measurements for one tracked box.
//!
//! Depth readings jitter from frame to frame. A [`MeasurementTracker`] keeps a
//! bounded history of the measurements of a single physical box and replaces
//! the depth-derived sides with an outlier-filtered median once enough samples
//! have been collected. A tracker must not be shared between tracking sessions.

use std::collections::VecDeque;
use std::time::Instant;

use log::{debug, info};

use crate::dimensions::Dimensions;
use crate::stats::iqr_filtered_median;

/// Source of monotonic capture timestamps in milliseconds.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Milliseconds elapsed since the clock was created.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Tunables of the stabilisation window.
#[derive(Clone, Copy, Debug)]
pub struct TrackerConfig {
    /// Maximum number of retained measurements (oldest evicted first).
    pub max_history: usize,
    /// Gap between two captures after which the box counts as a new one.
    pub lost_timeout_ms: u64,
    /// Up to this many samples the raw measurement is returned unchanged.
    pub min_samples: usize,
    /// IQR fence factor for outlier rejection.
    pub iqr_factor: f64,
}

impl TrackerConfig {
    pub const DEFAULT_MAX_HISTORY: usize = 100;
    pub const DEFAULT_LOST_TIMEOUT_MS: u64 = 5000;
    pub const DEFAULT_MIN_SAMPLES: usize = 5;
    pub const DEFAULT_IQR_FACTOR: f64 = 3.0;
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_history: Self::DEFAULT_MAX_HISTORY,
            lost_timeout_ms: Self::DEFAULT_LOST_TIMEOUT_MS,
            min_samples: Self::DEFAULT_MIN_SAMPLES,
            iqr_factor: Self::DEFAULT_IQR_FACTOR,
        }
    }
}

/// 1-based positions of the depth-derived sides.
pub const UNSTABLE_SIDES: [usize; 3] = [3, 4, 5];

/// One accepted measurement with its capture time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackedMeasurement {
    pub dimensions: Dimensions,
    pub captured_at_ms: u64,
}

/// Lifecycle of a tracked box, derived from the history length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// Nothing recorded yet, or the box was lost.
    #[default]
    Empty,
    /// Recording, but too few samples to stabilise.
    Warming,
    /// Enough samples; outputs are stabilised.
    Stable,
}

pub struct MeasurementTracker<C: Clock = MonotonicClock> {
    config: TrackerConfig,
    clock: C,
    history: VecDeque<TrackedMeasurement>,
}

impl MeasurementTracker<MonotonicClock> {
    pub fn new(config: TrackerConfig) -> Self {
        Self::with_clock(config, MonotonicClock::new())
    }
}

impl Default for MeasurementTracker<MonotonicClock> {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl<C: Clock> MeasurementTracker<C> {
    pub fn with_clock(config: TrackerConfig, clock: C) -> Self {
        Self {
            config,
            clock,
            history: VecDeque::with_capacity(config.max_history.min(1024)),
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn history(&self) -> impl Iterator<Item = &TrackedMeasurement> {
        self.history.iter()
    }

    pub fn state(&self) -> TrackState {
        match self.history.len() {
            0 => TrackState::Empty,
            n if n <= self.config.min_samples => TrackState::Warming,
            _ => TrackState::Stable,
        }
    }

    /// Forgets every recorded measurement.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Feeds the outcome of one detection cycle.
    ///
    /// `None` (nothing detected) leaves the history untouched and yields `None`;
    /// loss is decided by elapsed time, not by single missed frames.
    pub fn update(&mut self, dimensions: Option<Dimensions>) -> Option<Dimensions> {
        let dimensions = dimensions?;
        let now = self.clock.now_ms();
        Some(self.record(dimensions, now))
    }

    /// Records a measurement captured at `captured_at_ms` and returns the
    /// stabilised dimensions.
    pub fn record(&mut self, dimensions: Dimensions, captured_at_ms: u64) -> Dimensions {
        if let Some(last) = self.history.back() {
            let gap = captured_at_ms.saturating_sub(last.captured_at_ms);
            if gap > self.config.lost_timeout_ms {
                info!(
                    "tracking reset after {} ms without measurements ({} samples dropped)",
                    gap,
                    self.history.len()
                );
                self.history.clear();
            }
        }

        self.history.push_back(TrackedMeasurement {
            dimensions,
            captured_at_ms,
        });
        while self.history.len() > self.config.max_history.max(1) {
            self.history.pop_front();
        }

        if self.history.len() <= self.config.min_samples {
            return dimensions;
        }

        let mut stabilized = dimensions;
        for position in UNSTABLE_SIDES {
            let values: Vec<f64> = self
                .history
                .iter()
                .filter_map(|m| m.dimensions.side(position).value)
                .collect();
            if let Some(median) = iqr_filtered_median(&values, self.config.iqr_factor) {
                stabilized = stabilized.with_value(position, Some(median.trunc()));
            }
        }
        debug!(
            "stabilised over {} samples: width {:.1}, height {:.1}, depth {:.1}",
            self.history.len(),
            stabilized.width(),
            stabilized.height(),
            stabilized.depth()
        );
        stabilized
    }
}

/// Records `dimensions` now and returns the stabilised measurement.
pub fn stabilize<C: Clock>(tracker: &mut MeasurementTracker<C>, dimensions: Dimensions) -> Dimensions {
    let now = tracker.clock.now_ms();
    tracker.record(dimensions, now)
}
