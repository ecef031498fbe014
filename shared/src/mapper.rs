//! Range mapping from filtered motion to client-facing values
//!
//! Two representations are produced:
//! - a bounded integer per axis (`-B..=B`) for the single-axis endpoints
//! - a discrete 1..=9 scale per axis, formatted as the fixed `X##Y##` text the
//!   block-programming client parses positionally
//!
//! Readings outside the sanity bound are treated as sensor faults and collapse
//! to the center value, as do stale and unknown sessions.

use crate::{is_expired, MotionSample, CENTER_AXIS, CENTER_SCALE};
use serde::{Deserialize, Serialize};

/// Shape applied to the normalized value before it is mapped to the scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseCurve {
    Linear,
    /// `sign(n) * |n|^0.5`, more sensitive near the center
    Sqrt,
}

impl ResponseCurve {
    fn apply(self, n: f64) -> f64 {
        match self {
            ResponseCurve::Linear => n,
            ResponseCurve::Sqrt => n.signum() * n.abs().sqrt(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub fn of(self, sample: MotionSample) -> f64 {
        match self {
            Axis::X => sample.x,
            Axis::Y => sample.y,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Multiplier applied before rounding on the single-axis endpoints
    pub sensitivity: f64,
    /// Single-axis output is clamped to `-axis_bound..=axis_bound`
    pub axis_bound: i32,
    /// Input range `[-R, R]` spread across the 1..=9 scale
    pub input_range: f64,
    pub curve: ResponseCurve,
    /// Readings with any axis beyond this magnitude are treated as corrupted
    pub sanity_bound: f64,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            sensitivity: 1.0,
            axis_bound: 5,
            input_range: 10.0,
            curve: ResponseCurve::Linear,
            sanity_bound: 20.0,
        }
    }
}

/// Discrete scale values for both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleReading {
    pub x: u8,
    pub y: u8,
}

impl ScaleReading {
    pub fn center() -> Self {
        Self {
            x: CENTER_SCALE,
            y: CENTER_SCALE,
        }
    }
}

/// Freshness of a session as seen by a read endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    Fresh,
    Stale,
    Absent,
}

impl ReadState {
    /// `age_ms` is `None` when the token is unknown.
    pub fn classify(age_ms: Option<u64>, ttl_ms: u64) -> Self {
        match age_ms {
            None => ReadState::Absent,
            Some(age) if is_expired(age, ttl_ms) => ReadState::Stale,
            Some(_) => ReadState::Fresh,
        }
    }
}

impl MappingConfig {
    pub fn is_corrupted(&self, sample: MotionSample) -> bool {
        !sample.is_finite()
            || sample.x.abs() > self.sanity_bound
            || sample.y.abs() > self.sanity_bound
    }

    /// `clamp(round(v * sensitivity), -B, B)`
    pub fn axis_value(&self, v: f64) -> i32 {
        let bound = self.axis_bound.saturating_abs();
        let scaled = (v * self.sensitivity).round();
        if !scaled.is_finite() {
            return CENTER_AXIS;
        }
        (scaled.clamp(-(bound as f64), bound as f64)) as i32
    }

    /// Maps `v` onto 1..=9; 0 lands on the center. A non-positive or NaN
    /// input range maps everything to the center.
    pub fn scale(&self, v: f64) -> u8 {
        if !v.is_finite() || self.input_range.is_nan() || self.input_range <= 0.0 {
            return CENTER_SCALE;
        }
        let range = self.input_range;
        let normalized = v.clamp(-range, range) / range;
        let curved = self.curve.apply(normalized);
        let mapped = ((curved + 1.0) / 2.0) * 8.0 + 1.0;
        mapped.round().clamp(1.0, 9.0) as u8
    }

    pub fn axis_reading(&self, sample: MotionSample, axis: Axis) -> i32 {
        if self.is_corrupted(sample) {
            return CENTER_AXIS;
        }
        self.axis_value(axis.of(sample))
    }

    pub fn scale_reading(&self, sample: MotionSample) -> ScaleReading {
        if self.is_corrupted(sample) {
            return ScaleReading::center();
        }
        ScaleReading {
            x: self.scale(sample.x),
            y: self.scale(sample.y),
        }
    }
}

/// Fixed six-character `X##Y##` text, e.g. `X05Y05`.
pub fn format_scale(reading: ScaleReading) -> String {
    format!("X{:02}Y{:02}", reading.x.min(99), reading.y.min(99))
}
