//! Types and motion-processing logic shared by the bridge server, its test
//! client and the integration tests.
//!
//! The phone posts raw tilt samples, the [`smoother`] turns them into a
//! filtered estimate and the [`mapper`] converts that estimate into the values
//! the block-programming client polls for. Wire payloads exchanged over HTTP
//! live at the bottom of this file.

pub mod mapper;
pub mod smoother;

pub use mapper::{Axis, MappingConfig, ReadState, ResponseCurve, ScaleReading};
pub use smoother::{MotionFilter, OutlierGuard, SmoothingConfig, SmoothingPolicy};

use serde::{Deserialize, Serialize};

/// Default number of characters in a session token.
pub const TOKEN_LENGTH: usize = 8;
/// Center of the discrete 1..=9 scale.
pub const CENTER_SCALE: u8 = 5;
/// Center of the bounded single-axis range.
pub const CENTER_AXIS: i32 = 0;
/// Scale text returned whenever no fresh reading is available.
pub const CENTER_SCALE_TEXT: &str = "X05Y05";

/// Returns true once a session of the given age is past its time-to-live.
///
/// A session whose age equals the TTL is still live. Every read path and the
/// background sweep go through this comparison.
pub fn is_expired(age_ms: u64, ttl_ms: u64) -> bool {
    age_ms > ttl_ms
}

/// A single X/Y motion reading.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionSample {
    pub x: f64,
    pub y: f64,
}

impl MotionSample {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Tuning knobs for the whole motion pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionConfig {
    pub smoothing: SmoothingConfig,
    pub mapping: MappingConfig,
}

/// A coordinate as sent by the phone: browsers post either JSON numbers or
/// the string form of a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MotionValue {
    Number(f64),
    Text(String),
}

impl MotionValue {
    /// Parses the value, rejecting anything that is not a finite number.
    pub fn to_finite(&self) -> Option<f64> {
        let value = match self {
            MotionValue::Number(n) => *n,
            MotionValue::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

/// Body of `POST /update` (also accepted as query parameters).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    /// Missing tokens deserialize as empty and are reported as unknown
    #[serde(default)]
    pub token: String,
    pub x: MotionValue,
    pub y: MotionValue,
}

/// Reply to `POST /start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    pub ok: bool,
    pub token: String,
}

/// Reply to an accepted (possibly throttled) update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub ok: bool,
    pub throttled: bool,
    pub x: f64,
    pub y: f64,
    pub updates: u64,
}

/// Reply to `POST /stop/{token}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopResponse {
    pub ok: bool,
    pub removed: bool,
}

/// Reply to `GET /latest/{token}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestResponse {
    /// Filtered estimate
    pub x: f64,
    pub y: f64,
    /// Last sample as posted, before smoothing
    pub raw: Option<MotionSample>,
    pub updates: u64,
    pub throttled: u64,
    /// Samples currently held in the smoothing window
    pub window: usize,
    pub age_ms: u64,
}

/// Structured error body for the write endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
    pub message: String,
}
