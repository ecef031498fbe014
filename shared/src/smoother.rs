//! Sample smoothing over a bounded window of recent readings
//!
//! Phones report tilt at irregular rates and with occasional spikes (a hand
//! twitch, the device being set down). Each session keeps a short FIFO of
//! accepted samples and its filtered estimate is recomputed from that window
//! on every update, so the estimate is always a pure function of the window.

use crate::MotionSample;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// How the samples in the window are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmoothingPolicy {
    /// Arithmetic mean of the window
    Simple,
    /// Sample `i` (oldest = 1) weighted by `i²`, normalized
    Weighted,
}

/// Blends a sample that jumps too far from the current estimate instead of
/// inserting it raw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierGuard {
    /// Per-axis deviation from the previous estimate that marks a spike
    pub threshold: f64,
    /// Share of the previous estimate kept when a spike is blended
    pub previous_weight: f64,
}

impl Default for OutlierGuard {
    fn default() -> Self {
        Self {
            threshold: 5.0,
            previous_weight: 0.6,
        }
    }
}

impl OutlierGuard {
    fn apply(&self, previous: f64, raw: f64) -> f64 {
        if (raw - previous).abs() > self.threshold {
            self.previous_weight * previous + (1.0 - self.previous_weight) * raw
        } else {
            raw
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothingConfig {
    /// Maximum number of samples kept per session
    pub window_size: usize,
    pub policy: SmoothingPolicy,
    /// `None` inserts every sample unchanged
    pub outlier_guard: Option<OutlierGuard>,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            window_size: 3,
            policy: SmoothingPolicy::Weighted,
            outlier_guard: Some(OutlierGuard::default()),
        }
    }
}

/// Per-session smoothing state: the sample window and the estimate derived
/// from it.
#[derive(Debug, Clone, Default)]
pub struct MotionFilter {
    history: VecDeque<MotionSample>,
    filtered: MotionSample,
}

impl MotionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current filtered estimate; zero until the first sample arrives.
    pub fn filtered(&self) -> MotionSample {
        self.filtered
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Samples currently in the window, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &MotionSample> {
        self.history.iter()
    }

    /// Feeds a raw sample through the guard and window and returns the new
    /// estimate.
    pub fn push(&mut self, raw: MotionSample, config: &SmoothingConfig) -> MotionSample {
        let window = config.window_size.max(1);

        let accepted = match (&config.outlier_guard, self.history.is_empty()) {
            (Some(guard), false) => MotionSample {
                x: guard.apply(self.filtered.x, raw.x),
                y: guard.apply(self.filtered.y, raw.y),
            },
            _ => raw,
        };

        self.history.push_back(accepted);
        while self.history.len() > window {
            self.history.pop_front();
        }

        self.filtered = match config.policy {
            SmoothingPolicy::Simple => self.mean(),
            SmoothingPolicy::Weighted => self.weighted_mean(),
        };
        self.filtered
    }

    fn mean(&self) -> MotionSample {
        let n = self.history.len() as f64;
        let (sx, sy) = self
            .history
            .iter()
            .fold((0.0, 0.0), |(sx, sy), s| (sx + s.x, sy + s.y));
        MotionSample::new(sx / n, sy / n)
    }

    fn weighted_mean(&self) -> MotionSample {
        let mut total = 0.0;
        let mut sx = 0.0;
        let mut sy = 0.0;
        for (rank, sample) in self.history.iter().enumerate() {
            let weight = ((rank + 1) * (rank + 1)) as f64;
            total += weight;
            sx += weight * sample.x;
            sy += weight * sample.y;
        }
        MotionSample::new(sx / total, sy / total)
    }
}
