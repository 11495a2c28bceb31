//! Hands-down detection: the signer lowered their hands for long enough.

use crate::features::landmarks::LandmarkFrame;
use serde::{Deserialize, Serialize};

/// Configuration for [`HandsDownDetector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandsDownConfig {
    /// Wrist y beyond which a hand counts as lowered (1.0 = bottom of frame).
    pub threshold_y: f32,
    /// How long the hands must stay lowered (ms).
    pub duration_ms: u64,
}

impl Default for HandsDownConfig {
    fn default() -> Self {
        Self {
            threshold_y: 0.9,
            duration_ms: 1500,
        }
    }
}

/// Reports once per lowering when the lower wrist stays past the threshold.
pub struct HandsDownDetector {
    config: HandsDownConfig,
    down_since_ms: Option<u64>,
    reported: bool,
}

impl HandsDownDetector {
    pub fn new(config: HandsDownConfig) -> Self {
        Self {
            config,
            down_since_ms: None,
            reported: false,
        }
    }

    /// Feed a frame; true exactly once when the lowering exceeds the duration.
    pub fn check(&mut self, frame: &LandmarkFrame) -> bool {
        let lowest_wrist = [&frame.left_hand, &frame.right_hand]
            .into_iter()
            .filter_map(|hand| hand.as_ref().and_then(|points| points.first()))
            .map(|wrist| wrist.y)
            .fold(None, |acc: Option<f32>, y| Some(acc.map_or(y, |a| a.max(y))));

        let Some(wrist_y) = lowest_wrist else {
            self.reset();
            return false;
        };

        if wrist_y <= self.config.threshold_y {
            self.reset();
            return false;
        }

        let since = *self.down_since_ms.get_or_insert(frame.timestamp_ms);
        let held = frame.timestamp_ms.saturating_sub(since);
        if held > self.config.duration_ms && !self.reported {
            self.reported = true;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.down_since_ms = None;
        self.reported = false;
    }
}
