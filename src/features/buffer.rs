//! Feature extraction, temporal buffering, and the window quality gate.

use crate::defaults;
use crate::features::landmarks::LandmarkFrame;
use crate::features::scaler::FeatureScaler;
use crate::features::vector::FeatureVector;
use crate::features::window::TemporalWindow;
use serde::{Deserialize, Serialize};

/// Configuration for feature extraction and window gating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Frames per classification window.
    pub window_frames: usize,
    /// Frames with a visible hand required before the window is classified.
    pub min_valid_frames: usize,
    /// Hands with a smaller wrist to middle-fingertip span are ignored (0 disables).
    pub min_hand_span: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            window_frames: defaults::WINDOW_FRAMES,
            min_valid_frames: defaults::MIN_VALID_FRAMES,
            min_hand_span: defaults::MIN_HAND_SPAN,
        }
    }
}

/// A packed window ready for inference: `frames * features_per_frame` floats,
/// row-major, oldest frame first.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTensor {
    pub data: Vec<f32>,
    pub frames: usize,
    pub features_per_frame: usize,
}

impl FeatureTensor {
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Model input shape `[1, frames, features_per_frame]`.
    pub fn shape(&self) -> [usize; 3] {
        [1, self.frames, self.features_per_frame]
    }

    /// Raw 4-byte little-endian floats, for engines that take byte buffers.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.data.iter().flat_map(|v| v.to_le_bytes()).collect()
    }
}

/// Converts landmark frames to feature vectors and keeps the sliding window.
pub struct FeatureExtractionBuffer {
    config: FeatureConfig,
    window: TemporalWindow,
    scaler: Option<FeatureScaler>,
    warned_unscaled: bool,
}

impl FeatureExtractionBuffer {
    pub fn new(config: FeatureConfig) -> Self {
        Self {
            window: TemporalWindow::new(config.window_frames),
            config,
            scaler: None,
            warned_unscaled: false,
        }
    }

    /// Attach the feature scaler; without one, packing runs unscaled.
    pub fn with_scaler(mut self, scaler: Option<FeatureScaler>) -> Self {
        self.scaler = scaler;
        self
    }

    pub fn has_scaler(&self) -> bool {
        self.scaler.is_some()
    }

    /// Extract a frame and push it into the window.
    ///
    /// Returns whether the frame was stored (all-absent frames only age the window).
    pub fn push_frame(&mut self, frame: &LandmarkFrame) -> bool {
        let vector = self.extract(frame);
        self.push(vector)
    }

    /// Frame to feature space, applying the configured hand-span check.
    pub fn extract(&self, frame: &LandmarkFrame) -> FeatureVector {
        FeatureVector::from_frame(frame, self.config.min_hand_span)
    }

    pub fn push(&mut self, vector: FeatureVector) -> bool {
        self.window.push(vector)
    }

    /// Full window and enough frames with a visible hand.
    pub fn is_ready(&self) -> bool {
        self.window.is_full() && self.window.hand_frame_count() >= self.config.min_valid_frames
    }

    /// Pack the window for inference when the readiness gate passes.
    ///
    /// The window is left intact; it keeps sliding as new frames arrive.
    pub fn ready_tensor(&mut self) -> Option<FeatureTensor> {
        if !self.window.is_full() {
            return None;
        }
        let valid = self.window.hand_frame_count();
        if valid < self.config.min_valid_frames {
            tracing::debug!(
                valid,
                required = self.config.min_valid_frames,
                "window rejected: not enough frames with a visible hand"
            );
            return None;
        }

        if self.scaler.is_none() && !self.warned_unscaled {
            self.warned_unscaled = true;
            tracing::warn!("feature scaler unavailable, classifying unscaled features");
        }

        let mut data = Vec::with_capacity(self.window.len() * defaults::FEATURES_PER_FRAME);
        for vector in self.window.iter() {
            vector.write_dense(&mut data, self.scaler.as_ref());
        }
        Some(FeatureTensor {
            data,
            frames: self.window.len(),
            features_per_frame: defaults::FEATURES_PER_FRAME,
        })
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn valid_frame_count(&self) -> usize {
        self.window.hand_frame_count()
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }
}
