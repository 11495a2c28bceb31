//! Hysteresis filter between raw inference results and the visible stream.

use crate::classifier::classify::InferenceResult;
use crate::defaults;
use serde::{Deserialize, Serialize};

/// Configuration for [`StabilityController`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Confidence at which every result propagates.
    pub high_confidence: f32,
    /// Unchanged frames after which the label propagates.
    pub min_stable_frames: u32,
    /// Confidence change vs. the last emission that propagates.
    pub confidence_delta: f32,
    /// Every n-th frame propagates regardless (0 disables).
    pub liveness_interval: u32,
    /// Same label for this long is logged as stuck.
    pub stuck_log_after_ms: u64,
    /// Same label for this many frames is logged as stuck.
    pub stuck_log_after_frames: u32,
    /// Delay before an emission reaches the accumulator.
    pub debounce_ms: u64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            high_confidence: defaults::HIGH_CONFIDENCE,
            min_stable_frames: 3,
            confidence_delta: 0.05,
            liveness_interval: 5,
            stuck_log_after_ms: 3000,
            stuck_log_after_frames: 30,
            debounce_ms: defaults::DEBOUNCE_MS,
        }
    }
}

/// A result that passed the stability filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub label: String,
    pub confidence: f32,
    pub origin: Option<String>,
    pub origin_confidence: Option<f32>,
    /// Top three labels by probability, best first.
    pub top_labels: Vec<String>,
    pub timestamp_ms: u64,
}

impl RecognitionResult {
    pub fn from_inference(result: &InferenceResult) -> Self {
        Self {
            label: result.label.clone(),
            confidence: result.confidence,
            origin: result.origin.clone(),
            origin_confidence: result.origin_confidence,
            top_labels: result.top_labels(3),
            timestamp_ms: result.timestamp_ms,
        }
    }
}

/// Why a result was emitted; the first matching rule wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitReason {
    HighConfidence,
    LabelChanged,
    RankingChanged,
    ConfidenceShift,
    Stable,
    Liveness,
}

/// Snapshot of the controller counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StabilityState {
    pub last_label: Option<String>,
    pub stable_frame_count: u32,
    pub frames_seen: u64,
    pub stuck_label: Option<String>,
    pub stuck_start_ms: Option<u64>,
    pub stuck_frame_count: u32,
}

pub struct StabilityController {
    config: StabilityConfig,
    state: StabilityState,
    last_emitted: Option<RecognitionResult>,
    stuck_logged: bool,
}

impl StabilityController {
    pub fn new(config: StabilityConfig) -> Self {
        Self {
            config,
            state: StabilityState::default(),
            last_emitted: None,
            stuck_logged: false,
        }
    }

    /// Feed one inference result; returns the emission, if any.
    pub fn evaluate(&mut self, result: &InferenceResult) -> Option<RecognitionResult> {
        self.evaluate_with_reason(result).map(|(emitted, _)| emitted)
    }

    pub fn evaluate_with_reason(
        &mut self,
        result: &InferenceResult,
    ) -> Option<(RecognitionResult, EmitReason)> {
        let candidate = RecognitionResult::from_inference(result);
        self.state.frames_seen += 1;

        let changed = self.state.last_label.as_deref() != Some(candidate.label.as_str());
        let previous_run = self.state.stable_frame_count;
        if changed {
            self.state.stable_frame_count = 0;
            self.state.last_label = Some(candidate.label.clone());
        } else {
            self.state.stable_frame_count += 1;
        }
        self.track_stuck(&candidate, changed);

        let reason = self.emit_reason(&candidate, changed, previous_run)?;
        self.last_emitted = Some(candidate.clone());
        Some((candidate, reason))
    }

    fn emit_reason(
        &self,
        candidate: &RecognitionResult,
        changed: bool,
        previous_run: u32,
    ) -> Option<EmitReason> {
        if candidate.confidence >= self.config.high_confidence {
            return Some(EmitReason::HighConfidence);
        }
        if changed && previous_run >= 1 {
            return Some(EmitReason::LabelChanged);
        }
        if let Some(last) = &self.last_emitted {
            if last.label == candidate.label && last.top_labels != candidate.top_labels {
                return Some(EmitReason::RankingChanged);
            }
            if (candidate.confidence - last.confidence).abs() >= self.config.confidence_delta {
                return Some(EmitReason::ConfidenceShift);
            }
        } else {
            return Some(EmitReason::ConfidenceShift);
        }
        if self.config.min_stable_frames > 0
            && self.state.stable_frame_count == self.config.min_stable_frames
        {
            return Some(EmitReason::Stable);
        }
        if self.config.liveness_interval > 0
            && self
                .state
                .frames_seen
                .is_multiple_of(u64::from(self.config.liveness_interval))
        {
            return Some(EmitReason::Liveness);
        }
        None
    }

    fn track_stuck(&mut self, candidate: &RecognitionResult, changed: bool) {
        if changed || self.state.stuck_label.is_none() {
            self.state.stuck_label = Some(candidate.label.clone());
            self.state.stuck_start_ms = Some(candidate.timestamp_ms);
            self.state.stuck_frame_count = 1;
            self.stuck_logged = false;
            return;
        }
        self.state.stuck_frame_count += 1;
        let elapsed = self
            .state
            .stuck_start_ms
            .map_or(0, |start| candidate.timestamp_ms.saturating_sub(start));
        let stuck = elapsed >= self.config.stuck_log_after_ms
            || self.state.stuck_frame_count >= self.config.stuck_log_after_frames;
        if stuck && !self.stuck_logged {
            self.stuck_logged = true;
            tracing::info!(
                label = %candidate.label,
                frames = self.state.stuck_frame_count,
                elapsed_ms = elapsed,
                "label unchanged for a long run"
            );
        }
    }

    pub fn state(&self) -> &StabilityState {
        &self.state
    }

    pub fn last_emitted(&self) -> Option<&RecognitionResult> {
        self.last_emitted.as_ref()
    }

    pub fn config(&self) -> &StabilityConfig {
        &self.config
    }

    pub fn reset(&mut self) {
        self.state = StabilityState::default();
        self.last_emitted = None;
        self.stuck_logged = false;
    }
}
