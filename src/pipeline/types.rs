//! Data passed between recognition stations and to the UI.

use crate::classifier::diagnostics::TopKSnapshots;
use crate::features::buffer::FeatureTensor;
use crate::stability::controller::RecognitionResult;
use serde::{Deserialize, Serialize};

/// A window that passed the readiness gate.
#[derive(Debug, Clone)]
pub struct ReadyWindow {
    pub tensor: FeatureTensor,
    /// Timestamp of the newest frame in the window.
    pub timestamp_ms: u64,
}

/// Per-inference outcome of the stability stage.
#[derive(Debug, Clone)]
pub struct StabilityOutcome {
    pub diagnostics: TopKSnapshots,
    pub confidence: f32,
    /// Present only when the result passed the stability filter.
    pub emitted: Option<RecognitionResult>,
}

/// Coarse status shown to users.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Initializing,
    Active,
    Error,
}

/// Conflated UI state: subscribers always see the latest value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognitionState {
    pub status: SessionStatus,
    pub latest: Option<RecognitionResult>,
    pub diagnostics: Option<TopKSnapshots>,
    pub last_error: Option<String>,
}

/// Minimal sampled view for cheap redraws.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimpleEvent {
    pub status: SessionStatus,
    pub label: Option<String>,
    pub confidence: Option<f32>,
    pub timestamp_ms: Option<u64>,
}

impl From<&RecognitionState> for SimpleEvent {
    fn from(state: &RecognitionState) -> Self {
        Self {
            status: state.status,
            label: state.latest.as_ref().map(|r| r.label.clone()),
            confidence: state.latest.as_ref().map(|r| r.confidence),
            timestamp_ms: state.latest.as_ref().map(|r| r.timestamp_ms),
        }
    }
}
