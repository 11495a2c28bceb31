//! signflow - sign language recognition from hand and face landmarks
//!
//! Turns a stream of landmark frames into stabilized, bounded gloss sequences.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod admission;
#[cfg(all(feature = "cli", feature = "candle"))]
pub mod app;
pub mod classifier;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod events;
pub mod features;
pub mod pipeline;
pub mod sequence;
pub mod stability;

// Core traits (frames → classify → sequence)
pub use classifier::engine::{EngineFactory, GlossEngine};
pub use classifier::origin::OriginPrior;
pub use sequence::policy::TokenPolicy;

// Components
pub use admission::{AdmissionConfig, FrameAdmissionController, FrameView};
pub use classifier::{Classifier, ClassifierConfig, InferenceResult, LabelSet};
pub use events::{EventBus, EventSubscription, GlossSequenceEvent};
pub use features::{FeatureExtractionBuffer, FeatureScaler, Landmark, LandmarkFrame};
pub use sequence::{AccumulatorState, SequenceAccumulator};
pub use stability::{RecognitionResult, StabilityController};

// Session
pub use pipeline::session::RecognitionSession;
pub use pipeline::types::{RecognitionState, SessionStatus, SimpleEvent};

// Error handling
pub use error::{Result, SignflowError};

// Config
pub use config::{Config, PerformancePreset};

// Station framework (for advanced users)
pub use pipeline::error::{ErrorReporter, StationError};
pub use pipeline::station::Station;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
