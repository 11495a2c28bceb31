//! Recognition pipeline.
//!
//! Implements a multi-station pipeline where each station runs in its own thread,
//! connected by bounded crossbeam channels for backpressure.

pub mod classifier_station;
pub mod error;
pub mod feature_station;
pub mod outlet;
pub mod session;
pub mod stability_station;
pub mod station;
pub mod types;
pub mod ui;

pub use classifier_station::ClassifierStation;
pub use error::{ErrorReporter, FanOutReporter, LogReporter, StationError};
pub use feature_station::FeatureStation;
pub use outlet::SequenceOutlet;
pub use session::RecognitionSession;
pub use stability_station::StabilityStation;
pub use station::{Station, StationRunner};
pub use types::{ReadyWindow, RecognitionState, SessionStatus, SimpleEvent, StabilityOutcome};
pub use ui::{SimpleSampler, UiErrorReporter, UiPublisher};
