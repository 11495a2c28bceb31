//! Error types and reporting for recognition stations.

use std::fmt;
use std::sync::Arc;

/// Errors that can occur during station processing.
#[derive(Debug, Clone, PartialEq)]
pub enum StationError {
    /// The current item is lost; the station keeps running.
    Recoverable(String),
    /// The station shuts down.
    Fatal(String),
}

impl fmt::Display for StationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StationError::Recoverable(msg) => write!(f, "Recoverable error: {}", msg),
            StationError::Fatal(msg) => write!(f, "Fatal error: {}", msg),
        }
    }
}

impl std::error::Error for StationError {}

impl StationError {
    pub fn message(&self) -> &str {
        match self {
            StationError::Recoverable(msg) | StationError::Fatal(msg) => msg,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, StationError::Fatal(_))
    }
}

/// Trait for reporting station errors.
pub trait ErrorReporter: Send + Sync {
    /// Reports an error from a station.
    fn report(&self, station: &str, error: &StationError);
}

/// Reporter that writes station errors to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, station: &str, error: &StationError) {
        match error {
            StationError::Recoverable(msg) => tracing::warn!(station, "{msg}"),
            StationError::Fatal(msg) => tracing::error!(station, "{msg}"),
        }
    }
}

/// Forwards every report to each inner reporter in order.
pub struct FanOutReporter {
    reporters: Vec<Arc<dyn ErrorReporter>>,
}

impl FanOutReporter {
    pub fn new(reporters: Vec<Arc<dyn ErrorReporter>>) -> Self {
        Self { reporters }
    }
}

impl ErrorReporter for FanOutReporter {
    fn report(&self, station: &str, error: &StationError) {
        for reporter in &self.reporters {
            reporter.report(station, error);
        }
    }
}
