//! UI-facing state: a conflating watch of the latest recognition state and
//! an independently sampled simple-event stream.

use crate::error::{Result, SignflowError};
use crate::pipeline::error::{ErrorReporter, StationError};
use crate::pipeline::types::{RecognitionState, SessionStatus, SimpleEvent, StabilityOutcome};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::watch;

/// Owner of the conflated [`RecognitionState`].
///
/// Receivers only ever observe the newest value; nothing queues.
#[derive(Clone)]
pub struct UiPublisher {
    state: Arc<watch::Sender<RecognitionState>>,
}

impl Default for UiPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl UiPublisher {
    pub fn new() -> Self {
        let (state, _) = watch::channel(RecognitionState::default());
        Self {
            state: Arc::new(state),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RecognitionState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> RecognitionState {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.borrow().status
    }

    /// Top softmax probability of the newest classified window.
    pub fn latest_confidence(&self) -> Option<f32> {
        self.state
            .borrow()
            .diagnostics
            .as_ref()
            .and_then(|d| d.softmax.first())
            .map(|entry| entry.value)
    }

    pub fn set_status(&self, status: SessionStatus) {
        self.state.send_if_modified(|state| {
            let modified = state.status != status;
            state.status = status;
            modified
        });
    }

    /// Record a failure; status is left alone unless `fatal`.
    pub fn set_error(&self, message: impl Into<String>, fatal: bool) {
        let message = message.into();
        self.state.send_modify(|state| {
            state.last_error = Some(message);
            if fatal {
                state.status = SessionStatus::Error;
            }
        });
    }

    /// Diagnostics always refresh; `latest` only moves on an emission.
    pub fn apply(&self, outcome: StabilityOutcome) {
        self.state.send_modify(|state| {
            state.diagnostics = Some(outcome.diagnostics);
            if let Some(emitted) = outcome.emitted {
                state.latest = Some(emitted);
            }
        });
    }

    /// Drop results and diagnostics, keeping status and the last error.
    pub fn clear_results(&self) {
        self.state.send_modify(|state| {
            state.latest = None;
            state.diagnostics = None;
        });
    }
}

/// Forwards every stability outcome into the publisher until the channel closes.
pub fn spawn_ui_sink(
    outcomes: Receiver<StabilityOutcome>,
    publisher: UiPublisher,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("signflow-ui".to_string())
        .spawn(move || {
            for outcome in outcomes {
                publisher.apply(outcome);
            }
            tracing::debug!("ui sink finished");
        })
        .map_err(|e| SignflowError::Spawn {
            message: format!("ui sink: {e}"),
        })
}

/// Samples the recognition state into [`SimpleEvent`]s at a fixed interval.
#[derive(Clone)]
pub struct SimpleSampler {
    source: watch::Receiver<RecognitionState>,
    target: Arc<watch::Sender<SimpleEvent>>,
}

impl SimpleSampler {
    pub fn new(publisher: &UiPublisher) -> Self {
        let (target, _) = watch::channel(SimpleEvent::from(&publisher.current()));
        Self {
            source: publisher.subscribe(),
            target: Arc::new(target),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SimpleEvent> {
        self.target.subscribe()
    }

    /// Take one sample. Returns whether subscribers saw a new value.
    pub fn sample(&mut self) -> bool {
        let next = SimpleEvent::from(&*self.source.borrow_and_update());
        self.target.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        })
    }

    /// Sample every `interval` while `running` holds.
    pub fn spawn(mut self, interval: Duration, running: Arc<AtomicBool>) -> Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("signflow-sampler".to_string())
            .spawn(move || {
                while running.load(Ordering::SeqCst) {
                    thread::sleep(interval);
                    match self.source.has_changed() {
                        Ok(true) => {
                            self.sample();
                        }
                        Ok(false) => {}
                        Err(_) => break,
                    }
                }
            })
            .map_err(|e| SignflowError::Spawn {
                message: format!("simple event sampler: {e}"),
            })
    }
}

/// Publishes station errors as the session's last error.
pub struct UiErrorReporter {
    publisher: UiPublisher,
}

impl UiErrorReporter {
    pub fn new(publisher: UiPublisher) -> Self {
        Self { publisher }
    }
}

impl ErrorReporter for UiErrorReporter {
    fn report(&self, station: &str, error: &StationError) {
        self.publisher
            .set_error(format!("{station}: {}", error.message()), error.is_fatal());
    }
}
