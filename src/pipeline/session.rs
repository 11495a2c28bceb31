//! Recognition session: owns the components and runs the station threads.
//!
//! ```text
//! on_landmarks ─try_send─▶ features ─▶ classifier ─▶ stability ─▶ ui sink
//!                              │                         │
//!                              │ hands down / idle       │ debounce
//!                              ▼                         ▼
//!                           commit ◀──────────────── accumulator ─▶ EventBus
//! ```

use crate::admission::controller::{AdmissionStats, FrameAdmissionController};
use crate::admission::motion::FrameView;
use crate::classifier::classify::{Classifier, ClassifierError};
use crate::config::Config;
use crate::error::{Result, SignflowError};
use crate::events::bus::{EventBus, EventSubscription};
use crate::features::buffer::FeatureExtractionBuffer;
use crate::features::hands_down::HandsDownDetector;
use crate::features::landmarks::LandmarkFrame;
use crate::features::scaler::FeatureScaler;
use crate::pipeline::classifier_station::ClassifierStation;
use crate::pipeline::error::{ErrorReporter, FanOutReporter, LogReporter};
use crate::pipeline::feature_station::FeatureStation;
use crate::pipeline::outlet::{SequenceOutlet, lock};
use crate::pipeline::stability_station::StabilityStation;
use crate::pipeline::station::StationRunner;
use crate::pipeline::types::{RecognitionState, SessionStatus, SimpleEvent, StabilityOutcome};
use crate::pipeline::ui::{SimpleSampler, UiErrorReporter, UiPublisher, spawn_ui_sink};
use crate::sequence::accumulator::{AccumulatorState, SequenceAccumulator};
use crate::sequence::policy::TokenPolicy;
use crate::stability::controller::{RecognitionResult, StabilityController};
use crate::stability::debounce::Debouncer;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

/// Threads and channels of a started session.
struct ActivePipeline {
    frame_tx: Sender<LandmarkFrame>,
    /// Second handle on the frame queue, used to discard its backlog at stop.
    frame_backlog: Receiver<LandmarkFrame>,
    submitted: AtomicU64,
    debouncer: Debouncer<RecognitionResult>,
    features: StationRunner<FeatureStation>,
    classifier: StationRunner<ClassifierStation>,
    stability: StationRunner<StabilityStation>,
    ui_sink: JoinHandle<()>,
    sampler: JoinHandle<()>,
}

impl ActivePipeline {
    /// Every submitted frame has passed every station.
    fn is_idle(&self) -> bool {
        self.features.processed() == self.submitted.load(Ordering::SeqCst)
            && self.classifier.processed() == self.features.emitted()
            && self.stability.processed() == self.classifier.emitted()
    }

    /// Discard queued frames, close the input, then join every thread
    /// front to back.
    fn shutdown(self) {
        let ActivePipeline {
            frame_tx,
            frame_backlog,
            submitted: _,
            debouncer,
            features,
            classifier,
            stability,
            ui_sink,
            sampler,
        } = self;

        debouncer.shutdown();
        let discarded = frame_backlog.try_iter().count();
        if discarded > 0 {
            tracing::debug!(discarded, "dropped queued frames at stop");
        }
        drop(frame_backlog);
        drop(frame_tx);

        for result in [features.join(), classifier.join(), stability.join()] {
            if let Err(message) = result {
                tracing::error!("{message}");
            }
        }
        if ui_sink.join().is_err() {
            tracing::error!("ui sink thread panicked");
        }
        if sampler.join().is_err() {
            tracing::error!("simple event sampler thread panicked");
        }
    }
}

/// One recognition session: landmark frames in, gloss sequences out.
///
/// All methods take `&self` so the session can be shared between the
/// camera callback thread and the UI.
pub struct RecognitionSession {
    config: Config,
    classifier: Arc<Classifier>,
    buffer: Arc<Mutex<FeatureExtractionBuffer>>,
    outlet: SequenceOutlet,
    admission: Mutex<FrameAdmissionController>,
    ui: UiPublisher,
    sampler: Mutex<SimpleSampler>,
    error_reporter: Arc<dyn ErrorReporter>,
    running: Arc<AtomicBool>,
    active: Mutex<Option<ActivePipeline>>,
    dropped_frames: AtomicU64,
    /// Newest frame timestamp seen; the session clock for manual actions.
    last_frame_ms: Mutex<Option<u64>>,
}

impl RecognitionSession {
    pub fn new(config: Config, classifier: Classifier) -> Self {
        let ui = UiPublisher::new();
        let sampler = SimpleSampler::new(&ui);
        let bus = Arc::new(EventBus::new(config.session.bus_extra_capacity));
        Self {
            classifier: Arc::new(classifier),
            buffer: Arc::new(Mutex::new(FeatureExtractionBuffer::new(
                config.features.clone(),
            ))),
            outlet: SequenceOutlet::new(SequenceAccumulator::new(config.accumulator.clone()), bus),
            admission: Mutex::new(FrameAdmissionController::new(config.admission.clone())),
            ui,
            sampler: Mutex::new(sampler),
            error_reporter: Arc::new(LogReporter),
            running: Arc::new(AtomicBool::new(false)),
            active: Mutex::new(None),
            dropped_frames: AtomicU64::new(0),
            last_frame_ms: Mutex::new(None),
            config,
        }
    }

    /// Scale features before packing; `None` runs unscaled.
    pub fn with_scaler(self, scaler: Option<FeatureScaler>) -> Self {
        *lock(&self.buffer) =
            FeatureExtractionBuffer::new(self.config.features.clone()).with_scaler(scaler);
        self
    }

    /// Publish committed sequences on an externally owned bus.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.outlet = self.outlet.clone().with_bus(bus);
        self
    }

    /// Replace the token policy selected in the configuration.
    pub fn with_token_policy(self, policy: Box<dyn TokenPolicy>) -> Self {
        let config = self.config.accumulator.clone();
        self.outlet.with_accumulator(move |accumulator| {
            *accumulator = SequenceAccumulator::new(config).with_policy(policy);
        });
        self
    }

    /// Sets a custom error reporter; errors still reach the UI state.
    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Start the stations.
    ///
    /// The model is loaded first; when that fails the status becomes
    /// [`SessionStatus::Error`] and the error is returned. Starting a running
    /// session is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut active = lock(&self.active);
        if active.is_some() {
            return Ok(());
        }

        self.ui.set_status(SessionStatus::Initializing);
        if let Err(e) = self.classifier.warm_up() {
            tracing::error!("session failed to initialize: {e}");
            self.ui.set_error(e.to_string(), true);
            return Err(e);
        }

        self.running.store(true, Ordering::SeqCst);
        match self.spawn_pipeline() {
            Ok(pipeline) => {
                *active = Some(pipeline);
                self.ui.set_status(SessionStatus::Active);
                self.sample_simple();
                tracing::info!("recognition session started");
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                self.classifier.close();
                self.ui.set_error(e.to_string(), true);
                Err(e)
            }
        }
    }

    fn spawn_pipeline(&self) -> Result<ActivePipeline> {
        let session = &self.config.session;
        let (frame_tx, frame_rx) = bounded(session.frame_buffer);
        let frame_rx_backlog = frame_rx.clone();
        let (window_tx, window_rx) = bounded(session.station_buffer);
        let (result_tx, result_rx) = bounded(session.station_buffer);
        let (outcome_tx, outcome_rx) = bounded::<StabilityOutcome>(session.station_buffer);

        let reporter: Arc<dyn ErrorReporter> = Arc::new(FanOutReporter::new(vec![
            Arc::clone(&self.error_reporter),
            Arc::new(UiErrorReporter::new(self.ui.clone())),
        ]));

        let outlet = self.outlet.clone();
        let debouncer = Debouncer::spawn(
            Duration::from_millis(self.config.stability.debounce_ms),
            move |result: RecognitionResult| {
                if outlet.accept(&result) {
                    tracing::debug!(label = %result.label, "token accepted");
                }
            },
        )?;

        let mut features =
            FeatureStation::new(Arc::clone(&self.buffer)).with_outlet(self.outlet.clone());
        if session.commit_on_hands_down {
            features =
                features.with_hands_down(HandsDownDetector::new(self.config.hands_down.clone()));
        }

        let features = StationRunner::spawn(features, frame_rx, window_tx, Arc::clone(&reporter))?;
        let classifier = StationRunner::spawn(
            ClassifierStation::new(Arc::clone(&self.classifier)),
            window_rx,
            result_tx,
            Arc::clone(&reporter),
        )?;
        let stability = StationRunner::spawn(
            StabilityStation::new(StabilityController::new(self.config.stability.clone()))
                .with_debounce(debouncer.handle()),
            result_rx,
            outcome_tx,
            reporter,
        )?;
        let ui_sink = spawn_ui_sink(outcome_rx, self.ui.clone())?;
        let sampler = lock(&self.sampler).clone().spawn(
            Duration::from_millis(session.simple_event_interval_ms.max(1)),
            Arc::clone(&self.running),
        )?;

        Ok(ActivePipeline {
            frame_tx,
            frame_backlog: frame_rx_backlog,
            submitted: AtomicU64::new(0),
            debouncer,
            features,
            classifier,
            stability,
            ui_sink,
            sampler,
        })
    }

    /// Stop the stations, cancel pending debounce work, close the engine
    /// and clear both windows. Idempotent.
    pub fn stop(&self) {
        let Some(pipeline) = lock(&self.active).take() else {
            return;
        };
        self.running.store(false, Ordering::SeqCst);
        self.classifier.close();
        pipeline.shutdown();

        lock(&self.buffer).clear();
        lock(&self.admission).reset();
        self.ui.clear_results();
        self.ui.set_status(SessionStatus::Idle);
        self.sample_simple();
        tracing::info!(
            dropped_frames = self.dropped_frames.load(Ordering::Relaxed),
            "recognition session stopped"
        );
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> SessionStatus {
        self.ui.status()
    }

    /// Admission decision for a camera frame, before landmark detection.
    pub fn should_process_frame(&self, frame: &FrameView<'_>) -> bool {
        let hint = self.ui.latest_confidence();
        lock(&self.admission).should_process(frame, hint)
    }

    pub fn admission_stats(&self) -> AdmissionStats {
        lock(&self.admission).stats()
    }

    /// Hand a detector result to the pipeline without blocking.
    ///
    /// Returns false when the session is stopped or the frame queue is full.
    pub fn on_landmarks(&self, frame: LandmarkFrame) -> bool {
        if !self.is_running() {
            return false;
        }
        let active = lock(&self.active);
        let Some(pipeline) = active.as_ref() else {
            return false;
        };
        lock(&self.admission).record_processed(Instant::now());

        let timestamp_ms = frame.timestamp_ms;
        match pipeline.frame_tx.try_send(frame) {
            Ok(()) => {
                pipeline.submitted.fetch_add(1, Ordering::SeqCst);
                self.note_frame(timestamp_ms);
                true
            }
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped_frames.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped.is_power_of_two() {
                    tracing::warn!(dropped, "frame queue full, dropping landmark frames");
                }
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Like [`on_landmarks`](Self::on_landmarks) but waits for queue space
    /// instead of dropping the frame. Meant for replaying recordings.
    pub fn push_landmarks(&self, frame: LandmarkFrame) -> bool {
        if !self.is_running() {
            return false;
        }
        let frame_tx = match lock(&self.active).as_ref() {
            Some(pipeline) => {
                // Counted before the send so `drain` waits for it.
                pipeline.submitted.fetch_add(1, Ordering::SeqCst);
                pipeline.frame_tx.clone()
            }
            None => return false,
        };
        self.note_frame(frame.timestamp_ms);
        frame_tx.send(frame).is_ok()
    }

    /// Wait until every submitted frame has passed all stations, then for
    /// the debounce delay so the last emission reaches the accumulator.
    ///
    /// Returns false on timeout or when the session is not running.
    pub fn drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match lock(&self.active).as_ref() {
                Some(pipeline) if pipeline.is_idle() => break,
                Some(_) => {}
                None => return false,
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        std::thread::sleep(Duration::from_millis(
            self.config.stability.debounce_ms * 2 + 10,
        ));
        true
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Classify the current window right away, bypassing the stability filter.
    ///
    /// `Ok(None)` when the window is not ready or the output was degenerate.
    pub fn predict_now(&self) -> Result<Option<RecognitionResult>> {
        if !self.is_running() {
            return Err(SignflowError::SessionNotRunning);
        }
        let Some(tensor) = lock(&self.buffer).ready_tensor() else {
            return Ok(None);
        };

        match self.classifier.classify(&tensor, self.clock_ms()) {
            Ok(Some(inference)) => {
                let result = RecognitionResult::from_inference(&inference);
                self.ui.apply(StabilityOutcome {
                    diagnostics: inference.diagnostics,
                    confidence: inference.confidence,
                    emitted: Some(result.clone()),
                });
                Ok(Some(result))
            }
            Ok(None) => Ok(None),
            Err(ClassifierError::Closed) => Err(SignflowError::SessionNotRunning),
            Err(e) => Err(SignflowError::Inference {
                message: e.to_string(),
            }),
        }
    }

    pub fn backspace(&self) -> bool {
        self.outlet.with_accumulator(|accumulator| accumulator.backspace())
    }

    pub fn clear(&self) {
        self.outlet.with_accumulator(|accumulator| accumulator.clear());
    }

    /// Commit the pending sequence or word to the event bus.
    ///
    /// The event is stamped with the newest frame timestamp, the same clock
    /// the automatic commits use. Wall-clock time is used only before any
    /// frame has arrived. Returns whether an event was published.
    pub fn send(&self) -> bool {
        self.outlet.commit(self.clock_ms())
    }

    pub fn set_alphabet_mode(&self, enabled: bool) {
        self.outlet
            .with_accumulator(|accumulator| accumulator.set_alphabet_mode(enabled));
    }

    /// Attach a non-manual marker to the next committed sequence.
    pub fn annotate(&self, tag: &str) {
        self.outlet.with_accumulator(|accumulator| accumulator.annotate(tag));
    }

    pub fn accumulator_state(&self) -> AccumulatorState {
        self.outlet.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<RecognitionState> {
        self.ui.subscribe()
    }

    pub fn subscribe_simple(&self) -> watch::Receiver<SimpleEvent> {
        lock(&self.sampler).subscribe()
    }

    pub fn subscribe_events(&self) -> EventSubscription {
        self.outlet.bus().subscribe()
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(self.outlet.bus())
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn note_frame(&self, timestamp_ms: u64) {
        let mut last = lock(&self.last_frame_ms);
        let newest = last.map_or(timestamp_ms, |seen| seen.max(timestamp_ms));
        *last = Some(newest);
    }

    fn clock_ms(&self) -> u64 {
        let last = *lock(&self.last_frame_ms);
        last.unwrap_or_else(now_ms)
    }

    fn sample_simple(&self) {
        lock(&self.sampler).sample();
    }
}

impl Drop for RecognitionSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
