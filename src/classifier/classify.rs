//! Model inference, temporal smoothing, and origin resolution.

use crate::classifier::binding::ModelBinding;
use crate::classifier::diagnostics::{TopKSnapshots, top_k};
use crate::classifier::engine::{EngineFactory, EngineKind};
use crate::classifier::labels::{DisplayLabels, LabelSet};
use crate::classifier::origin::{OriginPrior, StaticOriginPrior, resolve_origin};
use crate::classifier::smoothing::{RollingLogitsWindow, StuckDetector, argmax, softmax};
use crate::defaults;
use crate::features::buffer::FeatureTensor;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Classifier tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Depth of the rolling logits window.
    pub smoothing_window: usize,
    /// Identical consecutive raw logits tolerated before clearing the window.
    pub stuck_threshold: usize,
    /// Per-element tolerance for "identical".
    pub stuck_tolerance: f32,
    /// Entries per diagnostic snapshot.
    pub top_k: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            smoothing_window: defaults::SMOOTHING_WINDOW,
            stuck_threshold: defaults::STUCK_THRESHOLD,
            stuck_tolerance: 1e-6,
            top_k: defaults::TOP_K,
        }
    }
}

/// Per-inference failures. Never fatal to a running session.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("Engine failed: {message}")]
    Engine { message: String },

    #[error("Model produced no gloss logits")]
    EmptyOutput,

    #[error("Model produced a non-finite logit at index {index}")]
    NonFiniteLogits { index: usize },

    #[error("Classifier is closed")]
    Closed,
}

/// One classified window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub raw_logits: Vec<f32>,
    pub averaged_logits: Vec<f32>,
    pub probabilities: Vec<f32>,
    pub top_index: usize,
    /// Display label of the top class.
    pub label: String,
    pub confidence: f32,
    pub origin_logits: Option<Vec<f32>>,
    pub origin: Option<String>,
    pub origin_confidence: Option<f32>,
    pub diagnostics: TopKSnapshots,
    /// The logits window was cleared by stuck detection on this frame.
    pub stuck_reset: bool,
    pub timestamp_ms: u64,
}

impl InferenceResult {
    /// Display labels of the top `n` classes by probability.
    pub fn top_labels(&self, n: usize) -> Vec<String> {
        self.diagnostics
            .softmax
            .iter()
            .take(n)
            .map(|entry| entry.label.clone())
            .collect()
    }
}

struct Smoothing {
    window: RollingLogitsWindow,
    stuck: StuckDetector,
}

impl Smoothing {
    fn new(config: &ClassifierConfig) -> Self {
        Self {
            window: RollingLogitsWindow::new(config.smoothing_window),
            stuck: StuckDetector::new(config.stuck_threshold, config.stuck_tolerance),
        }
    }

    fn clear(&mut self) {
        self.window.clear();
        self.stuck.reset();
    }
}

/// Runs the gloss model and smooths its output over time.
///
/// Shared between the classifier station and on-demand prediction; both
/// the model binding and the logits window sit behind their own mutex.
pub struct Classifier {
    config: ClassifierConfig,
    factory: Box<dyn EngineFactory>,
    binding: Mutex<ModelBinding>,
    smoothing: Mutex<Smoothing>,
    display: DisplayLabels,
    origin_prior: Arc<dyn OriginPrior>,
    closed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Classifier {
    pub fn new(factory: Box<dyn EngineFactory>, config: ClassifierConfig) -> Self {
        Self {
            smoothing: Mutex::new(Smoothing::new(&config)),
            config,
            factory,
            binding: Mutex::new(ModelBinding::new(None)),
            display: DisplayLabels::default(),
            origin_prior: Arc::new(StaticOriginPrior::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_labels(self, labels: Option<LabelSet>) -> Self {
        *lock(&self.binding) = ModelBinding::new(labels);
        self
    }

    pub fn with_display_labels(mut self, display: DisplayLabels) -> Self {
        self.display = display;
        self
    }

    pub fn with_origin_prior(mut self, prior: Arc<dyn OriginPrior>) -> Self {
        self.origin_prior = prior;
        self
    }

    /// Create the engine now so asset problems surface before the first frame.
    pub fn warm_up(&self) -> crate::error::Result<EngineKind> {
        self.closed.store(false, Ordering::SeqCst);
        let mut binding = lock(&self.binding);
        let engine = binding.engine(self.factory.as_ref())?;
        Ok(engine.kind())
    }

    /// Replace the label set; takes the same lock as engine creation.
    pub fn replace_labels(&self, labels: LabelSet) {
        lock(&self.binding).replace_labels(labels);
    }

    /// Classify a packed window.
    ///
    /// `Ok(None)` means the output was discarded as degenerate (all-zero logits).
    pub fn classify(
        &self,
        tensor: &FeatureTensor,
        timestamp_ms: u64,
    ) -> Result<Option<InferenceResult>, ClassifierError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClassifierError::Closed);
        }

        let (output, labels) = {
            let mut binding = lock(&self.binding);
            let engine = binding
                .engine(self.factory.as_ref())
                .map_err(|e| ClassifierError::Engine {
                    message: e.to_string(),
                })?;
            let output = engine
                .run(tensor.as_slice())
                .map_err(|e| ClassifierError::Engine {
                    message: e.to_string(),
                })?;
            let labels = binding.labels_for(output.gloss_logits.len());
            (output, labels)
        };

        let raw = output.gloss_logits;
        if raw.is_empty() {
            return Err(ClassifierError::EmptyOutput);
        }
        if let Some(index) = raw.iter().position(|v| !v.is_finite()) {
            return Err(ClassifierError::NonFiniteLogits { index });
        }

        let mut smoothing = lock(&self.smoothing);
        if raw.iter().all(|v| *v == 0.0) {
            tracing::warn!("model produced all-zero logits, clearing smoothing window");
            smoothing.clear();
            return Ok(None);
        }

        let stuck_reset = smoothing.stuck.observe(&raw);
        if stuck_reset {
            tracing::warn!(
                repeats = self.config.stuck_threshold + 1,
                "identical logits repeated, clearing smoothing window"
            );
            smoothing.window.clear();
        }
        smoothing.window.push(raw.clone());
        let averaged = smoothing.window.average().unwrap_or_else(|| raw.clone());
        drop(smoothing);

        let probabilities = softmax(&averaged);
        let Some((top_index, confidence)) = argmax(&probabilities) else {
            return Err(ClassifierError::EmptyOutput);
        };
        let raw_label = labels.label(top_index);
        let origin = resolve_origin(
            output.origin_logits.as_deref(),
            &raw_label,
            self.origin_prior.as_ref(),
        );
        let label = self.display.display(&raw_label).to_string();

        let k = self.config.top_k;
        let mut diagnostics = TopKSnapshots {
            raw: top_k(&raw, k, &labels),
            averaged: top_k(&averaged, k, &labels),
            softmax: top_k(&probabilities, k, &labels),
        };
        for entry in diagnostics
            .raw
            .iter_mut()
            .chain(diagnostics.averaged.iter_mut())
            .chain(diagnostics.softmax.iter_mut())
        {
            entry.label = self.display.display(&entry.label).to_string();
        }

        Ok(Some(InferenceResult {
            raw_logits: raw,
            averaged_logits: averaged,
            probabilities,
            top_index,
            label,
            confidence,
            origin_logits: output.origin_logits,
            origin: origin.as_ref().map(|o| o.label.clone()),
            origin_confidence: origin.map(|o| o.confidence),
            diagnostics,
            stuck_reset,
            timestamp_ms,
        }))
    }

    /// Frames currently in the logits window.
    pub fn smoothing_len(&self) -> usize {
        lock(&self.smoothing).window.len()
    }

    pub fn reset_smoothing(&self) {
        lock(&self.smoothing).clear();
    }

    /// Labels currently bound (placeholders until the model was inspected).
    pub fn labels(&self) -> LabelSet {
        lock(&self.binding).labels().clone()
    }

    /// Close the engine and clear the logits window; later calls fail with
    /// [`ClassifierError::Closed`] until [`Classifier::warm_up`] runs again.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        lock(&self.binding).close();
        self.reset_smoothing();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
