use crate::error::{Result, SignflowError};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Output layout of a gloss model, decided from model introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// One gloss logits vector.
    SingleHead,
    /// Gloss logits plus a small origin logits vector.
    MultiHead,
}

/// Raw output of a single engine run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutput {
    pub gloss_logits: Vec<f32>,
    pub origin_logits: Option<Vec<f32>>,
}

impl EngineOutput {
    pub fn single(gloss_logits: Vec<f32>) -> Self {
        Self {
            gloss_logits,
            origin_logits: None,
        }
    }

    pub fn multi(gloss_logits: Vec<f32>, origin_logits: Vec<f32>) -> Self {
        Self {
            gloss_logits,
            origin_logits: Some(origin_logits),
        }
    }
}

/// Trait for running the gloss model on a packed window.
///
/// This trait allows swapping implementations (candle model vs mock).
pub trait GlossEngine: Send {
    /// Run inference on a flattened `[1, frames, features_per_frame]` window.
    fn run(&mut self, input: &[f32]) -> Result<EngineOutput>;

    /// Output layout of the loaded model.
    fn kind(&self) -> EngineKind;

    /// Gloss classes reported by the model's output shape.
    fn gloss_classes(&self) -> usize;

    /// Release model resources. Called once before the engine is dropped.
    fn close(&mut self) {}
}

/// Creates engines; called again whenever the expected class count changes.
pub trait EngineFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn GlossEngine>>;
}

/// Mock engine for testing.
///
/// Replays scripted outputs in order, then repeats the last one.
#[derive(Debug, Clone)]
pub struct MockEngine {
    script: VecDeque<EngineOutput>,
    last: EngineOutput,
    classes: usize,
    should_fail: bool,
    runs: Arc<AtomicUsize>,
}

impl MockEngine {
    /// A single-head mock that always returns `logits`.
    pub fn new(logits: Vec<f32>) -> Self {
        Self {
            classes: logits.len(),
            last: EngineOutput::single(logits),
            script: VecDeque::new(),
            should_fail: false,
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A mock whose softmax puts `confidence` on class `index` of `classes`.
    pub fn confident(classes: usize, index: usize, confidence: f32) -> Self {
        Self::new(logits_for_confidence(classes, index, confidence))
    }

    /// Configure the mock to also return origin logits.
    pub fn with_origin(mut self, origin_logits: Vec<f32>) -> Self {
        self.last.origin_logits = Some(origin_logits);
        self
    }

    /// Queue outputs returned before falling back to the default one.
    pub fn with_script(mut self, outputs: Vec<EngineOutput>) -> Self {
        self.script = outputs.into();
        self
    }

    /// Configure the mock to fail on every run.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Shared counter of completed runs.
    pub fn run_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.runs)
    }
}

impl GlossEngine for MockEngine {
    fn run(&mut self, _input: &[f32]) -> Result<EngineOutput> {
        if self.should_fail {
            return Err(SignflowError::Inference {
                message: "mock inference failure".to_string(),
            });
        }
        self.runs.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = self.script.pop_front() {
            self.last = next.clone();
            return Ok(next);
        }
        Ok(self.last.clone())
    }

    fn kind(&self) -> EngineKind {
        if self.last.origin_logits.is_some() {
            EngineKind::MultiHead
        } else {
            EngineKind::SingleHead
        }
    }

    fn gloss_classes(&self) -> usize {
        self.classes
    }
}

/// Factory handing out clones of a template [`MockEngine`].
#[derive(Debug, Clone)]
pub struct MockEngineFactory {
    template: MockEngine,
    fail_create: bool,
    created: Arc<AtomicUsize>,
}

impl MockEngineFactory {
    pub fn new(template: MockEngine) -> Self {
        Self {
            template,
            fail_create: false,
            created: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Configure the factory to fail, as a missing model asset would.
    pub fn with_create_failure(mut self) -> Self {
        self.fail_create = true;
        self
    }

    /// Shared counter of engines created so far.
    pub fn created_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.created)
    }
}

impl EngineFactory for MockEngineFactory {
    fn create(&self) -> Result<Box<dyn GlossEngine>> {
        if self.fail_create {
            return Err(SignflowError::ModelAsset {
                message: "mock model unavailable".to_string(),
            });
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.template.clone()))
    }
}

/// Logits whose softmax yields `confidence` at `index`, the rest spread evenly.
pub fn logits_for_confidence(classes: usize, index: usize, confidence: f32) -> Vec<f32> {
    let mut logits = vec![0.0; classes];
    if classes < 2 || index >= classes {
        return logits;
    }
    let confidence = confidence.clamp(1e-6, 1.0 - 1e-6);
    let rest = (1.0 - confidence) / (classes - 1) as f32;
    logits[index] = (confidence / rest).ln();
    logits
}
