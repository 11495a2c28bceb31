//! Labels and the engine they were bound to, kept under one lock.

use crate::classifier::engine::{EngineFactory, GlossEngine};
use crate::classifier::labels::LabelSet;
use crate::error::{Result, SignflowError};

/// Labels plus the engine created for them.
///
/// Always accessed through the classifier's binding mutex, so replacing
/// labels and re-creating the engine never interleave.
pub struct ModelBinding {
    labels: LabelSet,
    engine: Option<Box<dyn GlossEngine>>,
    /// Expected class count the current engine was created for.
    bound_for: Option<usize>,
    warned_mismatch: bool,
}

impl ModelBinding {
    pub fn new(labels: Option<LabelSet>) -> Self {
        Self {
            labels: labels.unwrap_or_default(),
            engine: None,
            bound_for: None,
            warned_mismatch: false,
        }
    }

    fn is_stale(&self) -> bool {
        self.engine.is_none() || self.bound_for != self.labels.expected_classes()
    }

    /// The engine for the current labels, creating or re-creating it as needed.
    pub fn engine(&mut self, factory: &dyn EngineFactory) -> Result<&mut dyn GlossEngine> {
        if self.is_stale() {
            if let Some(mut old) = self.engine.take() {
                old.close();
            }
            let engine = factory.create()?;
            let classes = engine.gloss_classes();
            tracing::debug!(
                classes,
                kind = ?engine.kind(),
                "gloss engine created"
            );

            match self.labels.expected_classes() {
                None => self.labels = LabelSet::placeholders(classes),
                Some(expected) if expected != classes && !self.warned_mismatch => {
                    self.warned_mismatch = true;
                    tracing::warn!(
                        labels = expected,
                        classes,
                        "label count does not match model output, using placeholder labels"
                    );
                }
                Some(_) => {}
            }
            self.bound_for = self.labels.expected_classes();
            self.engine = Some(engine);
        }

        match self.engine.as_deref_mut() {
            Some(engine) => Ok(engine),
            None => Err(SignflowError::Inference {
                message: "gloss engine unavailable".to_string(),
            }),
        }
    }

    /// Labels to render `classes` model outputs with.
    ///
    /// Mismatched label sets render as placeholders until corrected.
    pub fn labels_for(&self, classes: usize) -> LabelSet {
        if self.labels.len() == classes {
            self.labels.clone()
        } else {
            LabelSet::placeholders(classes)
        }
    }

    /// Swap in a new label set; the engine is re-created on next use if the
    /// expected class count changed.
    pub fn replace_labels(&mut self, labels: LabelSet) {
        if labels.expected_classes() != self.bound_for {
            self.warned_mismatch = false;
        }
        self.labels = labels;
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    /// Close and drop the engine; it is re-created on next use.
    pub fn close(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.close();
        }
        self.bound_for = None;
    }
}
