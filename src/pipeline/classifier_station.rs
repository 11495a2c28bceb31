//! Classifier station: ready windows in, inference results out.

use crate::classifier::classify::{Classifier, ClassifierError, InferenceResult};
use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use crate::pipeline::types::ReadyWindow;
use std::sync::Arc;
use std::time::Instant;

pub struct ClassifierStation {
    classifier: Arc<Classifier>,
    classified: u64,
    degenerate: u64,
}

impl ClassifierStation {
    pub fn new(classifier: Arc<Classifier>) -> Self {
        Self {
            classifier,
            classified: 0,
            degenerate: 0,
        }
    }
}

impl Station for ClassifierStation {
    type Input = ReadyWindow;
    type Output = InferenceResult;

    fn name(&self) -> &'static str {
        "classifier"
    }

    fn process(&mut self, window: ReadyWindow) -> Result<Option<InferenceResult>, StationError> {
        let start = Instant::now();
        match self.classifier.classify(&window.tensor, window.timestamp_ms) {
            Ok(Some(result)) => {
                self.classified += 1;
                tracing::trace!(
                    label = %result.label,
                    confidence = result.confidence,
                    elapsed_us = start.elapsed().as_micros() as u64,
                    "window classified"
                );
                Ok(Some(result))
            }
            Ok(None) => {
                self.degenerate += 1;
                Ok(None)
            }
            // Stop is in progress; windows still in the channel are dropped.
            Err(ClassifierError::Closed) => Ok(None),
            Err(error) => Err(StationError::Recoverable(error.to_string())),
        }
    }

    fn shutdown(&mut self) {
        tracing::debug!(
            classified = self.classified,
            degenerate = self.degenerate,
            "classifier station finished"
        );
    }
}
