//! Stability station: filters inference results and schedules accepted
//! ones onto the debouncer in front of the accumulator.

use crate::classifier::classify::InferenceResult;
use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use crate::pipeline::types::StabilityOutcome;
use crate::stability::controller::{RecognitionResult, StabilityController};
use crate::stability::debounce::DebounceHandle;

pub struct StabilityStation {
    controller: StabilityController,
    debounce: Option<DebounceHandle<RecognitionResult>>,
    emitted: u64,
}

impl StabilityStation {
    pub fn new(controller: StabilityController) -> Self {
        Self {
            controller,
            debounce: None,
            emitted: 0,
        }
    }

    pub fn with_debounce(mut self, handle: DebounceHandle<RecognitionResult>) -> Self {
        self.debounce = Some(handle);
        self
    }
}

impl Station for StabilityStation {
    type Input = InferenceResult;
    type Output = StabilityOutcome;

    fn name(&self) -> &'static str {
        "stability"
    }

    fn process(&mut self, result: InferenceResult) -> Result<Option<StabilityOutcome>, StationError> {
        let emitted = self
            .controller
            .evaluate_with_reason(&result)
            .map(|(emitted, reason)| {
                self.emitted += 1;
                tracing::debug!(label = %emitted.label, ?reason, "result emitted");
                if let Some(debounce) = &self.debounce {
                    debounce.schedule(emitted.clone());
                }
                emitted
            });

        Ok(Some(StabilityOutcome {
            diagnostics: result.diagnostics,
            confidence: result.confidence,
            emitted,
        }))
    }

    fn shutdown(&mut self) {
        if let Some(debounce) = &self.debounce {
            debounce.cancel();
        }
        tracing::debug!(
            frames = self.controller.state().frames_seen,
            emitted = self.emitted,
            "stability station finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::diagnostics::TopKSnapshots;
    use crate::stability::controller::StabilityConfig;
    use crate::stability::debounce::Debouncer;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn inference(label: &str, confidence: f32) -> InferenceResult {
        InferenceResult {
            raw_logits: vec![1.0, 0.0],
            averaged_logits: vec![1.0, 0.0],
            probabilities: vec![confidence, 1.0 - confidence],
            top_index: 0,
            label: label.to_string(),
            confidence,
            origin_logits: None,
            origin: None,
            origin_confidence: None,
            diagnostics: TopKSnapshots::default(),
            stuck_reset: false,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn test_outcome_always_carries_diagnostics() {
        let mut station = StabilityStation::new(StabilityController::new(StabilityConfig {
            liveness_interval: 0,
            ..Default::default()
        }));

        let first = station.process(inference("A", 0.5)).unwrap().unwrap();
        assert!(first.emitted.is_some());

        let second = station.process(inference("A", 0.5)).unwrap().unwrap();
        assert!(second.emitted.is_none());
        assert_eq!(second.confidence, 0.5);
    }

    #[test]
    fn test_emission_reaches_debouncer() {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&delivered);
        let debouncer = Debouncer::spawn(Duration::from_millis(10), move |r: RecognitionResult| {
            sink.lock().unwrap().push(r.label);
        })
        .unwrap();

        let mut station =
            StabilityStation::new(StabilityController::new(StabilityConfig::default()))
                .with_debounce(debouncer.handle());
        station.process(inference("HELLO", 0.9)).unwrap();

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(*delivered.lock().unwrap(), vec!["HELLO".to_string()]);
        debouncer.shutdown();
    }
}
