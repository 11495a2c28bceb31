//! Shared access to the accumulator and the event bus it commits to.

use crate::events::bus::EventBus;
use crate::events::types::GlossSequenceEvent;
use crate::sequence::accumulator::{AccumulatorState, SequenceAccumulator};
use crate::stability::controller::RecognitionResult;
use std::sync::{Arc, Mutex, MutexGuard};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The accumulator plus the bus its commits are published on.
///
/// Commits are taken under the accumulator lock; publishing happens after
/// the lock is released so a slow subscriber never blocks token updates.
#[derive(Clone)]
pub struct SequenceOutlet {
    accumulator: Arc<Mutex<SequenceAccumulator>>,
    bus: Arc<EventBus>,
}

impl SequenceOutlet {
    pub fn new(accumulator: SequenceAccumulator, bus: Arc<EventBus>) -> Self {
        Self {
            accumulator: Arc::new(Mutex::new(accumulator)),
            bus,
        }
    }

    /// Publish on `bus` instead, keeping the accumulator.
    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = bus;
        self
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn accept(&self, result: &RecognitionResult) -> bool {
        lock(&self.accumulator).accept(result)
    }

    /// Commit whatever is pending. Returns whether an event was published.
    pub fn commit(&self, timestamp_ms: u64) -> bool {
        let event = lock(&self.accumulator).commit_sequence(timestamp_ms);
        self.publish(event)
    }

    /// Drive the idle auto-commit.
    pub fn tick(&self, now_ms: u64) -> bool {
        let event = lock(&self.accumulator).tick(now_ms);
        self.publish(event)
    }

    fn publish(&self, event: Option<GlossSequenceEvent>) -> bool {
        match event {
            Some(event) => {
                tracing::info!(kind = event.kind(), "publishing gloss event");
                self.bus.publish(event)
            }
            None => false,
        }
    }

    pub fn with_accumulator<R>(&self, f: impl FnOnce(&mut SequenceAccumulator) -> R) -> R {
        f(&mut lock(&self.accumulator))
    }

    pub fn state(&self) -> AccumulatorState {
        lock(&self.accumulator).state()
    }
}
