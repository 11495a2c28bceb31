//! Stability filtering and the debounced hand-off to the accumulator.

pub mod controller;
pub mod debounce;

pub use controller::{
    EmitReason, RecognitionResult, StabilityConfig, StabilityController, StabilityState,
};
pub use debounce::{DebounceHandle, Debouncer};
