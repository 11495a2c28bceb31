//! Gloss classification: model binding, inference, smoothing, and origin.

pub mod binding;
#[cfg(feature = "candle")]
pub mod candle_engine;
pub mod classify;
pub mod diagnostics;
pub mod engine;
pub mod labels;
pub mod origin;
pub mod smoothing;

pub use binding::ModelBinding;
#[cfg(feature = "candle")]
pub use candle_engine::{CandleEngineFactory, CandleGlossEngine};
pub use classify::{Classifier, ClassifierConfig, ClassifierError, InferenceResult};
pub use diagnostics::{TopEntry, TopKSnapshots, top_k};
pub use engine::{
    EngineFactory, EngineKind, EngineOutput, GlossEngine, MockEngine, MockEngineFactory,
    logits_for_confidence,
};
pub use labels::{DisplayLabels, LabelSet, placeholder_label};
pub use origin::{Origin, OriginPrior, StaticOriginPrior, resolve_origin};
pub use smoothing::{RollingLogitsWindow, StuckDetector, argmax, softmax};
