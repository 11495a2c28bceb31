//! Default configuration constants for signflow.
//!
//! Shared by the configuration types and the components so both agree on the
//! model input layout and the tuning defaults.

/// Landmarks per hand produced by the detector.
pub const HAND_LANDMARKS: usize = 21;

/// Curated face landmark subset fed to the classifier.
pub const FACE_LANDMARKS: usize = 37;

/// Floats per hand section (x, y, z per point).
pub const HAND_FEATURES: usize = HAND_LANDMARKS * 3;

/// Floats per face section.
pub const FACE_FEATURES: usize = FACE_LANDMARKS * 3;

/// Floats per frame: left hand, right hand, face.
pub const FEATURES_PER_FRAME: usize = HAND_FEATURES * 2 + FACE_FEATURES;

/// Marks "no data" inside a feature vector.
///
/// Lies outside every valid normalized coordinate, so the trained model can
/// tell a missing hand from a hand at the origin.
pub const SENTINEL: f32 = -10.0;

/// Frames in the temporal window handed to the classifier.
pub const WINDOW_FRAMES: usize = 30;

/// Frames with a visible hand required before a window is classified.
pub const MIN_VALID_FRAMES: usize = 20;

/// Wrist to middle-fingertip distance below which a hand is a detector ghost.
pub const MIN_HAND_SPAN: f32 = 0.08;

/// Depth of the rolling logits window.
pub const SMOOTHING_WINDOW: usize = 3;

/// Identical consecutive logits tolerated before the model is considered stuck.
pub const STUCK_THRESHOLD: usize = 3;

/// Entries kept in each top-k diagnostic snapshot.
pub const TOP_K: usize = 5;

/// Confidence at which a result is always propagated.
pub const HIGH_CONFIDENCE: f32 = 0.75;

/// Debounce delay between a stable result and the accumulator update.
pub const DEBOUNCE_MS: u64 = 50;

/// Maximum committed tokens per sequence.
pub const MAX_TOKENS: usize = 7;

/// Maximum letters in a fingerspelled word.
pub const MAX_WORD_LETTERS: usize = 32;

/// Extra events buffered per bus subscriber beyond the replay slot.
pub const BUS_EXTRA_CAPACITY: usize = 10;

/// Interval of the sampled UI event stream (~16 Hz).
pub const SIMPLE_EVENT_INTERVAL_MS: u64 = 62;

/// Placeholder label prefix used until real labels are loaded.
pub const PLACEHOLDER_LABEL_PREFIX: &str = "CLASS_";

/// Known labels of the origin head, in output order.
pub const ORIGIN_LABELS: [&str; 2] = ["ASL", "FSL"];
