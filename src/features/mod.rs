//! Landmark input, feature extraction, and the temporal window.

pub mod buffer;
pub mod hands_down;
pub mod landmarks;
pub mod scaler;
pub mod vector;
pub mod window;

pub use buffer::{FeatureConfig, FeatureExtractionBuffer, FeatureTensor};
pub use hands_down::{HandsDownConfig, HandsDownDetector};
pub use landmarks::{Landmark, LandmarkFrame};
pub use scaler::FeatureScaler;
pub use vector::{FeatureSection, FeatureVector, normalize_z};
pub use window::TemporalWindow;
