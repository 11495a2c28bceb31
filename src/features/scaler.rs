//! Feature standardization applied at tensor packing.

use crate::defaults::{FEATURES_PER_FRAME, SENTINEL};
use crate::error::{Result, SignflowError};
use serde::Deserialize;

/// Per-feature mean and scale, `(v - mean) / scale`.
///
/// Sentinel values pass through untouched so "missing" stays recognizable.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureScaler {
    mean: Vec<f32>,
    scale: Vec<f32>,
}

#[derive(Deserialize)]
struct ScalerJson {
    mean: Vec<f32>,
    scale: Vec<f32>,
}

impl FeatureScaler {
    /// Build a scaler, validating both arrays against the frame layout.
    pub fn new(mean: Vec<f32>, scale: Vec<f32>) -> Result<Self> {
        for (name, values) in [("mean", &mean), ("scale", &scale)] {
            if values.len() != FEATURES_PER_FRAME {
                return Err(SignflowError::ScalerAsset {
                    message: format!(
                        "{name} has {} values, expected {FEATURES_PER_FRAME}",
                        values.len()
                    ),
                });
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(SignflowError::ScalerAsset {
                    message: format!("{name} contains non-finite values"),
                });
            }
        }
        Ok(Self { mean, scale })
    }

    /// Parse two raw little-endian float32 buffers.
    pub fn from_le_bytes(mean: &[u8], scale: &[u8]) -> Result<Self> {
        Self::new(decode_f32_le(mean, "mean")?, decode_f32_le(scale, "scale")?)
    }

    /// Parse `{"mean": [...], "scale": [...]}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: ScalerJson = serde_json::from_str(json)?;
        Self::new(parsed.mean, parsed.scale)
    }

    /// Scale one dense frame in place.
    pub fn apply(&self, frame: &mut [f32]) {
        for ((value, mean), scale) in frame.iter_mut().zip(&self.mean).zip(&self.scale) {
            if *value == SENTINEL {
                continue;
            }
            let divisor = if scale.abs() < f32::EPSILON { 1.0 } else { *scale };
            *value = (*value - mean) / divisor;
        }
    }
}

fn decode_f32_le(bytes: &[u8], name: &str) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(SignflowError::ScalerAsset {
            message: format!("{name} buffer length {} is not a multiple of 4", bytes.len()),
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}
