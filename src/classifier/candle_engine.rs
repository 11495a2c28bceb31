//! Dense gloss classifier running on candle.
//!
//! Loads a safetensors buffer holding `layers.{i}.weight/bias` hidden layers
//! (ReLU between them), a `gloss_head` and, for multi-head models, an
//! `origin_head`. The window is flattened to `[1, frames * features]`.

use crate::classifier::engine::{EngineFactory, EngineKind, EngineOutput, GlossEngine};
use crate::error::{Result, SignflowError};

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::Linear;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

fn model_err(context: &str, e: impl std::fmt::Display) -> SignflowError {
    SignflowError::ModelAsset {
        message: format!("{context}: {e}"),
    }
}

fn infer_err(context: &str, e: impl std::fmt::Display) -> SignflowError {
    SignflowError::Inference {
        message: format!("{context}: {e}"),
    }
}

/// Loaded dense model.
pub struct CandleGlossEngine {
    hidden: Vec<Linear>,
    gloss_head: Linear,
    origin_head: Option<Linear>,
    input_dim: usize,
    gloss_classes: usize,
    device: Device,
}

/// Remove `{prefix}.weight` / `{prefix}.bias` and build a layer with its
/// `(in, out)` dimensions.
fn take_linear(
    tensors: &mut HashMap<String, Tensor>,
    prefix: &str,
) -> Result<Option<(Linear, usize, usize)>> {
    let Some(weight) = tensors.remove(&format!("{prefix}.weight")) else {
        return Ok(None);
    };
    let weight = weight
        .to_dtype(DType::F32)
        .map_err(|e| model_err(&format!("convert {prefix}.weight"), e))?;
    let (out_dim, in_dim) = weight
        .dims2()
        .map_err(|e| model_err(&format!("{prefix}.weight must be 2-D"), e))?;
    let bias = tensors
        .remove(&format!("{prefix}.bias"))
        .map(|b| b.to_dtype(DType::F32))
        .transpose()
        .map_err(|e| model_err(&format!("convert {prefix}.bias"), e))?;
    Ok(Some((Linear::new(weight, bias), in_dim, out_dim)))
}

impl CandleGlossEngine {
    /// Build the model from a safetensors buffer.
    pub fn from_safetensors(bytes: &[u8]) -> Result<Self> {
        let device = Device::Cpu;
        let mut tensors = candle_core::safetensors::load_buffer(bytes, &device)
            .map_err(|e| model_err("read safetensors", e))?;

        let mut hidden = Vec::new();
        let mut input_dim = None;
        let mut width = None;
        while let Some((layer, in_dim, out_dim)) =
            take_linear(&mut tensors, &format!("layers.{}", hidden.len()))?
        {
            if let Some(expected) = width
                && expected != in_dim
            {
                return Err(SignflowError::ModelAsset {
                    message: format!(
                        "layers.{} expects {in_dim} inputs, previous layer gives {expected}",
                        hidden.len()
                    ),
                });
            }
            input_dim.get_or_insert(in_dim);
            width = Some(out_dim);
            hidden.push(layer);
        }

        let (gloss_head, head_in, gloss_classes) = take_linear(&mut tensors, "gloss_head")?
            .ok_or_else(|| SignflowError::ModelAsset {
                message: "missing gloss_head.weight".to_string(),
            })?;
        if let Some(expected) = width
            && expected != head_in
        {
            return Err(SignflowError::ModelAsset {
                message: format!(
                    "gloss_head expects {head_in} inputs, hidden layers give {expected}"
                ),
            });
        }

        let origin_head = match take_linear(&mut tensors, "origin_head")? {
            Some((head, in_dim, _)) if in_dim == head_in => Some(head),
            Some((_, in_dim, _)) => {
                return Err(SignflowError::ModelAsset {
                    message: format!(
                        "origin_head expects {in_dim} inputs, gloss_head takes {head_in}"
                    ),
                });
            }
            None => None,
        };

        Ok(Self {
            hidden,
            gloss_head,
            origin_head,
            input_dim: input_dim.unwrap_or(head_in),
            gloss_classes,
            device,
        })
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }
}

impl GlossEngine for CandleGlossEngine {
    fn run(&mut self, input: &[f32]) -> Result<EngineOutput> {
        if input.len() != self.input_dim {
            return Err(SignflowError::TensorShape {
                expected: self.input_dim,
                actual: input.len(),
            });
        }
        let mut xs = Tensor::from_slice(input, (1, self.input_dim), &self.device)
            .map_err(|e| infer_err("create input tensor", e))?;
        for (i, layer) in self.hidden.iter().enumerate() {
            xs = layer
                .forward(&xs)
                .and_then(|t| t.relu())
                .map_err(|e| infer_err(&format!("layers.{i} forward"), e))?;
        }

        let gloss = self
            .gloss_head
            .forward(&xs)
            .and_then(|t| t.squeeze(0))
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(|e| infer_err("gloss_head forward", e))?;

        let origin = self
            .origin_head
            .as_ref()
            .map(|head| {
                head.forward(&xs)
                    .and_then(|t| t.squeeze(0))
                    .and_then(|t| t.to_vec1::<f32>())
            })
            .transpose()
            .map_err(|e| infer_err("origin_head forward", e))?;

        Ok(EngineOutput {
            gloss_logits: gloss,
            origin_logits: origin,
        })
    }

    fn kind(&self) -> EngineKind {
        if self.origin_head.is_some() {
            EngineKind::MultiHead
        } else {
            EngineKind::SingleHead
        }
    }

    fn gloss_classes(&self) -> usize {
        self.gloss_classes
    }
}

/// Creates [`CandleGlossEngine`]s from a model buffer read once.
#[derive(Clone)]
pub struct CandleEngineFactory {
    bytes: Arc<Vec<u8>>,
}

impl CandleEngineFactory {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(bytes),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| SignflowError::ModelAsset {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        Ok(Self::new(bytes))
    }
}

impl EngineFactory for CandleEngineFactory {
    fn create(&self) -> Result<Box<dyn GlossEngine>> {
        Ok(Box::new(CandleGlossEngine::from_safetensors(&self.bytes)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(
        tensors: &mut HashMap<String, Tensor>,
        prefix: &str,
        weight: Vec<f32>,
        (out, inp): (usize, usize),
        bias: Vec<f32>,
    ) {
        let device = Device::Cpu;
        tensors.insert(
            format!("{prefix}.weight"),
            Tensor::from_vec(weight, (out, inp), &device).unwrap(),
        );
        tensors.insert(
            format!("{prefix}.bias"),
            Tensor::from_vec(bias, out, &device).unwrap(),
        );
    }

    fn serialize(tensors: &HashMap<String, Tensor>) -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        candle_core::safetensors::save(tensors, &path).unwrap();
        std::fs::read(&path).unwrap()
    }

    #[test]
    fn test_single_head_forward() {
        let mut tensors = HashMap::new();
        // Identity hidden layer over 2 inputs, then a head that swaps them.
        linear(&mut tensors, "layers.0", vec![1.0, 0.0, 0.0, 1.0], (2, 2), vec![0.0, 0.0]);
        linear(&mut tensors, "gloss_head", vec![0.0, 1.0, 1.0, 0.0], (2, 2), vec![0.5, 0.0]);
        let mut engine = CandleGlossEngine::from_safetensors(&serialize(&tensors)).unwrap();

        assert_eq!(engine.kind(), EngineKind::SingleHead);
        assert_eq!(engine.gloss_classes(), 2);
        assert_eq!(engine.input_dim(), 2);

        let out = engine.run(&[3.0, -1.0]).unwrap();
        // ReLU zeroes the negative input before the head.
        assert_eq!(out.gloss_logits, vec![0.5, 3.0]);
        assert!(out.origin_logits.is_none());
    }

    #[test]
    fn test_multi_head_forward() {
        let mut tensors = HashMap::new();
        let gloss = vec![1.0, 1.0, 1.0, -1.0, 0.0, 0.0];
        linear(&mut tensors, "gloss_head", gloss, (3, 2), vec![0.0; 3]);
        let origin = vec![1.0, 0.0, 0.0, 1.0];
        linear(&mut tensors, "origin_head", origin, (2, 2), vec![0.0; 2]);
        let mut engine = CandleGlossEngine::from_safetensors(&serialize(&tensors)).unwrap();

        assert_eq!(engine.kind(), EngineKind::MultiHead);
        assert_eq!(engine.gloss_classes(), 3);
        let out = engine.run(&[2.0, 1.0]).unwrap();
        assert_eq!(out.gloss_logits, vec![3.0, 1.0, 0.0]);
        assert_eq!(out.origin_logits, Some(vec![2.0, 1.0]));
    }

    #[test]
    fn test_wrong_input_length() {
        let mut tensors = HashMap::new();
        linear(&mut tensors, "gloss_head", vec![1.0, 1.0], (1, 2), vec![0.0]);
        let mut engine = CandleGlossEngine::from_safetensors(&serialize(&tensors)).unwrap();
        assert!(matches!(
            engine.run(&[1.0, 2.0, 3.0]),
            Err(SignflowError::TensorShape { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_missing_head_is_asset_error() {
        let mut tensors = HashMap::new();
        linear(&mut tensors, "layers.0", vec![1.0], (1, 1), vec![0.0]);
        let err = CandleGlossEngine::from_safetensors(&serialize(&tensors))
            .err()
            .unwrap();
        assert!(err.to_string().contains("missing gloss_head.weight"));
    }

    #[test]
    fn test_garbage_buffer_is_asset_error() {
        assert!(matches!(
            CandleGlossEngine::from_safetensors(b"not a model"),
            Err(SignflowError::ModelAsset { .. })
        ));
    }

    #[test]
    fn test_factory_from_missing_file() {
        let path = Path::new("/nonexistent/model.safetensors");
        assert!(CandleEngineFactory::from_file(path).is_err());
    }
}
