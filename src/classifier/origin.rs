//! Origin (sign-language variant) resolution.

use crate::classifier::smoothing::{argmax, softmax};
use crate::defaults::ORIGIN_LABELS;
use std::collections::HashMap;

/// A resolved origin label with its confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Origin {
    pub label: String,
    pub confidence: f32,
}

/// Fallback origin lookup keyed by gloss label, for single-head models.
pub trait OriginPrior: Send + Sync {
    fn origin_for(&self, gloss: &str) -> Option<Origin>;
}

/// Prior backed by a fixed table, with an optional default origin.
#[derive(Debug, Clone, Default)]
pub struct StaticOriginPrior {
    table: HashMap<String, Origin>,
    default: Option<Origin>,
}

impl StaticOriginPrior {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, gloss: &str, origin: &str, confidence: f32) -> Self {
        self.table.insert(
            gloss.to_string(),
            Origin {
                label: origin.to_string(),
                confidence,
            },
        );
        self
    }

    /// Origin reported for glosses missing from the table.
    pub fn with_default(mut self, origin: &str, confidence: f32) -> Self {
        self.default = Some(Origin {
            label: origin.to_string(),
            confidence,
        });
        self
    }
}

impl OriginPrior for StaticOriginPrior {
    fn origin_for(&self, gloss: &str) -> Option<Origin> {
        self.table
            .get(gloss)
            .or(self.default.as_ref())
            .cloned()
    }
}

/// Resolve origin from model logits, falling back to the prior.
///
/// Logits are only trusted when the argmax falls on a known origin label.
pub fn resolve_origin(
    origin_logits: Option<&[f32]>,
    gloss: &str,
    prior: &dyn OriginPrior,
) -> Option<Origin> {
    if let Some(logits) = origin_logits.filter(|l| !l.is_empty()) {
        let probs = softmax(logits);
        let known = argmax(&probs)
            .and_then(|(index, confidence)| ORIGIN_LABELS.get(index).map(|l| (*l, confidence)));
        if let Some((label, confidence)) = known {
            return Some(Origin {
                label: label.to_string(),
                confidence,
            });
        }
        tracing::debug!("origin index outside known labels, using prior");
    }
    prior.origin_for(gloss)
}
