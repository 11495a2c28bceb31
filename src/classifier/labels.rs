//! Gloss label assets and display mapping.

use crate::defaults::PLACEHOLDER_LABEL_PREFIX;
use crate::error::{Result, SignflowError};
use std::collections::HashMap;
use std::path::Path;

/// Ordered class labels, aligned by index with the model output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelSet {
    labels: Vec<String>,
    placeholder: bool,
}

impl LabelSet {
    pub fn new(labels: Vec<String>) -> Result<Self> {
        if labels.is_empty() {
            return Err(SignflowError::LabelAsset {
                message: "label list is empty".to_string(),
            });
        }
        Ok(Self {
            labels,
            placeholder: false,
        })
    }

    /// `CLASS_<i>` labels for `classes` outputs.
    pub fn placeholders(classes: usize) -> Self {
        Self {
            labels: (0..classes).map(placeholder_label).collect(),
            placeholder: true,
        }
    }

    /// Parse a JSON array of strings.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let labels: Vec<String> =
            serde_json::from_str(json).map_err(|e| SignflowError::LabelAsset {
                message: format!("invalid JSON label list: {e}"),
            })?;
        Self::new(labels)
    }

    /// Parse one label per line; blank lines are skipped.
    pub fn from_text(text: &str) -> Result<Self> {
        let labels = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        Self::new(labels)
    }

    /// Load from a `.json` array or a newline-separated text file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SignflowError::LabelAsset {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_text(&content)
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    /// Class count these labels require from the model, if they are real labels.
    pub fn expected_classes(&self) -> Option<usize> {
        (!self.placeholder && !self.labels.is_empty()).then_some(self.labels.len())
    }

    /// Label for `index`, or its placeholder when out of range.
    pub fn label(&self, index: usize) -> String {
        self.labels
            .get(index)
            .cloned()
            .unwrap_or_else(|| placeholder_label(index))
    }
}

pub fn placeholder_label(index: usize) -> String {
    format!("{PLACEHOLDER_LABEL_PREFIX}{index}")
}

/// Maps raw model labels to the labels shown to users.
///
/// Labels without an entry are shown unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayLabels {
    table: HashMap<String, String>,
}

impl DisplayLabels {
    pub fn new(table: HashMap<String, String>) -> Self {
        Self { table }
    }

    pub fn display<'a>(&'a self, raw: &'a str) -> &'a str {
        self.table.get(raw).map(String::as_str).unwrap_or(raw)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
