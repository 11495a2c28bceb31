//! Bounded top-k snapshots for observability.

use crate::classifier::labels::LabelSet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopEntry {
    pub index: usize,
    pub label: String,
    pub value: f32,
}

/// Top-k snapshots of one inference at each processing stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopKSnapshots {
    pub raw: Vec<TopEntry>,
    pub averaged: Vec<TopEntry>,
    pub softmax: Vec<TopEntry>,
}

/// The `k` largest values, descending; ties keep index order.
pub fn top_k(values: &[f32], k: usize, labels: &LabelSet) -> Vec<TopEntry> {
    let mut indices: Vec<usize> = (0..values.len()).collect();
    indices.sort_by(|&a, &b| values[b].total_cmp(&values[a]).then(a.cmp(&b)));
    indices
        .into_iter()
        .take(k)
        .map(|index| TopEntry {
            index,
            label: labels.label(index),
            value: values[index],
        })
        .collect()
}
