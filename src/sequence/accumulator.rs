//! Folds stable recognitions into a bounded token sequence.

use crate::defaults;
use crate::events::types::GlossSequenceEvent;
use crate::sequence::policy::{TokenPolicy, TokenPolicyKind};
use crate::stability::controller::RecognitionResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration for [`SequenceAccumulator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccumulatorConfig {
    pub max_tokens: usize,
    /// Letter cap for the fingerspelled word in alphabet mode.
    pub max_word_letters: usize,
    /// Results below this confidence are not accepted.
    pub min_confidence: f32,
    /// Labels never accepted as tokens (e.g. a "no sign" class).
    pub ignored_labels: Vec<String>,
    pub policy: TokenPolicyKind,
    /// Auto-commit once no token was accepted for this long (ms).
    pub idle_commit_after_ms: Option<u64>,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            max_tokens: defaults::MAX_TOKENS,
            max_word_letters: defaults::MAX_WORD_LETTERS,
            min_confidence: defaults::HIGH_CONFIDENCE,
            ignored_labels: Vec::new(),
            policy: TokenPolicyKind::default(),
            idle_commit_after_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlossToken {
    pub label: String,
    pub confidence: f32,
    pub origin: Option<String>,
}

/// Read-only snapshot of the accumulator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorState {
    pub tokens: Vec<GlossToken>,
    pub current_word: String,
    pub last_token_ms: Option<u64>,
    pub alphabet_mode: bool,
    pub non_manual_annotations: Vec<String>,
    pub has_space: bool,
}

impl AccumulatorState {
    pub fn labels(&self) -> Vec<String> {
        self.tokens.iter().map(|t| t.label.clone()).collect()
    }
}

pub struct SequenceAccumulator {
    config: AccumulatorConfig,
    policy: Box<dyn TokenPolicy>,
    tokens: Vec<GlossToken>,
    current_word: String,
    last_letter: Option<String>,
    last_token_ms: Option<u64>,
    alphabet_mode: bool,
    annotations: Vec<String>,
}

impl SequenceAccumulator {
    pub fn new(config: AccumulatorConfig) -> Self {
        Self {
            policy: config.policy.build(),
            config,
            tokens: Vec::new(),
            current_word: String::new(),
            last_letter: None,
            last_token_ms: None,
            alphabet_mode: false,
            annotations: Vec::new(),
        }
    }

    /// Replace the token policy chosen by the configuration.
    pub fn with_policy(mut self, policy: Box<dyn TokenPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn has_space(&self) -> bool {
        self.tokens.len() < self.config.max_tokens
    }

    pub fn can_add_token(&self) -> bool {
        self.has_space()
    }

    /// Fold in one debounced result. Returns whether the state changed.
    pub fn accept(&mut self, result: &RecognitionResult) -> bool {
        let label = result.label.trim();
        if label.is_empty()
            || result.confidence < self.config.min_confidence
            || self.config.ignored_labels.iter().any(|l| l == label)
        {
            return false;
        }

        if self.alphabet_mode {
            if self.current_word.chars().count() >= self.config.max_word_letters {
                tracing::debug!(label, "word full, ignoring letter");
                return false;
            }
            if !self.policy.accepts(self.last_letter.as_deref(), label) {
                return false;
            }
            self.current_word.push_str(label);
            self.last_letter = Some(label.to_string());
            self.last_token_ms = Some(result.timestamp_ms);
            return true;
        }

        if !self.has_space() {
            tracing::debug!(label, "sequence full, ignoring token");
            return false;
        }
        let previous = self.tokens.last().map(|t| t.label.as_str());
        if !self.policy.accepts(previous, label) {
            return false;
        }
        self.tokens.push(GlossToken {
            label: label.to_string(),
            confidence: result.confidence,
            origin: result.origin.clone(),
        });
        self.last_token_ms = Some(result.timestamp_ms);
        tracing::debug!(label, count = self.tokens.len(), "token added");
        true
    }

    /// Remove the last token, or the last letter in alphabet mode.
    pub fn backspace(&mut self) -> bool {
        if self.alphabet_mode {
            let removed = self.current_word.pop().is_some();
            self.last_letter = self.current_word.chars().last().map(String::from);
            return removed;
        }
        self.tokens.pop().is_some()
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
        self.current_word.clear();
        self.last_letter = None;
        self.last_token_ms = None;
        self.annotations.clear();
    }

    /// Attach a non-manual marker (e.g. `/question`) to the next sequence.
    ///
    /// Consecutive duplicates are collapsed.
    pub fn annotate(&mut self, tag: &str) {
        let tag = tag.trim();
        if tag.is_empty() || self.annotations.last().is_some_and(|last| last == tag) {
            return;
        }
        self.annotations.push(tag.to_string());
    }

    /// Commit the pending word or sequence.
    ///
    /// A composed alphabet word takes precedence; otherwise non-empty tokens
    /// become a `SequenceReady`. Nothing pending yields `None`.
    pub fn commit_sequence(&mut self, timestamp_ms: u64) -> Option<GlossSequenceEvent> {
        if !self.current_word.is_empty() {
            let word = std::mem::take(&mut self.current_word);
            self.last_letter = None;
            return Some(GlossSequenceEvent::word(word, timestamp_ms));
        }
        if self.tokens.is_empty() {
            return None;
        }

        let tokens = std::mem::take(&mut self.tokens);
        let confidence = tokens.iter().map(|t| t.confidence).sum::<f32>() / tokens.len() as f32;
        let event = GlossSequenceEvent::SequenceReady {
            origin: dominant_origin(&tokens),
            confidence: Some(confidence),
            tokens: tokens.into_iter().map(|t| t.label).collect(),
            non_manual_annotations: std::mem::take(&mut self.annotations),
            timestamp_ms,
        };
        self.last_token_ms = None;
        Some(event)
    }

    /// Auto-commit after `idle_commit_after_ms` without a new token.
    pub fn tick(&mut self, now_ms: u64) -> Option<GlossSequenceEvent> {
        let idle = self.config.idle_commit_after_ms?;
        let last = self.last_token_ms?;
        if self.tokens.is_empty() || now_ms.saturating_sub(last) < idle {
            return None;
        }
        tracing::debug!(idle_ms = now_ms - last, "idle timeout, committing sequence");
        self.commit_sequence(now_ms)
    }

    pub fn set_alphabet_mode(&mut self, enabled: bool) {
        if self.alphabet_mode != enabled {
            self.alphabet_mode = enabled;
            self.last_letter = None;
        }
    }

    pub fn alphabet_mode(&self) -> bool {
        self.alphabet_mode
    }

    pub fn state(&self) -> AccumulatorState {
        AccumulatorState {
            tokens: self.tokens.clone(),
            current_word: self.current_word.clone(),
            last_token_ms: self.last_token_ms,
            alphabet_mode: self.alphabet_mode,
            non_manual_annotations: self.annotations.clone(),
            has_space: self.has_space(),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Most frequent origin; ties go to the one seen first.
fn dominant_origin(tokens: &[GlossToken]) -> Option<String> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, origin) in tokens.iter().filter_map(|t| t.origin.as_deref()).enumerate() {
        counts.entry(origin).or_insert((0, position)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.0.cmp(&b.1.0).then(b.1.1.cmp(&a.1.1)))
        .map(|(origin, _)| origin.to_string())
}
