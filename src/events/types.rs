use serde::{Deserialize, Serialize};

/// Commit decisions published to downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GlossSequenceEvent {
    /// A committed gloss sequence.
    SequenceReady {
        tokens: Vec<String>,
        /// Non-manual markers (facial grammar, tone) attached to the sequence.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        non_manual_annotations: Vec<String>,
        /// Dominant origin across the tokens.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        origin: Option<String>,
        /// Mean token confidence.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f32>,
        timestamp_ms: u64,
    },
    /// A fingerspelled word composed in alphabet mode.
    WordCommitted { word: String, timestamp_ms: u64 },
}

impl GlossSequenceEvent {
    pub fn sequence(tokens: Vec<String>, timestamp_ms: u64) -> Self {
        Self::SequenceReady {
            tokens,
            non_manual_annotations: Vec::new(),
            origin: None,
            confidence: None,
            timestamp_ms,
        }
    }

    pub fn word(word: impl Into<String>, timestamp_ms: u64) -> Self {
        Self::WordCommitted {
            word: word.into(),
            timestamp_ms,
        }
    }

    /// Empty sequences and blank words are never published.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::SequenceReady { tokens, .. } => tokens.is_empty(),
            Self::WordCommitted { word, .. } => word.trim().is_empty(),
        }
    }

    pub fn timestamp_ms(&self) -> u64 {
        match self {
            Self::SequenceReady { timestamp_ms, .. } | Self::WordCommitted { timestamp_ms, .. } => {
                *timestamp_ms
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::SequenceReady { .. } => "sequence_ready",
            Self::WordCommitted { .. } => "word_committed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_json_shape() {
        let event = GlossSequenceEvent::sequence(vec!["HELLO".into(), "WORLD".into()], 5);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "sequence_ready");
        assert_eq!(json["tokens"][1], "WORLD");
        assert!(json.get("origin").is_none());
    }

    #[test]
    fn test_word_json_parses() {
        let event: GlossSequenceEvent =
            serde_json::from_str(r#"{"type":"word_committed","word":"CAT","timestamp_ms":9}"#)
                .unwrap();
        assert_eq!(event, GlossSequenceEvent::word("CAT", 9));
        assert_eq!(event.kind(), "word_committed");
    }

    #[test]
    fn test_emptiness() {
        assert!(GlossSequenceEvent::sequence(vec![], 0).is_empty());
        assert!(GlossSequenceEvent::word("  ", 0).is_empty());
        assert!(!GlossSequenceEvent::word("A", 0).is_empty());
    }
}
