//! Token acceptance policies for the sequence accumulator.

use serde::{Deserialize, Serialize};

/// Decides whether a recognized label counts as a new token.
pub trait TokenPolicy: Send + Sync {
    /// `previous` is the last accepted token (or letter in alphabet mode).
    fn accepts(&self, previous: Option<&str>, candidate: &str) -> bool;

    fn name(&self) -> &'static str;
}

/// Rejects immediate repeats of the previous token.
#[derive(Debug, Clone, Copy, Default)]
pub struct DistinctFromPrevious;

impl TokenPolicy for DistinctFromPrevious {
    fn accepts(&self, previous: Option<&str>, candidate: &str) -> bool {
        previous != Some(candidate)
    }

    fn name(&self) -> &'static str {
        "distinct_from_previous"
    }
}

/// Accepts every label, repeats included.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl TokenPolicy for AcceptAll {
    fn accepts(&self, _previous: Option<&str>, _candidate: &str) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "accept_all"
    }
}

/// Policy selection in configuration files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPolicyKind {
    #[default]
    DistinctFromPrevious,
    AcceptAll,
}

impl TokenPolicyKind {
    pub fn build(self) -> Box<dyn TokenPolicy> {
        match self {
            Self::DistinctFromPrevious => Box::new(DistinctFromPrevious),
            Self::AcceptAll => Box::new(AcceptAll),
        }
    }
}
