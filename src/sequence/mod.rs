//! Token accumulation and commit boundaries.

pub mod accumulator;
pub mod policy;

pub use accumulator::{AccumulatorConfig, AccumulatorState, GlossToken, SequenceAccumulator};
pub use policy::{AcceptAll, DistinctFromPrevious, TokenPolicy, TokenPolicyKind};
