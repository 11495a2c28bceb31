//! Commit events and the bus that delivers them.

pub mod bus;
pub mod types;

pub use bus::{EventBus, EventSubscription};
pub use types::GlossSequenceEvent;
