// ============================================================================
// Messaging - lifecycle events and their delivery
// ============================================================================

pub mod events;
pub mod publisher;
pub mod dispatcher;
#[cfg(feature = "redpanda")]
pub mod redpanda;

pub use events::*;
pub use publisher::{EventPublisher, InMemoryPublisher, PublishError};
pub use dispatcher::{DeadLetter, DispatchOutcome, EventDispatcher};
#[cfg(feature = "redpanda")]
pub use redpanda::RedpandaPublisher;
