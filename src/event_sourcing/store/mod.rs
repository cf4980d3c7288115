// ============================================================================
// Event Sourcing Store - Generic Persistence Layer
// ============================================================================

pub mod event_store;
pub mod in_memory;

pub use event_store::{EventStore, EventStoreError, load_aggregate};
pub use in_memory::InMemoryEventStore;
