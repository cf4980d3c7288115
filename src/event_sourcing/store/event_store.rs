use async_trait::async_trait;
use uuid::Uuid;

use crate::event_sourcing::core::{Aggregate, DomainEvent, EventEnvelope};

// ============================================================================
// Generic Event Store - Repository for Events
// ============================================================================
//
// Responsibilities:
// 1. Append events (append-only)
// 2. Load event history for aggregates
// 3. Ensure optimistic concurrency control
//
// The store is a collaborator: the domain only depends on this trait.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    #[error("Concurrency conflict on {aggregate_id}: expected version {expected}, but current is {actual}")]
    ConcurrencyConflict {
        aggregate_id: Uuid,
        expected: i64,
        actual: i64,
    },

    #[error("Cannot append empty event list")]
    EmptyAppend,

    #[error("Event sequence gap: expected {expected}, got {actual}")]
    SequenceGap { expected: i64, actual: i64 },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait EventStore<E: DomainEvent>: Send + Sync {
    /// Append events to the stream of `aggregate_id`.
    /// Returns the new version number after appending.
    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: Vec<EventEnvelope<E>>,
    ) -> Result<i64, EventStoreError>;

    /// Load all events for an aggregate, ordered by sequence number
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<EventEnvelope<E>>, EventStoreError>;

    /// Current version of the aggregate (0 = does not exist)
    async fn current_version(&self, aggregate_id: Uuid) -> Result<i64, EventStoreError>;

    async fn aggregate_exists(&self, aggregate_id: Uuid) -> Result<bool, EventStoreError> {
        Ok(self.current_version(aggregate_id).await? > 0)
    }
}

/// Rebuild an aggregate from its stream. `Ok(None)` when the stream is empty.
pub async fn load_aggregate<A, E, S>(store: &S, aggregate_id: Uuid) -> Result<Option<A>, EventStoreError>
where
    E: DomainEvent,
    S: EventStore<E> + ?Sized,
    A: Aggregate<Event = E>,
    A::Error: std::fmt::Display,
{
    let events = store.load_events(aggregate_id).await?;
    if events.is_empty() {
        return Ok(None);
    }

    tracing::debug!(
        aggregate_id = %aggregate_id,
        event_count = events.len(),
        "Rebuilding aggregate from events"
    );

    Ok(Some(A::load_from_events(&events)?))
}
