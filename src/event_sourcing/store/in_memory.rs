use std::collections::HashMap;
use std::marker::PhantomData;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::event_sourcing::core::{DomainEvent, EventEnvelope};
use super::event_store::{EventStore, EventStoreError};

// ============================================================================
// In-Memory Event Store
// ============================================================================
//
// Process-local implementation of the EventStore contract. The version check
// and the append happen under one write lock, so an append is atomic with
// respect to readers and to other writers.
//
// ============================================================================

pub struct InMemoryEventStore<E: DomainEvent> {
    streams: RwLock<HashMap<Uuid, Vec<EventEnvelope<E>>>>,
    aggregate_type_name: String,
    _phantom: PhantomData<E>,
}

impl<E: DomainEvent> InMemoryEventStore<E> {
    pub fn new(aggregate_type_name: &str) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            aggregate_type_name: aggregate_type_name.to_string(),
            _phantom: PhantomData,
        }
    }

    pub async fn stream_count(&self) -> usize {
        self.streams.read().await.len()
    }
}

#[async_trait]
impl<E: DomainEvent> EventStore<E> for InMemoryEventStore<E> {
    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: Vec<EventEnvelope<E>>,
    ) -> Result<i64, EventStoreError> {
        if events.is_empty() {
            return Err(EventStoreError::EmptyAppend);
        }

        let mut streams = self.streams.write().await;

        let current_version = streams
            .get(&aggregate_id)
            .and_then(|stream| stream.last())
            .map(|e| e.sequence_number)
            .unwrap_or(0);
        if current_version != expected_version {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual: current_version,
            });
        }

        let mut new_version = expected_version;
        for envelope in &events {
            if envelope.sequence_number != new_version + 1 {
                return Err(EventStoreError::SequenceGap {
                    expected: new_version + 1,
                    actual: envelope.sequence_number,
                });
            }
            new_version = envelope.sequence_number;
        }

        // Only a validated append may create the stream.
        let event_count = events.len();
        streams.entry(aggregate_id).or_default().extend(events);

        tracing::debug!(
            aggregate_id = %aggregate_id,
            aggregate_type = %self.aggregate_type_name,
            new_version = new_version,
            event_count = event_count,
            "Appended events to event store"
        );

        Ok(new_version)
    }

    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<EventEnvelope<E>>, EventStoreError> {
        let streams = self.streams.read().await;
        Ok(streams.get(&aggregate_id).cloned().unwrap_or_default())
    }

    async fn current_version(&self, aggregate_id: Uuid) -> Result<i64, EventStoreError> {
        let streams = self.streams.read().await;
        Ok(streams
            .get(&aggregate_id)
            .and_then(|stream| stream.last())
            .map(|e| e.sequence_number)
            .unwrap_or(0))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
