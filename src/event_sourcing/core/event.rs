use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

// ============================================================================
// Event Envelope - Event Metadata
// ============================================================================
//
// Wraps domain events with the metadata needed to persist and replay them.
// This is GENERIC and works with ANY event type.
//
// ============================================================================

/// Generic Event Envelope - wraps any domain event with metadata
///
/// Type Parameter:
/// - `E`: The domain event type (must implement DomainEvent trait)
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EventEnvelope<E> {
    // Event Identity
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub sequence_number: i64,

    // Event Type Information
    pub event_type: String,
    pub event_version: i32,

    // Event Payload
    pub event_data: E,

    // Every event appended by one command shares a correlation id
    pub correlation_id: Uuid,

    // Who triggered this event (user id, service name, ...)
    pub actor: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl<E: DomainEvent> EventEnvelope<E> {
    /// Wrap an event, deriving type name and schema version from the event itself.
    pub fn new(
        aggregate_id: Uuid,
        sequence_number: i64,
        event_data: E,
        correlation_id: Uuid,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            aggregate_id,
            sequence_number,
            event_type: event_data.event_type().to_string(),
            event_version: event_data.event_version(),
            event_data,
            correlation_id,
            actor: None,
            timestamp: Utc::now(),
        }
    }
}

impl<E> EventEnvelope<E> {
    pub fn with_actor(mut self, actor: Option<String>) -> Self {
        self.actor = actor;
        self
    }
}

// ============================================================================
// Domain Event Trait
// ============================================================================

/// Generic Domain Event trait
///
/// All domain events must implement this trait to be used with the event store.
/// Union types (one enum per aggregate) report the name of the active variant.
pub trait DomainEvent: Serialize + for<'de> Deserialize<'de> + Clone + Send + Sync + 'static {
    fn event_type(&self) -> &'static str;
    fn event_version(&self) -> i32 { 1 }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Clone, Debug)]
    struct TestEvent {
        data: String,
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> &'static str { "TestEvent" }
        fn event_version(&self) -> i32 { 2 }
    }

    #[test]
    fn test_event_envelope_creation() {
        let aggregate_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();

        let event = TestEvent {
            data: "test".to_string(),
        };

        let envelope = EventEnvelope::new(aggregate_id, 1, event, correlation_id)
            .with_actor(Some("ops@example.com".to_string()));

        assert_eq!(envelope.aggregate_id, aggregate_id);
        assert_eq!(envelope.sequence_number, 1);
        assert_eq!(envelope.event_type, "TestEvent");
        assert_eq!(envelope.event_version, 2);
        assert_eq!(envelope.correlation_id, correlation_id);
        assert_eq!(envelope.actor.as_deref(), Some("ops@example.com"));
    }

    #[test]
    fn test_envelope_serializes_payload_inline() {
        let envelope = EventEnvelope::new(Uuid::new_v4(), 3, TestEvent { data: "x".to_string() }, Uuid::new_v4());

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["event_type"], "TestEvent");
        assert_eq!(json["event_data"]["data"], "x");

        let back: EventEnvelope<TestEvent> = serde_json::from_value(json).unwrap();
        assert_eq!(back.sequence_number, 3);
    }
}
