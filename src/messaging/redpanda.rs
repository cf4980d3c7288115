use std::time::Duration;

use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    error::{KafkaError, RDKafkaErrorCode},
    producer::{FutureProducer, FutureRecord},
};

use super::events::LifecycleEvent;
use super::publisher::{EventPublisher, PublishError};

// ============================================================================
// Redpanda Publisher - Kafka protocol transport
// ============================================================================
//
// Events are JSON, keyed by order id so one order's events share a partition.
// Retry and circuit breaking live in EventDispatcher, not here.
//
// ============================================================================

pub struct RedpandaPublisher {
    producer: FutureProducer,
    send_timeout: Duration,
}

impl RedpandaPublisher {
    pub fn new(brokers: &str) -> anyhow::Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("enable.idempotence", "true")
            .create()?;

        tracing::info!(brokers = %brokers, "Redpanda producer created");

        Ok(Self {
            producer,
            send_timeout: Duration::from_secs(5),
        })
    }
}

#[async_trait]
impl EventPublisher for RedpandaPublisher {
    async fn publish(&self, event: &LifecycleEvent) -> Result<(), PublishError> {
        let topic = event.topic();
        let key = event.order_id().to_string();
        let payload = serde_json::to_string(event)?;

        let record = FutureRecord::to(topic)
            .key(&key)
            .payload(&payload);

        self.producer
            .send(record, rdkafka::util::Timeout::After(self.send_timeout))
            .await
            .map_err(|(e, _)| classify(e))?;

        tracing::info!(
            topic = %topic,
            key = %key,
            event_type = event.event_type(),
            "Published to Redpanda"
        );

        Ok(())
    }
}

fn classify(error: KafkaError) -> PublishError {
    match error {
        KafkaError::MessageProduction(
            RDKafkaErrorCode::MessageSizeTooLarge
            | RDKafkaErrorCode::InvalidMessage
            | RDKafkaErrorCode::TopicAuthorizationFailed
            | RDKafkaErrorCode::UnknownTopicOrPartition,
        ) => PublishError::Rejected(error.to_string()),
        other => PublishError::Unavailable(other.to_string()),
    }
}
