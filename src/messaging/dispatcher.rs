use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::metrics::Metrics;
use crate::utils::{
    retry_on_transient, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState,
    RetryConfig, RetryResult,
};
use super::events::LifecycleEvent;
use super::publisher::{EventPublisher, PublishError};

// ============================================================================
// Event Dispatcher - reliable delivery of lifecycle events
// ============================================================================
//
// Sits between committed state changes and the bus:
//
//   publish(event)
//     -> retry with exponential backoff (transient failures only)
//        -> circuit breaker
//           -> EventPublisher
//     -> dead letter queue when every attempt failed
//
// A failed delivery never surfaces to the command that caused it; it is
// logged, counted and parked for redelivery.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered { attempts: u32 },
    DeadLettered,
}

#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub id: Uuid,
    pub event: LifecycleEvent,
    pub error_message: String,
    pub failure_count: u32,
    pub first_failed_at: DateTime<Utc>,
    pub last_failed_at: DateTime<Utc>,
}

pub struct EventDispatcher {
    publisher: Arc<dyn EventPublisher>,
    retry: RetryConfig,
    circuit_breaker: CircuitBreaker,
    dead_letters: Mutex<Vec<DeadLetter>>,
    metrics: Arc<Metrics>,
}

impl EventDispatcher {
    pub fn new(publisher: Arc<dyn EventPublisher>, metrics: Arc<Metrics>) -> Self {
        Self {
            publisher,
            retry: RetryConfig::aggressive(),
            circuit_breaker: CircuitBreaker::new("event-bus", CircuitBreakerConfig::default()),
            dead_letters: Mutex::new(Vec::new()),
            metrics,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = CircuitBreaker::new("event-bus", config);
        self
    }

    pub async fn publish(&self, event: LifecycleEvent) -> DispatchOutcome {
        match self.deliver(&event).await {
            Ok(attempts) => DispatchOutcome::Delivered { attempts },
            Err((error, attempts)) => {
                self.dead_letter(event, &error, attempts).await;
                DispatchOutcome::DeadLettered
            }
        }
    }

    /// Publish in order; a failed event does not stop the ones after it.
    pub async fn publish_all(&self, events: Vec<LifecycleEvent>) -> Vec<DispatchOutcome> {
        let mut outcomes = Vec::with_capacity(events.len());
        for event in events {
            outcomes.push(self.publish(event).await);
        }
        outcomes
    }

    async fn deliver(&self, event: &LifecycleEvent) -> Result<u32, (PublishError, u32)> {
        let event_type = event.event_type();

        let result = retry_on_transient(&self.retry, move |attempt| async move {
            if attempt > 1 {
                self.metrics.record_publish_retry(event_type);
            }
            match self.circuit_breaker.call(self.publisher.publish(event)).await {
                Ok(()) => Ok(()),
                Err(CircuitBreakerError::CircuitOpen) => Err(PublishError::CircuitOpen),
                Err(CircuitBreakerError::OperationFailed(e)) => Err(e),
            }
        })
        .await;

        self.metrics.update_circuit_breaker_state(self.circuit_breaker.get_state().await);

        match result {
            RetryResult::Success { attempts, .. } => {
                self.metrics.record_publish(event_type, true);
                tracing::debug!(
                    event_type = event_type,
                    order_id = %event.order_id(),
                    attempts = attempts,
                    "Event published"
                );
                Ok(attempts)
            }
            RetryResult::Failed { error, attempts } => {
                self.metrics.record_publish(event_type, false);
                Err((error, attempts))
            }
            RetryResult::PermanentFailure(error) => {
                self.metrics.record_publish(event_type, false);
                Err((error, 1))
            }
        }
    }

    async fn dead_letter(&self, event: LifecycleEvent, error: &PublishError, attempts: u32) {
        let now = Utc::now();

        tracing::error!(
            event_type = event.event_type(),
            order_id = %event.order_id(),
            error = %error,
            failure_count = attempts,
            "Adding event to Dead Letter Queue"
        );

        let mut dead_letters = self.dead_letters.lock().await;
        dead_letters.push(DeadLetter {
            id: Uuid::new_v4(),
            event,
            error_message: error.to_string(),
            failure_count: attempts,
            first_failed_at: now,
            last_failed_at: now,
        });
        self.metrics.record_dlq_message(dead_letters.len());
    }

    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.lock().await.clone()
    }

    /// Try every parked event once more. Returns how many were delivered;
    /// the rest stay parked with their failure count bumped.
    pub async fn redeliver_dead_letters(&self) -> usize {
        let parked = std::mem::take(&mut *self.dead_letters.lock().await);
        let mut delivered = 0;
        let mut still_failing = Vec::new();

        for mut letter in parked {
            match self.deliver(&letter.event).await {
                Ok(_) => delivered += 1,
                Err((error, attempts)) => {
                    letter.failure_count += attempts;
                    letter.error_message = error.to_string();
                    letter.last_failed_at = Utc::now();
                    still_failing.push(letter);
                }
            }
        }

        let mut dead_letters = self.dead_letters.lock().await;
        // Keep the original order ahead of anything parked meanwhile.
        still_failing.append(&mut dead_letters);
        *dead_letters = still_failing;
        self.metrics.dlq_size.set(dead_letters.len() as i64);

        tracing::info!(
            delivered = delivered,
            remaining = dead_letters.len(),
            "Dead letter redelivery finished"
        );

        delivered
    }

    pub async fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.get_state().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{InMemoryPublisher, OrderUpdatedEvent};
    use std::time::Duration;

    fn event() -> LifecycleEvent {
        LifecycleEvent::OrderUpdated(OrderUpdatedEvent {
            id: Uuid::new_v4(),
            order_number: "ORD-20260101-ABCDEF12".to_string(),
            status: None,
            payment_status: None,
        })
    }

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        }
    }

    fn dispatcher(publisher: Arc<InMemoryPublisher>, max_attempts: u32) -> EventDispatcher {
        EventDispatcher::new(publisher, Arc::new(Metrics::new().unwrap()))
            .with_retry(fast_retry(max_attempts))
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let publisher = Arc::new(InMemoryPublisher::new());
        publisher.fail_next(2);
        let dispatcher = dispatcher(publisher.clone(), 3);

        let outcome = dispatcher.publish(event()).await;

        assert_eq!(outcome, DispatchOutcome::Delivered { attempts: 3 });
        assert_eq!(publisher.published().await.len(), 1);
        assert!(dispatcher.dead_letters().await.is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_retries_go_to_dead_letter_queue() {
        let publisher = Arc::new(InMemoryPublisher::new());
        publisher.fail_next(5);
        let dispatcher = dispatcher(publisher.clone(), 2);

        let outcome = dispatcher.publish(event()).await;

        assert_eq!(outcome, DispatchOutcome::DeadLettered);
        assert!(publisher.published().await.is_empty());
        let dead = dispatcher.dead_letters().await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].failure_count, 2);
    }

    #[tokio::test]
    async fn test_redelivery_drains_queue_once_bus_recovers() {
        let publisher = Arc::new(InMemoryPublisher::new());
        publisher.fail_next(2);
        let dispatcher = dispatcher(publisher.clone(), 1);

        dispatcher.publish(event()).await;
        dispatcher.publish(event()).await;
        assert_eq!(dispatcher.dead_letters().await.len(), 2);

        assert_eq!(dispatcher.redeliver_dead_letters().await, 2);
        assert!(dispatcher.dead_letters().await.is_empty());
        assert_eq!(publisher.published().await.len(), 2);
    }

    #[tokio::test]
    async fn test_open_circuit_dead_letters_without_calling_bus() {
        let publisher = Arc::new(InMemoryPublisher::new());
        publisher.fail_next(1);
        let dispatcher = dispatcher(publisher.clone(), 1).with_circuit_breaker(CircuitBreakerConfig {
            failure_threshold: 1,
            timeout: Duration::from_secs(60),
            success_threshold: 1,
        });

        dispatcher.publish(event()).await;
        assert_eq!(dispatcher.circuit_state().await, CircuitState::Open);

        let outcome = dispatcher.publish(event()).await;
        assert_eq!(outcome, DispatchOutcome::DeadLettered);
        assert!(dispatcher.dead_letters().await[1]
            .error_message
            .contains("Circuit breaker open"));
    }
}
