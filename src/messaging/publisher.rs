use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::utils::IsTransient;
use super::events::LifecycleEvent;

// ============================================================================
// Event Publisher - transport abstraction
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Bus unreachable or timed out; worth another attempt.
    #[error("Event bus unavailable: {0}")]
    Unavailable(String),

    /// The bus refused the record; retrying will not help.
    #[error("Event rejected: {0}")]
    Rejected(String),

    #[error("Circuit breaker open for event bus")]
    CircuitOpen,

    #[error("Failed to encode event: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl IsTransient for PublishError {
    fn is_transient(&self) -> bool {
        matches!(self, PublishError::Unavailable(_))
    }
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &LifecycleEvent) -> Result<(), PublishError>;
}

/// Keeps every published event in memory, in publication order.
///
/// `fail_next` makes the next `n` publishes fail with `Unavailable`.
#[derive(Default)]
pub struct InMemoryPublisher {
    events: Mutex<Vec<LifecycleEvent>>,
    pending_failures: AtomicU32,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, n: u32) {
        self.pending_failures.store(n, Ordering::SeqCst);
    }

    pub async fn published(&self) -> Vec<LifecycleEvent> {
        self.events.lock().await.clone()
    }

    pub async fn published_types(&self) -> Vec<&'static str> {
        self.events.lock().await.iter().map(LifecycleEvent::event_type).collect()
    }

    pub async fn clear(&self) {
        self.events.lock().await.clear();
    }
}

#[async_trait]
impl EventPublisher for InMemoryPublisher {
    async fn publish(&self, event: &LifecycleEvent) -> Result<(), PublishError> {
        let failing = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(PublishError::Unavailable("injected failure".to_string()));
        }

        tracing::debug!(event_type = event.event_type(), order_id = %event.order_id(), "Recorded event");
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}
