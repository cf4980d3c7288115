use std::sync::Arc;

use crate::config::AppConfig;
use crate::domain::inventory::{InMemoryReservationStore, ReservationLedger, StockLevels};
use crate::domain::order::{OrderCommandHandler, OrderEvent};
use crate::event_sourcing::store::InMemoryEventStore;
use crate::messaging::{EventDispatcher, EventPublisher};
use crate::metrics::Metrics;
use crate::utils::RetryConfig;

// ============================================================================
// Service Wiring
// ============================================================================
//
// Builds the command handler and its collaborators from configuration.
// Order streams and reservations live in memory; stock levels and the event
// transport are supplied by the caller.
//
// ============================================================================

pub struct Services {
    pub handler: Arc<OrderCommandHandler>,
    pub ledger: Arc<ReservationLedger>,
    pub dispatcher: Arc<EventDispatcher>,
    pub metrics: Arc<Metrics>,
}

impl Services {
    pub fn build(
        config: &AppConfig,
        stock: Arc<dyn StockLevels>,
        publisher: Arc<dyn EventPublisher>,
    ) -> anyhow::Result<Self> {
        let metrics = Arc::new(Metrics::new()?);

        let ledger = Arc::new(
            ReservationLedger::new(stock, Arc::new(InMemoryReservationStore::new()))
                .with_reservation_ttl(config.reservation_ttl),
        );

        let dispatcher = Arc::new(
            EventDispatcher::new(publisher, metrics.clone()).with_retry(RetryConfig {
                max_attempts: config.publish_max_attempts,
                ..RetryConfig::aggressive()
            }),
        );

        let event_store = Arc::new(InMemoryEventStore::<OrderEvent>::new("Order"));
        let handler = Arc::new(OrderCommandHandler::new(
            event_store,
            ledger.clone(),
            dispatcher.clone(),
            metrics.clone(),
        ));

        tracing::info!(
            reservation_ttl = ?config.reservation_ttl,
            publish_max_attempts = config.publish_max_attempts,
            "Services wired"
        );

        Ok(Self {
            handler,
            ledger,
            dispatcher,
            metrics,
        })
    }
}
