use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::inventory::{
    InventoryItemId, LedgerError, Reservation, ReservationLedger, Settlement,
};
use crate::event_sourcing::core::{Aggregate, EventEnvelope};
use crate::event_sourcing::store::{load_aggregate, EventStore, EventStoreError};
use crate::messaging::{EventDispatcher, LifecycleEvent};
use crate::metrics::Metrics;
use crate::utils::{KeyedGuard, KeyedLocks};

use super::aggregate::OrderAggregate;
use super::commands::{OrderCommand, StatusChangeRequest};
use super::errors::OrderError;
use super::events::OrderEvent;
use super::value_objects::{OrderItem, OrderStatus};

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Orchestrates: Command → Aggregate → Ledger → Event Store → Publisher
//
// One writer per order: the order lock is held from loading the aggregate
// until its events are appended and the ledger has been settled. Ledger calls
// take item locks underneath it. Before the order lock drops, the command
// takes the order's publish lock and keeps it until its lifecycle events are
// delivered, so one order's events leave in commit order without blocking the
// next command's commit. A failed publication never undoes a committed change.
//
//   CONFIRMED            reserve all lines, then append (discard on failure)
//   CANCELLED/DELIVERED  append, then release/consume reservations
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Order {0} not found")]
    OrderNotFound(Uuid),

    #[error("Order {order_id}: invalid status transition {from} -> {to}")]
    InvalidTransition {
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("Order {order_id}: could not reserve inventory: {source}")]
    ReservationFailure {
        order_id: Uuid,
        #[source]
        source: LedgerError,
    },

    /// The status change is committed but its reservations were not settled.
    /// Repeating the same command settles them.
    #[error("Order {order_id}: status committed but reservations not settled: {source}")]
    SettlementFailure {
        order_id: Uuid,
        #[source]
        source: LedgerError,
    },

    #[error(transparent)]
    Validation(OrderError),

    #[error("Order {order_id} was modified concurrently (expected version {expected}, found {actual})")]
    ConcurrencyConflict {
        order_id: Uuid,
        expected: i64,
        actual: i64,
    },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl CommandError {
    fn rejected(order_id: Uuid, error: OrderError) -> Self {
        match error {
            OrderError::InvalidTransition { from, to } => {
                CommandError::InvalidTransition { order_id, from, to }
            }
            other => CommandError::Validation(other),
        }
    }

    fn from_store(order_id: Uuid, error: EventStoreError) -> Self {
        match error {
            EventStoreError::ConcurrencyConflict { expected, actual, .. } => {
                CommandError::ConcurrencyConflict { order_id, expected, actual }
            }
            other => CommandError::Storage(other.into()),
        }
    }

    /// Whether the same command may succeed if sent again unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            CommandError::ConcurrencyConflict { .. }
            | CommandError::SettlementFailure { .. }
            | CommandError::Storage(_) => true,
            CommandError::ReservationFailure { source, .. } => {
                matches!(source, LedgerError::Storage(_))
            }
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CommandError::OrderNotFound(_))
    }

    /// Metric label for a rejected command
    fn label(&self) -> &'static str {
        match self {
            CommandError::OrderNotFound(_) => "not_found",
            CommandError::InvalidTransition { .. } => "invalid_transition",
            CommandError::ReservationFailure { source: LedgerError::InsufficientStock { .. }, .. } => {
                "insufficient_stock"
            }
            CommandError::ReservationFailure { .. } => "reservation_failure",
            CommandError::SettlementFailure { .. } => "settlement_failure",
            CommandError::Validation(OrderError::ReasonRequired) => "reason_required",
            CommandError::Validation(_) => "validation",
            CommandError::ConcurrencyConflict { .. } => "concurrency_conflict",
            CommandError::Storage(_) => "storage",
        }
    }
}

/// A command whose state change is committed, holding its turn to publish
struct Accepted<'a> {
    order: OrderAggregate,
    events: Vec<LifecycleEvent>,
    settlement_error: Option<CommandError>,
    publish_turn: KeyedGuard<'a, Uuid>,
}

pub struct OrderCommandHandler {
    event_store: Arc<dyn EventStore<OrderEvent>>,
    ledger: Arc<ReservationLedger>,
    dispatcher: Arc<EventDispatcher>,
    metrics: Arc<Metrics>,
    order_locks: KeyedLocks<Uuid>,
    publish_locks: KeyedLocks<Uuid>,
}

impl OrderCommandHandler {
    pub fn new(
        event_store: Arc<dyn EventStore<OrderEvent>>,
        ledger: Arc<ReservationLedger>,
        dispatcher: Arc<EventDispatcher>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            event_store,
            ledger,
            dispatcher,
            metrics,
            order_locks: KeyedLocks::new(),
            publish_locks: KeyedLocks::new(),
        }
    }

    /// Create a PENDING order. Nothing is reserved until it is confirmed.
    pub async fn create_order(
        &self,
        customer_id: Uuid,
        items: Vec<OrderItem>,
    ) -> Result<OrderAggregate, CommandError> {
        self.handle(Uuid::new_v4(), OrderCommand::CreateOrder { customer_id, items })
            .await
    }

    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        reason: impl Into<String>,
    ) -> Result<OrderAggregate, CommandError> {
        self.change_status(
            order_id,
            StatusChangeRequest::to(OrderStatus::Cancelled).with_reason(reason),
        )
        .await
    }

    pub async fn update_status(
        &self,
        order_id: Uuid,
        target: OrderStatus,
    ) -> Result<OrderAggregate, CommandError> {
        self.change_status(order_id, StatusChangeRequest::to(target)).await
    }

    pub async fn change_status(
        &self,
        order_id: Uuid,
        request: StatusChangeRequest,
    ) -> Result<OrderAggregate, CommandError> {
        self.handle(order_id, OrderCommand::ChangeStatus(request)).await
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderAggregate, CommandError> {
        self.load(order_id)
            .await?
            .ok_or(CommandError::OrderNotFound(order_id))
    }

    /// Handle a command and return the order as it stands afterwards
    pub async fn handle(
        &self,
        order_id: Uuid,
        command: OrderCommand,
    ) -> Result<OrderAggregate, CommandError> {
        let started = Instant::now();
        let command_name = match &command {
            OrderCommand::CreateOrder { .. } => "create_order",
            OrderCommand::ChangeStatus(_) => "change_status",
        };

        let result = match command {
            OrderCommand::CreateOrder { customer_id, items } => {
                self.create(order_id, customer_id, items).await
            }
            OrderCommand::ChangeStatus(request) => self.transition(order_id, request).await,
        };

        self.metrics
            .observe_command(command_name, started.elapsed().as_secs_f64());

        let accepted = match result {
            Ok(accepted) => accepted,
            Err(error) => {
                self.metrics.record_rejection(error.label());
                tracing::warn!(
                    order_id = %order_id,
                    command = command_name,
                    error = %error,
                    "Command rejected"
                );
                return Err(error);
            }
        };

        let Accepted {
            order,
            events,
            settlement_error,
            publish_turn,
        } = accepted;

        // The order lock is released by now; delivery problems stay inside the dispatcher.
        self.dispatcher.publish_all(events).await;
        drop(publish_turn);

        match settlement_error {
            Some(error) => {
                self.metrics.record_rejection(error.label());
                Err(error)
            }
            None => Ok(order),
        }
    }

    /// Wrap a committed result. Must be called with the order lock held.
    async fn accept(
        &self,
        order: OrderAggregate,
        events: Vec<LifecycleEvent>,
        settlement_error: Option<CommandError>,
    ) -> Accepted<'_> {
        let publish_turn = self.publish_locks.lock(&order.id).await;
        Accepted {
            order,
            events,
            settlement_error,
            publish_turn,
        }
    }

    async fn create(
        &self,
        order_id: Uuid,
        customer_id: Uuid,
        items: Vec<OrderItem>,
    ) -> Result<Accepted<'_>, CommandError> {
        let _guard = self.order_locks.lock(&order_id).await;

        if self.load(order_id).await?.is_some() {
            return Err(CommandError::Validation(OrderError::AlreadyCreated));
        }

        let events = OrderAggregate::create(order_id, customer_id, items, Utc::now())
            .map_err(|e| CommandError::rejected(order_id, e))?;

        let mut order = OrderAggregate::apply_first_event(order_id, &events[0])
            .map_err(|e| CommandError::rejected(order_id, e))?;
        let version = self.persist(&mut order, 0, events, None).await?;
        order.set_version(version);

        self.metrics.orders_created.inc();
        tracing::info!(
            order_id = %order_id,
            order_number = %order.order_number,
            customer_id = %customer_id,
            total_amount = %order.total_amount,
            item_count = order.items.len(),
            "Order created"
        );

        let created = LifecycleEvent::order_created(&order);
        Ok(self.accept(order, vec![created], None).await)
    }

    async fn transition(
        &self,
        order_id: Uuid,
        request: StatusChangeRequest,
    ) -> Result<Accepted<'_>, CommandError> {
        let _guard = self.order_locks.lock(&order_id).await;

        let order = self
            .load(order_id)
            .await?
            .ok_or(CommandError::OrderNotFound(order_id))?;

        let events = order
            .handle_command(&OrderCommand::ChangeStatus(request.clone()))
            .map_err(|e| CommandError::rejected(order_id, e))?;

        let Some(OrderEvent::StatusChanged(change)) = events.first().cloned() else {
            tracing::debug!(
                order_id = %order_id,
                status = ?order.status,
                "Order already in requested status"
            );
            // Settling again is idempotent and finishes a settlement that failed after commit.
            let (settled, settlement_error) = self.settle(&order, order.status, None).await;
            return Ok(self.accept(order, settled, settlement_error).await);
        };

        let reserved = if change.to == OrderStatus::Confirmed {
            self.ledger
                .reserve_for_order(order_id, &reservation_lines(&order))
                .await
                .map_err(|source| {
                    if matches!(source, LedgerError::InsufficientStock { .. }) {
                        self.metrics.record_reservations("insufficient_stock", 1);
                    }
                    CommandError::ReservationFailure { order_id, source }
                })?
        } else {
            Vec::new()
        };

        let mut updated = order.clone();
        let expected_version = order.version();
        let persisted = self
            .persist(&mut updated, expected_version, events, request.actor.clone())
            .await;

        let version = match persisted {
            Ok(version) => version,
            Err(error) => {
                if let Err(discard_err) = self.ledger.discard(&reserved).await {
                    tracing::error!(
                        order_id = %order_id,
                        error = %discard_err,
                        "Failed to discard reservations after rejected append"
                    );
                }
                return Err(error);
            }
        };
        updated.set_version(version);

        self.metrics
            .record_transition(change.from.as_str(), change.to.as_str());
        self.metrics.record_reservations("reserved", reserved.len());
        tracing::info!(
            order_id = %order_id,
            from = ?change.from,
            to = ?change.to,
            actor = ?change.actor,
            reason = ?change.reason,
            version = version,
            "Order status changed"
        );

        let mut lifecycle = vec![LifecycleEvent::for_transition(&updated, &change)];
        lifecycle.extend(reserved.iter().map(LifecycleEvent::inventory_reserved));

        // The transition is committed: it and whatever did settle are announced
        // even if settlement fails part way.
        let (settled, settlement_error) =
            self.settle(&updated, change.to, change.reason.as_deref()).await;
        lifecycle.extend(settled);

        Ok(self.accept(updated, lifecycle, settlement_error).await)
    }

    /// Release or consume the order's reservations for a committed status.
    /// Returns an event for every reservation settled, even when some failed.
    async fn settle(
        &self,
        order: &OrderAggregate,
        status: OrderStatus,
        reason: Option<&str>,
    ) -> (Vec<LifecycleEvent>, Option<CommandError>) {
        let (settlement, outcome, to_event): (Settlement, &str, fn(&Reservation) -> LifecycleEvent) =
            match status {
                OrderStatus::Cancelled => {
                    let reason = reason
                        .or_else(|| order.status_history.last().and_then(|h| h.reason.as_deref()))
                        .unwrap_or(OrderStatus::Cancelled.as_str());
                    (
                        self.ledger.release_by_order(order.id, reason).await,
                        "released",
                        LifecycleEvent::inventory_released,
                    )
                }
                OrderStatus::Delivered => (
                    self.ledger.consume_by_order(order.id).await,
                    "consumed",
                    LifecycleEvent::inventory_consumed,
                ),
                _ => return (Vec::new(), None),
            };

        let settled = settlement.settled.len();
        self.metrics.record_reservations(outcome, settled);
        let events = settlement.settled.iter().map(to_event).collect();

        let error = settlement.error.map(|source| {
            tracing::error!(
                order_id = %order.id,
                status = ?status,
                settled = settled,
                error = %source,
                "Reservation settlement failed after commit"
            );
            CommandError::SettlementFailure { order_id: order.id, source }
        });

        (events, error)
    }

    async fn load(&self, order_id: Uuid) -> Result<Option<OrderAggregate>, CommandError> {
        load_aggregate::<OrderAggregate, _, _>(self.event_store.as_ref(), order_id)
            .await
            .map_err(|e| CommandError::from_store(order_id, e))
    }

    /// Apply `events` to `order` and append them at `expected_version`.
    /// For a new order the first event has already been applied.
    async fn persist(
        &self,
        order: &mut OrderAggregate,
        expected_version: i64,
        events: Vec<OrderEvent>,
        actor: Option<String>,
    ) -> Result<i64, CommandError> {
        let order_id = order.aggregate_id();
        let correlation_id = Uuid::new_v4();

        let mut envelopes = Vec::with_capacity(events.len());
        for (offset, event) in events.into_iter().enumerate() {
            if expected_version > 0 || offset > 0 {
                order
                    .apply_event(&event)
                    .map_err(|e| CommandError::rejected(order_id, e))?;
            }
            let sequence_number = expected_version + offset as i64 + 1;
            envelopes.push(
                EventEnvelope::new(order_id, sequence_number, event, correlation_id)
                    .with_actor(actor.clone()),
            );
        }

        self.event_store
            .append_events(order_id, expected_version, envelopes)
            .await
            .map_err(|e| CommandError::from_store(order_id, e))
    }
}

fn reservation_lines(order: &OrderAggregate) -> Vec<(InventoryItemId, u32)> {
    order
        .items
        .iter()
        .map(|item| (InventoryItemId::from(&item.product_id), item.quantity))
        .collect()
}

// ============================================================================
// Unit Tests
// ============================================================================
