use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event_sourcing::core::Aggregate;
use super::commands::{OrderCommand, StatusChangeRequest};
use super::errors::OrderError;
use super::events::*;
use super::value_objects::{order_number_for, OrderItem, OrderStatus, StatusChange};

// ============================================================================
// Order Aggregate - Order Lifecycle State Machine
// ============================================================================
//
// The aggregate owns `status` and `status_history`. Every accepted transition
// is exactly one `StatusChanged` event, so the history length always equals
// the number of transitions performed.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAggregate {
    // Identity
    pub id: Uuid,
    pub version: i64,
    pub order_number: String,

    pub customer_id: Uuid,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub status_history: Vec<StatusChange>,
    pub tracking_number: Option<String>,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderAggregate {
    /// Validate a new order and produce its creation event.
    pub fn create(
        order_id: Uuid,
        customer_id: Uuid,
        items: Vec<OrderItem>,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        validate_items(&items)?;

        let total_amount = items.iter().map(OrderItem::line_total).sum();

        Ok(vec![OrderEvent::Created(OrderCreated {
            order_number: order_number_for(order_id, now),
            customer_id,
            items,
            total_amount,
            created_at: now,
        })])
    }

    /// Validate a transition request against the transition table.
    ///
    /// Requesting the current status returns no events; the terminal status
    /// accepts nothing, not even itself.
    fn change_status(&self, request: &StatusChangeRequest) -> Result<Vec<OrderEvent>, OrderError> {
        let target = request.target;

        if self.status.is_terminal() {
            return Err(OrderError::InvalidTransition { from: self.status, to: target });
        }

        if target == self.status {
            return Ok(vec![]);
        }

        if !self.status.can_transition_to(target) {
            return Err(OrderError::InvalidTransition { from: self.status, to: target });
        }

        let reason = request
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);

        if target == OrderStatus::Cancelled && reason.is_none() {
            return Err(OrderError::ReasonRequired);
        }

        let tracking_number = match target {
            OrderStatus::Shipped => request.tracking_number.clone(),
            _ => None,
        };

        Ok(vec![OrderEvent::StatusChanged(OrderStatusChanged {
            from: self.status,
            to: target,
            reason,
            actor: request.actor.clone(),
            tracking_number,
            changed_at: Utc::now(),
        })])
    }
}

fn validate_items(items: &[OrderItem]) -> Result<(), OrderError> {
    if items.is_empty() {
        return Err(OrderError::EmptyItems);
    }

    for item in items {
        if item.quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                product_id: item.product_id.to_string(),
                quantity: item.quantity,
            });
        }
        if item.unit_price.is_sign_negative() {
            return Err(OrderError::NegativeUnitPrice(item.product_id.to_string()));
        }
    }

    Ok(())
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for OrderAggregate {
    type Event = OrderEvent;
    type Command = OrderCommand;
    type Error = OrderError;

    fn apply_first_event(aggregate_id: Uuid, event: &Self::Event) -> Result<Self, Self::Error> {
        match event {
            OrderEvent::Created(e) => Ok(Self {
                id: aggregate_id,
                version: 0,
                order_number: e.order_number.clone(),
                customer_id: e.customer_id,
                items: e.items.clone(),
                total_amount: e.total_amount,
                status: OrderStatus::Pending,
                status_history: Vec::new(),
                tracking_number: None,
                created_at: e.created_at,
                updated_at: e.created_at,
            }),
            _ => Err(OrderError::NotInitialized),
        }
    }

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            OrderEvent::Created(_) => Err(OrderError::AlreadyCreated),
            OrderEvent::StatusChanged(e) => {
                // A recorded transition must be an edge of the table from the current status.
                if e.from != self.status || !e.from.can_transition_to(e.to) {
                    return Err(OrderError::InvalidTransition { from: self.status, to: e.to });
                }

                self.status = e.to;
                if e.tracking_number.is_some() {
                    self.tracking_number = e.tracking_number.clone();
                }
                self.updated_at = e.changed_at;
                self.status_history.push(StatusChange {
                    from_status: e.from,
                    to_status: e.to,
                    reason: e.reason.clone(),
                    timestamp: e.changed_at,
                    actor: e.actor.clone(),
                });
                Ok(())
            }
        }
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::CreateOrder { .. } => Err(OrderError::AlreadyCreated),
            OrderCommand::ChangeStatus(request) => self.change_status(request),
        }
    }

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::EventEnvelope;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn new_order() -> OrderAggregate {
        let id = Uuid::new_v4();
        let events = OrderAggregate::create(
            id,
            Uuid::new_v4(),
            vec![
                OrderItem::new("P1", 5, dec!(10.00)),
                OrderItem::new("P2", 1, dec!(2.50)),
            ],
            Utc::now(),
        )
        .unwrap();
        OrderAggregate::apply_first_event(id, &events[0]).unwrap()
    }

    fn step(order: &mut OrderAggregate, request: StatusChangeRequest) -> Result<usize, OrderError> {
        let events = order.handle_command(&OrderCommand::ChangeStatus(request))?;
        for event in &events {
            order.apply_event(event)?;
        }
        Ok(events.len())
    }

    #[test]
    fn test_create_computes_total_and_starts_pending() {
        let order = new_order();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_amount, dec!(52.50));
        assert!(order.status_history.is_empty());
        assert!(order.order_number.starts_with("ORD-"));
    }

    #[test]
    fn test_create_rejects_bad_items() {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let customer = Uuid::new_v4();

        assert_eq!(
            OrderAggregate::create(id, customer, vec![], now).unwrap_err(),
            OrderError::EmptyItems
        );
        assert!(matches!(
            OrderAggregate::create(id, customer, vec![OrderItem::new("P1", 0, dec!(1))], now),
            Err(OrderError::InvalidQuantity { quantity: 0, .. })
        ));
        assert!(matches!(
            OrderAggregate::create(id, customer, vec![OrderItem::new("P1", 1, dec!(-1))], now),
            Err(OrderError::NegativeUnitPrice(_))
        ));
    }

    #[test]
    fn test_happy_path_records_history() {
        let mut order = new_order();
        step(&mut order, StatusChangeRequest::to(OrderStatus::Confirmed).by("clerk")).unwrap();
        step(&mut order, StatusChangeRequest::to(OrderStatus::Processing)).unwrap();
        step(
            &mut order,
            StatusChangeRequest::to(OrderStatus::Shipped).with_tracking_number("1Z999"),
        )
        .unwrap();
        step(&mut order, StatusChangeRequest::to(OrderStatus::Delivered)).unwrap();

        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(order.status_history.len(), 4);
        assert_eq!(order.tracking_number.as_deref(), Some("1Z999"));
        assert_eq!(order.status_history[0].actor.as_deref(), Some("clerk"));
        assert_eq!(order.status_history[3].from_status, OrderStatus::Shipped);
    }

    #[test]
    fn test_invalid_transition_is_rejected() {
        let mut order = new_order();
        let err = step(&mut order, StatusChangeRequest::to(OrderStatus::Shipped)).unwrap_err();
        assert_eq!(
            err,
            OrderError::InvalidTransition { from: OrderStatus::Pending, to: OrderStatus::Shipped }
        );
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_cancel_requires_reason() {
        let mut order = new_order();
        assert_eq!(
            step(&mut order, StatusChangeRequest::to(OrderStatus::Cancelled)).unwrap_err(),
            OrderError::ReasonRequired
        );
        assert_eq!(
            step(&mut order, StatusChangeRequest::to(OrderStatus::Cancelled).with_reason("   "))
                .unwrap_err(),
            OrderError::ReasonRequired
        );

        step(
            &mut order,
            StatusChangeRequest::to(OrderStatus::Cancelled).with_reason(" customer request "),
        )
        .unwrap();
        assert_eq!(order.status_history[0].reason.as_deref(), Some("customer request"));
    }

    #[test]
    fn test_same_target_is_a_no_op() {
        let mut order = new_order();
        step(&mut order, StatusChangeRequest::to(OrderStatus::Confirmed)).unwrap();
        let emitted = step(&mut order, StatusChangeRequest::to(OrderStatus::Confirmed)).unwrap();

        assert_eq!(emitted, 0);
        assert_eq!(order.status_history.len(), 1);
    }

    #[test]
    fn test_refunded_accepts_nothing() {
        let mut order = new_order();
        step(&mut order, StatusChangeRequest::to(OrderStatus::Cancelled).with_reason("dup")).unwrap();
        step(&mut order, StatusChangeRequest::to(OrderStatus::Refunded)).unwrap();

        for target in OrderStatus::ALL {
            let err = step(&mut order, StatusChangeRequest::to(target).with_reason("x")).unwrap_err();
            assert!(matches!(err, OrderError::InvalidTransition { from: OrderStatus::Refunded, .. }));
        }
        assert_eq!(order.status_history.len(), 2);
    }

    #[test]
    fn test_tracking_number_only_kept_for_shipping() {
        let mut order = new_order();
        step(
            &mut order,
            StatusChangeRequest::to(OrderStatus::Confirmed).with_tracking_number("ignored"),
        )
        .unwrap();
        assert!(order.tracking_number.is_none());
    }

    #[test]
    fn test_replay_rebuilds_state_and_version() {
        let id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();
        let mut events = OrderAggregate::create(
            id,
            Uuid::new_v4(),
            vec![OrderItem::new("P1", 1, dec!(3))],
            Utc::now(),
        )
        .unwrap();
        let order = OrderAggregate::apply_first_event(id, &events[0]).unwrap();
        events.extend(
            order
                .handle_command(&OrderCommand::ChangeStatus(StatusChangeRequest::to(OrderStatus::Confirmed)))
                .unwrap(),
        );

        let envelopes: Vec<_> = events
            .into_iter()
            .enumerate()
            .map(|(i, e)| EventEnvelope::new(id, i as i64 + 1, e, correlation_id))
            .collect();

        let rebuilt = OrderAggregate::load_from_events(&envelopes).unwrap();
        assert_eq!(rebuilt.id, id);
        assert_eq!(rebuilt.version, 2);
        assert_eq!(rebuilt.status, OrderStatus::Confirmed);
        assert_eq!(rebuilt.status_history.len(), 1);
    }

    #[test]
    fn test_replay_rejects_out_of_table_history() {
        let mut order = new_order();
        let bogus = OrderEvent::StatusChanged(OrderStatusChanged {
            from: OrderStatus::Pending,
            to: OrderStatus::Delivered,
            reason: None,
            actor: None,
            tracking_number: None,
            changed_at: Utc::now(),
        });
        assert!(order.apply_event(&bogus).is_err());
        assert_eq!(order.status, OrderStatus::Pending);
    }

    fn any_status() -> impl Strategy<Value = OrderStatus> {
        prop::sample::select(OrderStatus::ALL.to_vec())
    }

    proptest! {
        /// Whatever sequence of requests arrives, every history entry is an
        /// edge of the transition table and history length equals accepted changes.
        #[test]
        fn history_only_contains_table_edges(targets in prop::collection::vec(any_status(), 0..40)) {
            let mut order = new_order();
            let mut accepted = 0usize;

            for target in targets {
                let before = order.status;
                match step(&mut order, StatusChangeRequest::to(target).with_reason("because")) {
                    Ok(n) => accepted += n,
                    Err(_) => {
                        prop_assert_eq!(order.status, before);
                    }
                }
            }

            prop_assert_eq!(order.status_history.len(), accepted);
            let mut current = OrderStatus::Pending;
            for change in &order.status_history {
                prop_assert_eq!(change.from_status, current);
                prop_assert!(change.from_status.can_transition_to(change.to_status));
                current = change.to_status;
            }
            prop_assert_eq!(current, order.status);
        }
    }
}
