use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event_sourcing::core::DomainEvent;
use super::value_objects::{OrderItem, OrderStatus};

// ============================================================================
// Order Events - Domain Events for Order Aggregate
// ============================================================================
//
// These are the persisted facts the aggregate is rebuilt from. The events
// published to other services are derived from them (see crate::messaging).
//
// ============================================================================

/// Order Event - Union type for all order events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    Created(OrderCreated),
    StatusChanged(OrderStatusChanged),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Created(_) => "OrderCreated",
            OrderEvent::StatusChanged(_) => "OrderStatusChanged",
        }
    }
}

// ============================================================================
// Individual Event Types
// ============================================================================

/// Order Created - Initial event in order lifecycle
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderCreated {
    pub order_number: String,
    pub customer_id: Uuid,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Order Status Changed - one accepted transition of the state machine
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderStatusChanged {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub reason: Option<String>,
    pub actor: Option<String>,
    pub tracking_number: Option<String>,
    pub changed_at: DateTime<Utc>,
}
