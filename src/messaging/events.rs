use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::inventory::{InventoryItemId, Reservation, ReservationId};
use crate::domain::order::{OrderAggregate, OrderItem, OrderStatus, OrderStatusChanged};

// ============================================================================
// Lifecycle Events - what other services are told
// ============================================================================
//
// Immutable records, one variant per kind. Order events are keyed by order id
// and go to `order-events`; inventory events are keyed by the owning order id
// and go to `inventory-events`, so a consumer sees one order's facts in order.
//
// ============================================================================

pub const ORDER_EVENTS_TOPIC: &str = "order-events";
pub const INVENTORY_EVENTS_TOPIC: &str = "inventory-events";

/// Payment state reported alongside a refund; reversal itself happens downstream.
pub const REFUND_PENDING: &str = "REFUND_PENDING";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LifecycleEvent {
    OrderCreated(OrderCreatedEvent),
    OrderConfirmed(OrderConfirmedEvent),
    OrderShipped(OrderShippedEvent),
    OrderDelivered(OrderDeliveredEvent),
    OrderCancelled(OrderCancelledEvent),
    OrderUpdated(OrderUpdatedEvent),
    InventoryReserved(InventoryReservedEvent),
    InventoryReleased(InventoryReleasedEvent),
    InventoryConsumed(InventoryConsumedEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedEvent {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub total_amount: Decimal,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmedEvent {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderShippedEvent {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDeliveredEvent {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCancelledEvent {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdatedEvent {
    pub id: Uuid,
    pub order_number: String,
    pub status: Option<OrderStatus>,
    pub payment_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryReservedEvent {
    pub reservation_id: ReservationId,
    pub inventory_item_id: InventoryItemId,
    pub order_id: Uuid,
    pub quantity: u32,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryReleasedEvent {
    pub reservation_id: ReservationId,
    pub inventory_item_id: InventoryItemId,
    pub order_id: Uuid,
    pub quantity: u32,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryConsumedEvent {
    pub reservation_id: ReservationId,
    pub inventory_item_id: InventoryItemId,
    pub order_id: Uuid,
    pub quantity: u32,
}

impl LifecycleEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            LifecycleEvent::OrderCreated(_) => "OrderCreatedEvent",
            LifecycleEvent::OrderConfirmed(_) => "OrderConfirmedEvent",
            LifecycleEvent::OrderShipped(_) => "OrderShippedEvent",
            LifecycleEvent::OrderDelivered(_) => "OrderDeliveredEvent",
            LifecycleEvent::OrderCancelled(_) => "OrderCancelledEvent",
            LifecycleEvent::OrderUpdated(_) => "OrderUpdatedEvent",
            LifecycleEvent::InventoryReserved(_) => "InventoryReservedEvent",
            LifecycleEvent::InventoryReleased(_) => "InventoryReleasedEvent",
            LifecycleEvent::InventoryConsumed(_) => "InventoryConsumedEvent",
        }
    }

    /// Partition key: the order the event belongs to.
    pub fn order_id(&self) -> Uuid {
        match self {
            LifecycleEvent::OrderCreated(e) => e.id,
            LifecycleEvent::OrderConfirmed(e) => e.id,
            LifecycleEvent::OrderShipped(e) => e.id,
            LifecycleEvent::OrderDelivered(e) => e.id,
            LifecycleEvent::OrderCancelled(e) => e.id,
            LifecycleEvent::OrderUpdated(e) => e.id,
            LifecycleEvent::InventoryReserved(e) => e.order_id,
            LifecycleEvent::InventoryReleased(e) => e.order_id,
            LifecycleEvent::InventoryConsumed(e) => e.order_id,
        }
    }

    pub fn topic(&self) -> &'static str {
        match self {
            LifecycleEvent::InventoryReserved(_)
            | LifecycleEvent::InventoryReleased(_)
            | LifecycleEvent::InventoryConsumed(_) => INVENTORY_EVENTS_TOPIC,
            _ => ORDER_EVENTS_TOPIC,
        }
    }

    pub fn order_created(order: &OrderAggregate) -> Self {
        LifecycleEvent::OrderCreated(OrderCreatedEvent {
            id: order.id,
            order_number: order.order_number.clone(),
            customer_id: order.customer_id,
            total_amount: order.total_amount,
            items: order.items.clone(),
        })
    }

    /// The event announcing an accepted transition. `order` is the state after it.
    pub fn for_transition(order: &OrderAggregate, change: &OrderStatusChanged) -> Self {
        let id = order.id;
        let order_number = order.order_number.clone();
        let customer_id = order.customer_id;

        match change.to {
            OrderStatus::Confirmed => LifecycleEvent::OrderConfirmed(OrderConfirmedEvent {
                id,
                order_number,
                customer_id,
            }),
            OrderStatus::Shipped => LifecycleEvent::OrderShipped(OrderShippedEvent {
                id,
                order_number,
                customer_id,
                tracking_number: change.tracking_number.clone(),
            }),
            OrderStatus::Delivered => LifecycleEvent::OrderDelivered(OrderDeliveredEvent {
                id,
                order_number,
                customer_id,
            }),
            OrderStatus::Cancelled => LifecycleEvent::OrderCancelled(OrderCancelledEvent {
                id,
                order_number,
                customer_id,
                reason: change.reason.clone(),
            }),
            OrderStatus::Refunded => LifecycleEvent::OrderUpdated(OrderUpdatedEvent {
                id,
                order_number,
                status: Some(OrderStatus::Refunded),
                payment_status: Some(REFUND_PENDING.to_string()),
            }),
            status => LifecycleEvent::OrderUpdated(OrderUpdatedEvent {
                id,
                order_number,
                status: Some(status),
                payment_status: None,
            }),
        }
    }

    pub fn inventory_reserved(reservation: &Reservation) -> Self {
        LifecycleEvent::InventoryReserved(InventoryReservedEvent {
            reservation_id: reservation.id,
            inventory_item_id: reservation.inventory_item_id.clone(),
            order_id: reservation.order_id,
            quantity: reservation.quantity,
            expires_at: reservation.expires_at,
        })
    }

    pub fn inventory_released(reservation: &Reservation) -> Self {
        LifecycleEvent::InventoryReleased(InventoryReleasedEvent {
            reservation_id: reservation.id,
            inventory_item_id: reservation.inventory_item_id.clone(),
            order_id: reservation.order_id,
            quantity: reservation.quantity,
            reason: reservation.release_reason.clone().unwrap_or_default(),
        })
    }

    pub fn inventory_consumed(reservation: &Reservation) -> Self {
        LifecycleEvent::InventoryConsumed(InventoryConsumedEvent {
            reservation_id: reservation.id,
            inventory_item_id: reservation.inventory_item_id.clone(),
            order_id: reservation.order_id,
            quantity: reservation.quantity,
        })
    }
}
