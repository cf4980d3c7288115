use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Order Value Objects
// ============================================================================

/// Catalog product reference. Inventory is tracked per product, so the same
/// value identifies the inventory item a line reserves against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl OrderItem {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32, unit_price: Decimal) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            unit_price,
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Order lifecycle status.
///
/// The transition table lives here and nowhere else:
///
/// ```text
/// PENDING    -> CONFIRMED | CANCELLED
/// CONFIRMED  -> PROCESSING | CANCELLED
/// PROCESSING -> SHIPPED | CANCELLED
/// SHIPPED    -> DELIVERED | CANCELLED
/// DELIVERED  -> REFUNDED
/// CANCELLED  -> REFUNDED
/// REFUNDED   -> (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    pub fn allowed_transitions(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Processing, Cancelled],
            Processing => &[Shipped, Cancelled],
            Shipped => &[Delivered, Cancelled],
            Delivered => &[Refunded],
            Cancelled => &[Refunded],
            Refunded => &[],
        }
    }

    pub fn can_transition_to(self, target: OrderStatus) -> bool {
        self.allowed_transitions().contains(&target)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One accepted transition, as recorded in the order's status history
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub from_status: OrderStatus,
    pub to_status: OrderStatus,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub actor: Option<String>,
}

/// Human readable order number, e.g. `ORD-20261019-1A2B3C4D`
pub fn order_number_for(order_id: Uuid, created_at: DateTime<Utc>) -> String {
    let suffix = order_id.simple().to_string()[..8].to_uppercase();
    format!("ORD-{}-{}", created_at.format("%Y%m%d"), suffix)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::collections::{HashSet, VecDeque};

    #[test]
    fn test_line_total() {
        let item = OrderItem::new("P1", 5, dec!(10.00));
        assert_eq!(item.line_total(), dec!(50.00));
    }

    #[test]
    fn test_order_item_wire_format() {
        let item = OrderItem::new("P1", 5, dec!(10.00));
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["productId"], "P1");
        assert_eq!(json["quantity"], 5);
        assert_eq!(json["unitPrice"], "10.00");
    }

    #[test]
    fn test_status_serializes_screaming_case() {
        let json = serde_json::to_string(&OrderStatus::Processing).unwrap();
        assert_eq!(json, "\"PROCESSING\"");
        let parsed: OrderStatus = serde_json::from_str("\"REFUNDED\"").unwrap();
        assert_eq!(parsed, OrderStatus::Refunded);
    }

    #[test]
    fn test_transition_table() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Cancelled));
        assert!(Cancelled.can_transition_to(Refunded));
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(Refunded.is_terminal());
        assert!(OrderStatus::ALL.iter().filter(|s| s.is_terminal()).eq([Refunded].iter()));
    }

    #[test]
    fn test_every_status_reachable_from_pending() {
        let mut seen = HashSet::from([OrderStatus::Pending]);
        let mut queue = VecDeque::from([OrderStatus::Pending]);
        while let Some(status) = queue.pop_front() {
            for next in status.allowed_transitions() {
                if seen.insert(*next) {
                    queue.push_back(*next);
                }
            }
        }
        assert_eq!(seen.len(), OrderStatus::ALL.len());
    }

    #[test]
    fn test_no_transition_returns_to_pending() {
        assert!(OrderStatus::ALL.iter().all(|s| !s.can_transition_to(OrderStatus::Pending)));
    }

    #[test]
    fn test_order_number_format() {
        let id = Uuid::parse_str("1a2b3c4d-0000-4000-8000-000000000000").unwrap();
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap();
        assert_eq!(order_number_for(id, at), "ORD-20261019-1A2B3C4D");
    }
}
