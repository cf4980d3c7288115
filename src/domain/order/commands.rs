use uuid::Uuid;
use super::value_objects::{OrderItem, OrderStatus};

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

#[derive(Debug, Clone)]
pub enum OrderCommand {
    CreateOrder {
        customer_id: Uuid,
        items: Vec<OrderItem>,
    },
    ChangeStatus(StatusChangeRequest),
}

/// A request to move an order to `target`
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChangeRequest {
    pub target: OrderStatus,
    pub reason: Option<String>,
    pub actor: Option<String>,
    pub tracking_number: Option<String>,
}

impl StatusChangeRequest {
    pub fn to(target: OrderStatus) -> Self {
        Self {
            target,
            reason: None,
            actor: None,
            tracking_number: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn by(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_tracking_number(mut self, tracking_number: impl Into<String>) -> Self {
        self.tracking_number = Some(tracking_number.into());
        self
    }
}
