use super::value_objects::OrderStatus;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("A reason is required to cancel an order")]
    ReasonRequired,

    #[error("Order items cannot be empty")]
    EmptyItems,

    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: String, quantity: u32 },

    #[error("Unit price cannot be negative for product {0}")]
    NegativeUnitPrice(String),

    #[error("Order already exists")]
    AlreadyCreated,

    #[error("Aggregate not initialized")]
    NotInitialized,
}
