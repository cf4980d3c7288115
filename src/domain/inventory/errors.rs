use super::value_objects::{InventoryItemId, ReservationId};

// ============================================================================
// Reservation Ledger Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Insufficient stock for {item}: requested {requested}, available {available}")]
    InsufficientStock {
        item: InventoryItemId,
        requested: u32,
        available: u32,
    },

    #[error("Reservation not found: {0}")]
    ReservationNotFound(ReservationId),

    #[error("Unknown inventory item: {0}")]
    UnknownItem(InventoryItemId),

    #[error("Reservation quantity must be positive (item {0})")]
    InvalidQuantity(InventoryItemId),

    #[error("Reservation storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}
