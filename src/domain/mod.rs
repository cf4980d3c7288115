// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// order      Order lifecycle state machine and its command handler
// inventory  Reservation ledger guarding on-hand stock
//
// The two only meet in the order command handler.
//
// ============================================================================

pub mod order;
pub mod inventory;
