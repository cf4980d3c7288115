// ============================================================================
// Inventory Domain - Reservation Ledger
// ============================================================================
//
// - Value objects (InventoryItemId, Reservation, ReservationStatus)
// - Errors (LedgerError)
// - Collaborators (StockLevels, ReservationStore) with in-memory versions
// - Ledger (ReservationLedger)
//
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod stock;
pub mod store;
pub mod ledger;

pub use value_objects::*;
pub use errors::*;
pub use stock::{InMemoryStockLevels, StockLevels};
pub use store::{InMemoryReservationStore, ReservationStore};
pub use ledger::{ReservationLedger, Settlement};
