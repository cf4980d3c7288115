// ============================================================================
// Order Domain - Order Lifecycle State Machine
// ============================================================================
//
// - Value objects (OrderItem, OrderStatus and its transition table)
// - Events (OrderCreated, OrderStatusChanged)
// - Commands (CreateOrder, ChangeStatus)
// - Errors (OrderError enum)
// - Aggregate (OrderAggregate with business logic)
// - Command Handler (OrderCommandHandler, couples orders to the ledger)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;

// Re-export for convenience
pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;
