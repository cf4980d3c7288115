// ============================================================================
// Actors Module
// ============================================================================
//
// Actor-based infrastructure for periodic and supervisory work.
//
// Structure:
// - core/           - Health types shared by actors
// - infrastructure/ - Health monitor, reservation expiry sweeper
//
// Note: Order and inventory logic runs in the command handler and ledger,
//       NOT in actors. Actors are reserved for infrastructure concerns only.
//
// ============================================================================

mod core;
mod infrastructure;

pub use self::core::{ComponentHealth, HealthStatus};
pub use infrastructure::{
    GetSystemHealth, HealthMonitorActor, ReservationExpiryActor, SweepNow, SweepReport,
    SystemHealth, UpdateHealth, EVENT_BUS_COMPONENT, EXPIRY_COMPONENT,
};
