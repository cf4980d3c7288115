// ============================================================================
// Infrastructure Actors
// ============================================================================
//
// - Health monitoring
// - Reservation expiry sweeps
//
// ============================================================================

mod health_monitor;
mod expiry_sweeper;

pub use health_monitor::{
    GetSystemHealth, HealthMonitorActor, SystemHealth, UpdateHealth, EVENT_BUS_COMPONENT,
};
pub use expiry_sweeper::{ReservationExpiryActor, SweepNow, SweepReport, EXPIRY_COMPONENT};
