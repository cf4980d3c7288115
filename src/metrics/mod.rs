// Private module declaration
mod server;

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec,
    IntGauge, Opts, Registry,
};

use crate::utils::CircuitState;

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Order transitions and rejected commands
// - Inventory reservations by outcome
// - Event publication, retries and the Dead Letter Queue
// - Circuit breaker state
// - Component health
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Order Metrics
    pub orders_created: IntCounter,
    pub order_transitions: IntCounterVec,
    pub commands_rejected: IntCounterVec,
    pub command_duration: HistogramVec,

    // Inventory Metrics
    pub reservations: IntCounterVec,

    // Publication Metrics
    pub events_published: IntCounterVec,
    pub events_failed: IntCounterVec,
    pub publish_retries: IntCounterVec,

    // DLQ Metrics
    pub dlq_messages_total: IntCounter,
    pub dlq_size: IntGauge,

    // Circuit Breaker Metrics
    pub circuit_breaker_state: IntGauge,

    // Health
    pub system_health_status: IntGauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Order Metrics
        let orders_created = IntCounter::new("orders_created_total", "Total orders created")?;
        registry.register(Box::new(orders_created.clone()))?;

        let order_transitions = IntCounterVec::new(
            Opts::new("order_transitions_total", "Accepted order status transitions"),
            &["from", "to"],
        )?;
        registry.register(Box::new(order_transitions.clone()))?;

        let commands_rejected = IntCounterVec::new(
            Opts::new("order_commands_rejected_total", "Rejected order commands by reason"),
            &["reason"],
        )?;
        registry.register(Box::new(commands_rejected.clone()))?;

        let command_duration = HistogramVec::new(
            HistogramOpts::new("order_command_duration_seconds", "Order command handling duration")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["command"],
        )?;
        registry.register(Box::new(command_duration.clone()))?;

        // Inventory Metrics
        let reservations = IntCounterVec::new(
            Opts::new("inventory_reservations_total", "Reservation decisions by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(reservations.clone()))?;

        // Publication Metrics
        let events_published = IntCounterVec::new(
            Opts::new("events_published_total", "Lifecycle events delivered to the bus"),
            &["event_type"],
        )?;
        registry.register(Box::new(events_published.clone()))?;

        let events_failed = IntCounterVec::new(
            Opts::new("events_failed_total", "Lifecycle events that could not be delivered"),
            &["event_type"],
        )?;
        registry.register(Box::new(events_failed.clone()))?;

        let publish_retries = IntCounterVec::new(
            Opts::new("publish_retries_total", "Publish attempts after the first"),
            &["event_type"],
        )?;
        registry.register(Box::new(publish_retries.clone()))?;

        // DLQ Metrics
        let dlq_messages_total = IntCounter::new(
            "dlq_messages_total",
            "Total messages sent to the dead letter queue",
        )?;
        registry.register(Box::new(dlq_messages_total.clone()))?;

        let dlq_size = IntGauge::new("dlq_size", "Messages currently in the dead letter queue")?;
        registry.register(Box::new(dlq_size.clone()))?;

        // Circuit Breaker Metrics
        let circuit_breaker_state = IntGauge::new(
            "circuit_breaker_state",
            "Circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        let system_health_status = IntGauge::new(
            "system_health_status",
            "Overall health (0=Unhealthy, 1=Degraded, 2=Healthy)",
        )?;
        registry.register(Box::new(system_health_status.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            order_transitions,
            commands_rejected,
            command_duration,
            reservations,
            events_published,
            events_failed,
            publish_retries,
            dlq_messages_total,
            dlq_size,
            circuit_breaker_state,
            system_health_status,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_transition(&self, from: &str, to: &str) {
        self.order_transitions.with_label_values(&[from, to]).inc();
    }

    pub fn record_rejection(&self, reason: &str) {
        self.commands_rejected.with_label_values(&[reason]).inc();
    }

    pub fn observe_command(&self, command: &str, duration_secs: f64) {
        self.command_duration.with_label_values(&[command]).observe(duration_secs);
    }

    /// Count `n` reservation decisions with the same outcome
    pub fn record_reservations(&self, outcome: &str, n: usize) {
        self.reservations.with_label_values(&[outcome]).inc_by(n as u64);
    }

    pub fn record_publish(&self, event_type: &str, success: bool) {
        if success {
            self.events_published.with_label_values(&[event_type]).inc();
        } else {
            self.events_failed.with_label_values(&[event_type]).inc();
        }
    }

    pub fn record_publish_retry(&self, event_type: &str) {
        self.publish_retries.with_label_values(&[event_type]).inc();
    }

    pub fn record_dlq_message(&self, dlq_size: usize) {
        self.dlq_messages_total.inc();
        self.dlq_size.set(dlq_size as i64);
    }

    pub fn update_circuit_breaker_state(&self, state: CircuitState) {
        self.circuit_breaker_state.set(state.as_gauge());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert!(!metrics.registry.gather().is_empty());
    }

    #[test]
    fn test_record_transition() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transition("PENDING", "CONFIRMED");
        metrics.record_transition("PENDING", "CONFIRMED");
        metrics.record_transition("CONFIRMED", "CANCELLED");

        let gathered = metrics.registry.gather();
        let transitions = gathered.iter().find(|m| m.name() == "order_transitions_total").unwrap();
        assert_eq!(transitions.metric.len(), 2);
    }

    #[test]
    fn test_record_dlq_message() {
        let metrics = Metrics::new().unwrap();
        metrics.record_dlq_message(1);
        metrics.record_dlq_message(2);

        let gathered = metrics.registry.gather();
        let dlq_total = gathered.iter().find(|m| m.name() == "dlq_messages_total").unwrap();
        assert_eq!(dlq_total.metric[0].counter.value, Some(2.0));
        let dlq_size = gathered.iter().find(|m| m.name() == "dlq_size").unwrap();
        assert_eq!(dlq_size.metric[0].gauge.value, Some(2.0));
    }

    #[test]
    fn test_circuit_breaker_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.update_circuit_breaker_state(CircuitState::Open);

        let gathered = metrics.registry.gather();
        let state = gathered.iter().find(|m| m.name() == "circuit_breaker_state").unwrap();
        assert_eq!(state.metric[0].gauge.value, Some(1.0));
    }
}
