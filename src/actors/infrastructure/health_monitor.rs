use kameo::Actor;
use kameo::message::{Context, Message};
use kameo::actor::ActorRef;
use kameo::error::Infallible;
use kameo::reply::{Reply, ReplyError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use crate::actors::core::{ComponentHealth, HealthStatus};
use crate::messaging::EventDispatcher;
use crate::metrics::Metrics;

// ============================================================================
// Health Monitor Actor - Monitors system health
// ============================================================================
//
// Responsibilities:
// - Track health status of all components
// - Poll the event bus circuit breaker and dead letter queue
// - Aggregate system-wide health
//
// ============================================================================

pub const EVENT_BUS_COMPONENT: &str = "event-bus";

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug)]
pub struct UpdateHealth {
    pub component: String,
    pub status: HealthStatus,
    pub details: Option<String>,
}

#[derive(Debug)]
pub struct GetSystemHealth;

#[derive(Debug, Clone)]
pub struct SystemHealth {
    pub overall_status: HealthStatus,
    pub components: HashMap<String, ComponentHealth>,
    pub check_time: chrono::DateTime<Utc>,
}

// Implement Reply for SystemHealth to use it as a message reply type
impl Reply for SystemHealth {
    type Ok = Self;
    type Error = Infallible;
    type Value = Self;

    fn to_result(self) -> Result<Self, Infallible> {
        Ok(self)
    }

    fn into_any_err(self) -> Option<Box<dyn ReplyError>> {
        None
    }

    fn into_value(self) -> Self::Value {
        self
    }
}

// ============================================================================
// Health Monitor Actor
// ============================================================================

pub struct HealthMonitorActor {
    components: HashMap<String, ComponentHealth>,
    dispatcher: Option<Arc<EventDispatcher>>,
    metrics: Arc<Metrics>,
    check_interval: Duration,
}

impl HealthMonitorActor {
    pub fn new(metrics: Arc<Metrics>, check_interval: Duration) -> Self {
        Self {
            components: HashMap::new(),
            dispatcher: None,
            metrics,
            check_interval,
        }
    }

    /// Poll this dispatcher's circuit breaker and dead letter queue
    pub fn watching(mut self, dispatcher: Arc<EventDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    fn compute_overall_status(&self) -> HealthStatus {
        let mut has_degraded = false;
        let mut unhealthy_components = Vec::new();

        for (name, health) in &self.components {
            match &health.status {
                HealthStatus::Unhealthy(msg) => {
                    unhealthy_components.push(format!("{}: {}", name, msg));
                }
                HealthStatus::Degraded(_) => {
                    has_degraded = true;
                }
                HealthStatus::Healthy => {}
            }
        }

        if !unhealthy_components.is_empty() {
            unhealthy_components.sort();
            HealthStatus::Unhealthy(unhealthy_components.join(", "))
        } else if has_degraded {
            HealthStatus::Degraded("Some components degraded".to_string())
        } else {
            HealthStatus::Healthy
        }
    }
}

async fn event_bus_health(dispatcher: &EventDispatcher) -> UpdateHealth {
    let parked = dispatcher.dead_letters().await.len();
    let status = match HealthStatus::from(dispatcher.circuit_state().await) {
        HealthStatus::Healthy if parked > 0 => {
            HealthStatus::Degraded(format!("{} events in dead letter queue", parked))
        }
        status => status,
    };

    UpdateHealth {
        component: EVENT_BUS_COMPONENT.to_string(),
        status,
        details: Some(format!("dead_letters={}", parked)),
    }
}

impl Actor for HealthMonitorActor {
    type Args = Self;
    type Error = Infallible;

    async fn on_start(
        state: Self::Args,
        actor_ref: ActorRef<Self>
    ) -> Result<Self, Self::Error> {
        tracing::info!("HealthMonitorActor started");

        let Some(dispatcher) = state.dispatcher.clone() else {
            return Ok(state);
        };
        let period = state.check_interval;

        // Schedule periodic health checks
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;

                let update = event_bus_health(&dispatcher).await;
                if actor_ref.tell(update).send().await.is_err() {
                    break;
                }
            }
        });

        Ok(state)
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Message<UpdateHealth> for HealthMonitorActor {
    type Reply = ();

    async fn handle(&mut self, msg: UpdateHealth, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        tracing::debug!(
            component = %msg.component,
            status = ?msg.status,
            "Updated component health"
        );

        if let HealthStatus::Unhealthy(reason) = &msg.status {
            tracing::warn!(component = %msg.component, reason = %reason, "Component unhealthy");
        }

        let health = ComponentHealth::new(msg.component.clone(), msg.status).with_details(msg.details);
        self.components.insert(msg.component, health);

        self.metrics
            .system_health_status
            .set(self.compute_overall_status().as_gauge());
    }
}

impl Message<GetSystemHealth> for HealthMonitorActor {
    type Reply = SystemHealth;

    async fn handle(&mut self, _msg: GetSystemHealth, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        SystemHealth {
            overall_status: self.compute_overall_status(),
            components: self.components.clone(),
            check_time: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{InMemoryPublisher, LifecycleEvent, OrderUpdatedEvent};

    fn metrics() -> Arc<Metrics> {
        Arc::new(Metrics::new().unwrap())
    }

    #[tokio::test]
    async fn test_overall_status_is_worst_component() {
        let monitor = HealthMonitorActor::spawn(HealthMonitorActor::new(metrics(), Duration::from_secs(60)));

        monitor
            .tell(UpdateHealth {
                component: "ledger".to_string(),
                status: HealthStatus::Healthy,
                details: None,
            })
            .send()
            .await
            .unwrap();
        monitor
            .tell(UpdateHealth {
                component: "expiry".to_string(),
                status: HealthStatus::Degraded("slow".to_string()),
                details: None,
            })
            .send()
            .await
            .unwrap();

        let health = monitor.ask(GetSystemHealth).await.unwrap();
        assert_eq!(health.components.len(), 2);
        assert!(matches!(health.overall_status, HealthStatus::Degraded(_)));
    }

    #[tokio::test]
    async fn test_dead_letters_degrade_event_bus() {
        let publisher = Arc::new(InMemoryPublisher::new());
        let dispatcher = EventDispatcher::new(publisher.clone(), metrics())
            .with_retry(crate::utils::RetryConfig {
                max_attempts: 1,
                ..Default::default()
            });
        publisher.fail_next(1);
        dispatcher
            .publish(LifecycleEvent::OrderUpdated(OrderUpdatedEvent {
                id: uuid::Uuid::new_v4(),
                order_number: "ORD-20260101-00000000".to_string(),
                status: None,
                payment_status: None,
            }))
            .await;

        let update = event_bus_health(&dispatcher).await;

        assert_eq!(update.component, EVENT_BUS_COMPONENT);
        assert!(matches!(update.status, HealthStatus::Degraded(_)));
    }
}
