use kameo::Actor;
use kameo::message::{Context, Message};
use kameo::actor::ActorRef;
use kameo::error::Infallible;
use kameo::reply::{Reply, ReplyError};
use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use crate::actors::core::HealthStatus;
use crate::domain::inventory::ReservationLedger;
use crate::messaging::{EventDispatcher, LifecycleEvent};
use crate::metrics::Metrics;
use super::health_monitor::{HealthMonitorActor, UpdateHealth};

// ============================================================================
// Reservation Expiry Actor - releases reservations past their deadline
// ============================================================================
//
// Every sweep interval it asks the ledger to expire stale reservations and
// announces each release. Sweeps can also be requested directly.
//
// ============================================================================

pub const EXPIRY_COMPONENT: &str = "reservation-expiry";

#[derive(Debug)]
pub struct SweepNow;

#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub expired: usize,
    pub error: Option<String>,
}

impl Reply for SweepReport {
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

pub struct ReservationExpiryActor {
    ledger: Arc<ReservationLedger>,
    dispatcher: Arc<EventDispatcher>,
    metrics: Arc<Metrics>,
    sweep_interval: Duration,
    health: Option<ActorRef<HealthMonitorActor>>,
}

impl ReservationExpiryActor {
    pub fn new(
        ledger: Arc<ReservationLedger>,
        dispatcher: Arc<EventDispatcher>,
        metrics: Arc<Metrics>,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            ledger,
            dispatcher,
            metrics,
            sweep_interval,
            health: None,
        }
    }

    pub fn reporting_to(mut self, health: ActorRef<HealthMonitorActor>) -> Self {
        self.health = Some(health);
        self
    }

    async fn report(&self, status: HealthStatus) {
        if let Some(health) = &self.health {
            let _ = health
                .tell(UpdateHealth {
                    component: EXPIRY_COMPONENT.to_string(),
                    status,
                    details: None,
                })
                .send()
                .await;
        }
    }
}

impl Actor for ReservationExpiryActor {
    type Args = Self;
    type Error = Infallible;

    async fn on_start(
        state: Self::Args,
        actor_ref: ActorRef<Self>
    ) -> Result<Self, Self::Error> {
        tracing::info!(
            interval_secs = state.sweep_interval.as_secs(),
            "ReservationExpiryActor started"
        );

        let period = state.sweep_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                if actor_ref.tell(SweepNow).send().await.is_err() {
                    break;
                }
            }
        });

        Ok(state)
    }
}

impl Message<SweepNow> for ReservationExpiryActor {
    type Reply = SweepReport;

    async fn handle(&mut self, _msg: SweepNow, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        let settlement = self.ledger.expire_stale(Utc::now()).await;
        let expired = settlement.settled;

        // Whatever was released before a failure is still announced.
        self.metrics.record_reservations("expired", expired.len());
        self.dispatcher
            .publish_all(expired.iter().map(LifecycleEvent::inventory_released).collect())
            .await;

        let error = settlement.error.map(|e| e.to_string());
        match &error {
            Some(e) => {
                tracing::error!(error = %e, released = expired.len(), "Reservation expiry sweep failed");
                self.report(HealthStatus::Degraded(e.clone())).await;
            }
            None => self.report(HealthStatus::Healthy).await,
        }

        SweepReport {
            expired: expired.len(),
            error,
        }
    }
}
