use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use kameo::actor::ActorRef;
use prometheus::{Encoder, Registry, TextEncoder};
use std::sync::Arc;

use crate::actors::{GetSystemHealth, HealthMonitorActor, HealthStatus};

/// Start the metrics HTTP server
/// This should be called in a separate thread/runtime to avoid conflicts
pub async fn start_metrics_server(
    registry: Arc<Registry>,
    health: ActorRef<HealthMonitorActor>,
    port: u16,
) -> std::io::Result<()> {
    tracing::info!("📊 Starting metrics server on http://0.0.0.0:{}/metrics", port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(registry.clone()))
            .app_data(web::Data::new(health.clone()))
            .route("/metrics", web::get().to(metrics_handler))
            .route("/health", web::get().to(health_handler))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

async fn metrics_handler(registry: web::Data<Arc<Registry>>) -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

async fn health_handler(health: web::Data<ActorRef<HealthMonitorActor>>) -> impl Responder {
    let system = match health.ask(GetSystemHealth).await {
        Ok(system) => system,
        Err(_) => {
            tracing::error!("Health monitor unreachable");
            return HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "status": "unknown",
                "service": "order-lifecycle"
            }));
        }
    };

    let (status, detail) = match &system.overall_status {
        HealthStatus::Healthy => ("healthy", None),
        HealthStatus::Degraded(reason) => ("degraded", Some(reason.clone())),
        HealthStatus::Unhealthy(reason) => ("unhealthy", Some(reason.clone())),
    };
    let components: serde_json::Map<String, serde_json::Value> = system
        .components
        .iter()
        .map(|(name, c)| (name.clone(), serde_json::json!(format!("{:?}", c.status))))
        .collect();
    let body = serde_json::json!({
        "status": status,
        "detail": detail,
        "service": "order-lifecycle",
        "components": components,
        "checked_at": system.check_time,
    });

    if system.overall_status.is_unhealthy() {
        HttpResponse::ServiceUnavailable().json(body)
    } else {
        HttpResponse::Ok().json(body)
    }
}
