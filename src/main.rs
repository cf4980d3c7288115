use std::sync::Arc;

use kameo::Actor;
use rust_decimal::Decimal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use order_lifecycle::actors::{GetSystemHealth, HealthMonitorActor, ReservationExpiryActor};
use order_lifecycle::domain::inventory::{InMemoryStockLevels, InventoryItemId};
use order_lifecycle::domain::order::{OrderItem, OrderStatus, StatusChangeRequest};
use order_lifecycle::messaging::EventPublisher;
use order_lifecycle::{metrics, AppConfig, Services};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_lifecycle=debug"))
        )
        .init();

    tracing::info!("🚀 Starting Order Lifecycle Demo");

    let config = AppConfig::from_env()?;
    tracing::info!(?config, "Configuration loaded");

    // === 1. Stock levels and event transport ===
    let stock = Arc::new(InMemoryStockLevels::with_levels([
        ("SKU-WIDGET", 10),
        ("SKU-GADGET", 3),
    ]));
    let publisher = event_publisher(&config)?;

    // === 2. Command handler, ledger, dispatcher ===
    let services = Services::build(&config, stock, publisher)?;
    tracing::info!("📊 Metrics registry created with {} metrics", services.metrics.registry().gather().len());

    // === 3. Infrastructure actors ===
    let health = HealthMonitorActor::spawn(
        HealthMonitorActor::new(services.metrics.clone(), config.health_check_interval)
            .watching(services.dispatcher.clone()),
    );
    let _expiry = ReservationExpiryActor::spawn(
        ReservationExpiryActor::new(
            services.ledger.clone(),
            services.dispatcher.clone(),
            services.metrics.clone(),
            config.expiry_sweep_interval,
        )
        .reporting_to(health.clone()),
    );

    // Start metrics HTTP server in background thread
    let metrics_registry = Arc::new(services.metrics.registry().clone());
    let server_health = health.clone();
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let system = actix_web::rt::System::new();
        if let Err(e) = system.block_on(metrics::start_metrics_server(metrics_registry, server_health, metrics_port)) {
            tracing::error!("Metrics server error: {}", e);
        }
    });

    // === 4. Demonstrate the order lifecycle ===
    run_demo(&services).await?;

    let system_health = health
        .ask(GetSystemHealth)
        .await
        .map_err(|_| anyhow::anyhow!("Health monitor unreachable"))?;
    tracing::info!(status = ?system_health.overall_status, "System health");

    tracing::info!(
        widgets_available = services.ledger.available(&InventoryItemId::new("SKU-WIDGET")).await?,
        gadgets_available = services.ledger.available(&InventoryItemId::new("SKU-GADGET")).await?,
        dead_letters = services.dispatcher.dead_letters().await.len(),
        "🎉 Demo complete! Press Ctrl+C to exit"
    );

    tokio::signal::ctrl_c().await?;
    Ok(())
}

async fn run_demo(services: &Services) -> anyhow::Result<()> {
    let handler = &services.handler;
    let customer_id = Uuid::new_v4();

    // Happy path: reserve on confirm, consume on delivery
    let order = handler
        .create_order(
            customer_id,
            vec![
                OrderItem::new("SKU-WIDGET", 2, Decimal::new(1999, 2)),
                OrderItem::new("SKU-GADGET", 1, Decimal::new(4950, 2)),
            ],
        )
        .await?;
    tracing::info!("✅ Order created: {} ({})", order.order_number, order.id);

    for status in [OrderStatus::Confirmed, OrderStatus::Processing] {
        handler.update_status(order.id, status).await?;
    }
    handler
        .change_status(
            order.id,
            StatusChangeRequest::to(OrderStatus::Shipped)
                .with_tracking_number("1Z999AA10123456784")
                .by("warehouse"),
        )
        .await?;
    let delivered = handler.update_status(order.id, OrderStatus::Delivered).await?;
    tracing::info!("✅ Order delivered after {} transitions", delivered.status_history.len());

    // Not enough gadgets left: the confirmation is refused and nothing is held
    let greedy = handler
        .create_order(customer_id, vec![OrderItem::new("SKU-GADGET", 5, Decimal::new(4950, 2))])
        .await?;
    match handler.update_status(greedy.id, OrderStatus::Confirmed).await {
        Ok(_) => tracing::warn!("Unexpected confirmation of oversized order"),
        Err(e) => tracing::info!("⛔ Confirmation refused: {}", e),
    }

    // Cancellation returns held stock
    let cancelled = handler
        .create_order(customer_id, vec![OrderItem::new("SKU-WIDGET", 3, Decimal::new(1999, 2))])
        .await?;
    handler.update_status(cancelled.id, OrderStatus::Confirmed).await?;
    handler.cancel_order(cancelled.id, "Customer requested cancellation").await?;
    tracing::info!("✅ Order cancelled: {}", cancelled.id);

    Ok(())
}

#[cfg(feature = "redpanda")]
fn event_publisher(config: &AppConfig) -> anyhow::Result<Arc<dyn EventPublisher>> {
    tracing::info!("Publishing to Redpanda at {}", config.redpanda_brokers);
    Ok(Arc::new(order_lifecycle::messaging::RedpandaPublisher::new(&config.redpanda_brokers)?))
}

#[cfg(not(feature = "redpanda"))]
fn event_publisher(_config: &AppConfig) -> anyhow::Result<Arc<dyn EventPublisher>> {
    tracing::info!("Redpanda feature disabled, recording events in memory");
    Ok(Arc::new(order_lifecycle::messaging::InMemoryPublisher::new()))
}
