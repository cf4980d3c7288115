use std::sync::Arc;

use order_lifecycle::domain::inventory::{InMemoryStockLevels, InventoryItemId, ReservationStatus};
use order_lifecycle::domain::order::{
    CommandError, OrderAggregate, OrderItem, OrderStatus, StatusChangeRequest,
};
use order_lifecycle::domain::inventory::LedgerError;
use order_lifecycle::messaging::{InMemoryPublisher, LifecycleEvent};
use order_lifecycle::{AppConfig, Services};
use rust_decimal_macros::dec;
use uuid::Uuid;

struct TestApp {
    services: Services,
    publisher: Arc<InMemoryPublisher>,
}

fn app(levels: &[(&str, u32)]) -> TestApp {
    let stock = Arc::new(InMemoryStockLevels::with_levels(levels.iter().copied()));
    let publisher = Arc::new(InMemoryPublisher::new());
    let services = Services::build(&AppConfig::default(), stock, publisher.clone()).unwrap();
    TestApp { services, publisher }
}

impl TestApp {
    async fn order(&self, product: &str, quantity: u32) -> OrderAggregate {
        self.services
            .handler
            .create_order(Uuid::new_v4(), vec![OrderItem::new(product, quantity, dec!(12.50))])
            .await
            .unwrap()
    }

    async fn available(&self, item: &str) -> u32 {
        self.services.ledger.available(&InventoryItemId::new(item)).await.unwrap()
    }
}

#[tokio::test]
async fn confirm_reserves_stock_and_repeat_is_a_no_op() {
    let app = app(&[("P1", 5)]);
    let order = app.order("P1", 5).await;
    app.publisher.clear().await;

    let confirmed = app
        .services
        .handler
        .update_status(order.id, OrderStatus::Confirmed)
        .await
        .unwrap();

    assert_eq!(confirmed.status, OrderStatus::Confirmed);
    assert_eq!(app.available("P1").await, 0);
    let reservations = app.services.ledger.reservations_for_order(order.id).await.unwrap();
    assert_eq!(reservations.len(), 1);
    assert_eq!(reservations[0].quantity, 5);
    assert_eq!(reservations[0].status, ReservationStatus::Active);
    let published = app.publisher.published_types().await;
    assert_eq!(published, vec!["OrderConfirmedEvent", "InventoryReservedEvent"]);

    let again = app
        .services
        .handler
        .update_status(order.id, OrderStatus::Confirmed)
        .await
        .unwrap();

    assert_eq!(again.status_history.len(), 1);
    assert_eq!(again.version, confirmed.version);
    assert_eq!(app.services.ledger.reservations_for_order(order.id).await.unwrap().len(), 1);
    assert_eq!(app.publisher.published().await.len(), 2);
}

#[tokio::test]
async fn insufficient_stock_leaves_order_pending() {
    let app = app(&[("P1", 3)]);
    let order = app.order("P1", 5).await;
    app.publisher.clear().await;

    let err = app
        .services
        .handler
        .update_status(order.id, OrderStatus::Confirmed)
        .await
        .unwrap_err();

    match err {
        CommandError::ReservationFailure {
            order_id,
            source: LedgerError::InsufficientStock { requested, available, .. },
        } => {
            assert_eq!(order_id, order.id);
            assert_eq!(requested, 5);
            assert_eq!(available, 3);
        }
        other => panic!("unexpected error {:?}", other),
    }

    let reloaded = app.services.handler.get_order(order.id).await.unwrap();
    assert_eq!(reloaded.status, OrderStatus::Pending);
    assert!(reloaded.status_history.is_empty());
    assert!(app.services.ledger.reservations_for_order(order.id).await.unwrap().is_empty());
    assert_eq!(app.available("P1").await, 3);
    assert!(app.publisher.published().await.is_empty());
}

#[tokio::test]
async fn partial_reservation_is_rolled_back() {
    let app = app(&[("P1", 10), ("P2", 1)]);
    let order = app
        .services
        .handler
        .create_order(
            Uuid::new_v4(),
            vec![OrderItem::new("P1", 4, dec!(1)), OrderItem::new("P2", 2, dec!(1))],
        )
        .await
        .unwrap();

    let err = app
        .services
        .handler
        .update_status(order.id, OrderStatus::Confirmed)
        .await
        .unwrap_err();

    assert!(matches!(err, CommandError::ReservationFailure { .. }));
    assert_eq!(app.available("P1").await, 10);
    assert!(app.services.ledger.reservations_for_order(order.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn cancel_from_shipped_releases_reservations() {
    let app = app(&[("P1", 5)]);
    let order = app.order("P1", 2).await;
    for status in [OrderStatus::Confirmed, OrderStatus::Processing, OrderStatus::Shipped] {
        app.services.handler.update_status(order.id, status).await.unwrap();
    }
    assert_eq!(app.available("P1").await, 3);
    app.publisher.clear().await;

    let cancelled = app
        .services
        .handler
        .cancel_order(order.id, "lost in transit")
        .await
        .unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(app.available("P1").await, 5);
    let reservations = app.services.ledger.reservations_for_order(order.id).await.unwrap();
    assert!(reservations.iter().all(|r| r.status == ReservationStatus::Released));

    let published = app.publisher.published().await;
    match published.as_slice() {
        [LifecycleEvent::OrderCancelled(cancelled), LifecycleEvent::InventoryReleased(released)] => {
            assert_eq!(cancelled.id, order.id);
            assert_eq!(cancelled.reason.as_deref(), Some("lost in transit"));
            assert_eq!(released.reason, "lost in transit");
            assert_eq!(released.quantity, 2);
        }
        other => panic!("unexpected events {:?}", other),
    }

    let last = cancelled.status_history.last().unwrap();
    assert_eq!(last.from_status, OrderStatus::Shipped);
    assert_eq!(last.to_status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn cancel_from_pending_needs_no_release() {
    let app = app(&[("P1", 5)]);
    let order = app.order("P1", 2).await;

    let cancelled = app.services.handler.cancel_order(order.id, "changed mind").await.unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(app.available("P1").await, 5);
}

#[tokio::test]
async fn cancel_without_reason_is_rejected() {
    let app = app(&[("P1", 5)]);
    let order = app.order("P1", 1).await;

    let err = app
        .services
        .handler
        .change_status(order.id, StatusChangeRequest::to(OrderStatus::Cancelled))
        .await
        .unwrap_err();

    assert!(matches!(err, CommandError::Validation(_)));
    assert_eq!(
        app.services.handler.get_order(order.id).await.unwrap().status,
        OrderStatus::Pending
    );
}

#[tokio::test]
async fn refunded_order_rejects_every_target() {
    let app = app(&[("P1", 5)]);
    let order = app.order("P1", 1).await;
    app.services.handler.cancel_order(order.id, "duplicate").await.unwrap();
    app.services
        .handler
        .update_status(order.id, OrderStatus::Refunded)
        .await
        .unwrap();

    for target in OrderStatus::ALL {
        let err = app
            .services
            .handler
            .change_status(order.id, StatusChangeRequest::to(target).with_reason("again"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, CommandError::InvalidTransition { from: OrderStatus::Refunded, .. }),
            "target {:?} gave {:?}",
            target,
            err
        );
    }

    let order = app.services.handler.get_order(order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Refunded);
    assert_eq!(order.status_history.len(), 2);
}

#[tokio::test]
async fn illegal_jump_is_rejected() {
    let app = app(&[("P1", 5)]);
    let order = app.order("P1", 1).await;

    let err = app
        .services
        .handler
        .update_status(order.id, OrderStatus::Delivered)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CommandError::InvalidTransition { from: OrderStatus::Pending, to: OrderStatus::Delivered, .. }
    ));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn competing_orders_never_oversell() {
    let app = app(&[("P1", 10)]);
    let mut orders = Vec::new();
    for _ in 0..8 {
        orders.push(app.order("P1", 3).await);
    }

    let confirms = orders.iter().map(|order| {
        let handler = app.services.handler.clone();
        let order_id = order.id;
        tokio::spawn(async move { handler.update_status(order_id, OrderStatus::Confirmed).await })
    });
    let results = futures_util::future::join_all(confirms).await;

    let confirmed = results.iter().filter(|r| matches!(r, Ok(Ok(_)))).count();
    assert_eq!(confirmed, 3);
    assert_eq!(app.available("P1").await, 1);
}
