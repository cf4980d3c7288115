use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::value_objects::{InventoryItemId, Reservation, ReservationId};

// ============================================================================
// Reservation Persistence
// ============================================================================

/// Get/put persistence for reservations. The ledger is the only writer.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn get(&self, id: ReservationId) -> anyhow::Result<Option<Reservation>>;

    /// Insert or overwrite
    async fn put(&self, reservation: Reservation) -> anyhow::Result<()>;

    async fn remove(&self, id: ReservationId) -> anyhow::Result<()>;

    /// All reservations of an order, oldest first
    async fn find_by_order(&self, order_id: Uuid) -> anyhow::Result<Vec<Reservation>>;

    async fn find_by_item(&self, item: &InventoryItemId) -> anyhow::Result<Vec<Reservation>>;

    /// Active reservations whose `expires_at <= now`
    async fn find_expired(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Reservation>>;
}

#[derive(Default)]
pub struct InMemoryReservationStore {
    reservations: RwLock<HashMap<ReservationId, Reservation>>,
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(mut reservations: Vec<Reservation>) -> Vec<Reservation> {
        reservations.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.0.cmp(&b.id.0)));
        reservations
    }
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn get(&self, id: ReservationId) -> anyhow::Result<Option<Reservation>> {
        Ok(self.reservations.read().await.get(&id).cloned())
    }

    async fn put(&self, reservation: Reservation) -> anyhow::Result<()> {
        self.reservations.write().await.insert(reservation.id, reservation);
        Ok(())
    }

    async fn remove(&self, id: ReservationId) -> anyhow::Result<()> {
        self.reservations.write().await.remove(&id);
        Ok(())
    }

    async fn find_by_order(&self, order_id: Uuid) -> anyhow::Result<Vec<Reservation>> {
        let reservations = self.reservations.read().await;
        Ok(Self::sorted(
            reservations.values().filter(|r| r.order_id == order_id).cloned().collect(),
        ))
    }

    async fn find_by_item(&self, item: &InventoryItemId) -> anyhow::Result<Vec<Reservation>> {
        let reservations = self.reservations.read().await;
        Ok(Self::sorted(
            reservations.values().filter(|r| &r.inventory_item_id == item).cloned().collect(),
        ))
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Reservation>> {
        let reservations = self.reservations.read().await;
        Ok(Self::sorted(
            reservations.values().filter(|r| r.is_expired_at(now)).cloned().collect(),
        ))
    }
}
