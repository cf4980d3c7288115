use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::utils::KeyedLocks;
use super::errors::LedgerError;
use super::stock::StockLevels;
use super::store::ReservationStore;
use super::value_objects::{
    InventoryItemId, Reservation, ReservationId, ReservationStatus, EXPIRED_REASON,
};

// ============================================================================
// Inventory Reservation Ledger
// ============================================================================
//
// Guarantees that committed demand never exceeds supply:
//
//     sum(ACTIVE reservations of item) <= on_hand(item)
//
// Every read-check-write on an item's reservations runs under that item's
// lock. Callers holding an order lock take item locks after it, one at a
// time, and each item lock is dropped as soon as its decision is written.
//
// The ledger returns the reservations it changed; turning them into
// published events is the caller's job, after its own state has committed.
//
// ============================================================================

/// Result of settling many reservations at once.
///
/// `settled` lists every reservation that left ACTIVE, including those
/// settled before `error` was hit. Callers owe one event per entry either way.
#[derive(Debug, Default)]
pub struct Settlement {
    pub settled: Vec<Reservation>,
    pub error: Option<LedgerError>,
}

impl Settlement {
    fn failed(error: LedgerError) -> Self {
        Self {
            settled: Vec::new(),
            error: Some(error),
        }
    }

    pub fn into_result(self) -> Result<Vec<Reservation>, LedgerError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.settled),
        }
    }
}

pub struct ReservationLedger {
    stock: Arc<dyn StockLevels>,
    store: Arc<dyn ReservationStore>,
    item_locks: KeyedLocks<InventoryItemId>,
    reservation_ttl: Option<Duration>,
}

impl ReservationLedger {
    pub fn new(stock: Arc<dyn StockLevels>, store: Arc<dyn ReservationStore>) -> Self {
        Self {
            stock,
            store,
            item_locks: KeyedLocks::new(),
            reservation_ttl: None,
        }
    }

    /// New reservations expire `ttl` after creation unless consumed or released first.
    pub fn with_reservation_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.reservation_ttl = ttl;
        self
    }

    /// On-hand minus the sum of ACTIVE reservations
    pub async fn available(&self, item: &InventoryItemId) -> Result<u32, LedgerError> {
        let _guard = self.item_locks.lock(item).await;
        self.available_locked(item).await
    }

    async fn available_locked(&self, item: &InventoryItemId) -> Result<u32, LedgerError> {
        let on_hand = self
            .stock
            .on_hand(item)
            .await?
            .ok_or_else(|| LedgerError::UnknownItem(item.clone()))?;

        let reserved: u64 = self
            .store
            .find_by_item(item)
            .await?
            .iter()
            .filter(|r| r.is_active())
            .map(|r| u64::from(r.quantity))
            .sum();

        Ok(u64::from(on_hand).saturating_sub(reserved) as u32)
    }

    /// Claim `quantity` of `item` for `order_id`.
    ///
    /// Fails with `InsufficientStock` (and changes nothing) when the claim
    /// would exceed the available quantity.
    pub async fn reserve(
        &self,
        item: &InventoryItemId,
        order_id: Uuid,
        quantity: u32,
    ) -> Result<Reservation, LedgerError> {
        if quantity == 0 {
            return Err(LedgerError::InvalidQuantity(item.clone()));
        }

        let _guard = self.item_locks.lock(item).await;

        let available = self.available_locked(item).await?;
        if quantity > available {
            tracing::warn!(
                item = %item,
                order_id = %order_id,
                requested = quantity,
                available = available,
                "Reservation refused: insufficient stock"
            );
            return Err(LedgerError::InsufficientStock {
                item: item.clone(),
                requested: quantity,
                available,
            });
        }

        let now = Utc::now();
        let expires_at = self
            .reservation_ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .map(|ttl| now + ttl);

        let reservation = Reservation {
            id: ReservationId::new(),
            inventory_item_id: item.clone(),
            order_id,
            quantity,
            status: ReservationStatus::Active,
            expires_at,
            created_at: now,
            release_reason: None,
        };
        self.store.put(reservation.clone()).await?;

        tracing::info!(
            reservation_id = %reservation.id,
            item = %item,
            order_id = %order_id,
            quantity = quantity,
            remaining = available - quantity,
            "Inventory reserved"
        );

        Ok(reservation)
    }

    /// Reserve every line of an order, all or nothing.
    ///
    /// On the first refusal the reservations already made by this call are
    /// discarded and the refusal is returned.
    pub async fn reserve_for_order(
        &self,
        order_id: Uuid,
        lines: &[(InventoryItemId, u32)],
    ) -> Result<Vec<Reservation>, LedgerError> {
        let mut made = Vec::with_capacity(lines.len());

        for (item, quantity) in lines {
            match self.reserve(item, order_id, *quantity).await {
                Ok(reservation) => made.push(reservation),
                Err(e) => {
                    if let Err(discard_err) = self.discard(&made).await {
                        tracing::error!(
                            order_id = %order_id,
                            error = %discard_err,
                            "Failed to discard partial reservations"
                        );
                    }
                    return Err(e);
                }
            }
        }

        Ok(made)
    }

    /// Remove reservations that never became visible to anyone else
    /// (the surrounding operation was rolled back). No events are owed.
    pub async fn discard(&self, reservations: &[Reservation]) -> Result<(), LedgerError> {
        for reservation in reservations {
            let _guard = self.item_locks.lock(&reservation.inventory_item_id).await;
            self.store.remove(reservation.id).await?;
            tracing::debug!(
                reservation_id = %reservation.id,
                item = %reservation.inventory_item_id,
                "Discarded provisional reservation"
            );
        }
        Ok(())
    }

    pub async fn get(&self, id: ReservationId) -> Result<Reservation, LedgerError> {
        self.store
            .get(id)
            .await?
            .ok_or(LedgerError::ReservationNotFound(id))
    }

    pub async fn reservations_for_order(&self, order_id: Uuid) -> Result<Vec<Reservation>, LedgerError> {
        Ok(self.store.find_by_order(order_id).await?)
    }

    /// Release one reservation. Returns `None` when it was no longer ACTIVE.
    pub async fn release(
        &self,
        id: ReservationId,
        reason: &str,
    ) -> Result<Option<Reservation>, LedgerError> {
        let reservation = self.get(id).await?;
        self.settle(&reservation, ReservationStatus::Released, Some(reason)).await
    }

    /// Release every ACTIVE reservation of `order_id`. Idempotent.
    pub async fn release_by_order(&self, order_id: Uuid, reason: &str) -> Settlement {
        self.settle_order(order_id, ReservationStatus::Released, Some(reason)).await
    }

    /// Mark every ACTIVE reservation of `order_id` as fulfilled. Idempotent.
    pub async fn consume_by_order(&self, order_id: Uuid) -> Settlement {
        self.settle_order(order_id, ReservationStatus::Consumed, None).await
    }

    /// Release ACTIVE reservations whose `expires_at <= now`.
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> Settlement {
        let candidates = match self.store.find_expired(now).await {
            Ok(candidates) => candidates,
            Err(e) => return Settlement::failed(e.into()),
        };

        let settlement = self
            .settle_each(candidates, ReservationStatus::Released, Some(EXPIRED_REASON))
            .await;

        if !settlement.settled.is_empty() {
            tracing::info!(count = settlement.settled.len(), "Expired stale reservations");
        }

        settlement
    }

    async fn settle_order(
        &self,
        order_id: Uuid,
        outcome: ReservationStatus,
        reason: Option<&str>,
    ) -> Settlement {
        let reservations = match self.store.find_by_order(order_id).await {
            Ok(reservations) => reservations,
            Err(e) => return Settlement::failed(e.into()),
        };

        let settlement = self.settle_each(reservations, outcome, reason).await;

        tracing::debug!(
            order_id = %order_id,
            outcome = ?outcome,
            count = settlement.settled.len(),
            failed = settlement.error.is_some(),
            "Settled order reservations"
        );

        settlement
    }

    /// Settle every ACTIVE reservation in `reservations`. A failure on one
    /// does not stop the rest; the first error is kept.
    async fn settle_each(
        &self,
        reservations: Vec<Reservation>,
        outcome: ReservationStatus,
        reason: Option<&str>,
    ) -> Settlement {
        let mut settlement = Settlement::default();

        for reservation in reservations.iter().filter(|r| r.is_active()) {
            match self.settle(reservation, outcome, reason).await {
                Ok(Some(updated)) => settlement.settled.push(updated),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        reservation_id = %reservation.id,
                        order_id = %reservation.order_id,
                        outcome = ?outcome,
                        error = %e,
                        "Failed to settle reservation"
                    );
                    settlement.error.get_or_insert(e);
                }
            }
        }

        settlement
    }

    /// Move one reservation out of ACTIVE under its item lock.
    /// The status is re-read under the lock, so concurrent settles apply once.
    async fn settle(
        &self,
        reservation: &Reservation,
        outcome: ReservationStatus,
        reason: Option<&str>,
    ) -> Result<Option<Reservation>, LedgerError> {
        let _guard = self.item_locks.lock(&reservation.inventory_item_id).await;

        let Some(mut current) = self.store.get(reservation.id).await? else {
            return Err(LedgerError::ReservationNotFound(reservation.id));
        };
        if !current.is_active() {
            return Ok(None);
        }

        current.status = outcome;
        current.release_reason = reason.map(str::to_string);
        self.store.put(current.clone()).await?;

        tracing::info!(
            reservation_id = %current.id,
            item = %current.inventory_item_id,
            order_id = %current.order_id,
            quantity = current.quantity,
            outcome = ?outcome,
            reason = ?reason,
            "Reservation settled"
        );

        Ok(Some(current))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
