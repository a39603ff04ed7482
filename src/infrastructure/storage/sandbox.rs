//! Sandbox slot store (demo mode)
//!
//! Every slot reports a large fixed availability and holds always succeed.
//! Reservations and the one-order-per-day rule still work so demo flows
//! behave realistically. Never selected unless `store.mode = "sandbox"`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use super::memory::InMemorySlotStore;
use crate::domain::{
    LocationId, NewReservation, Period, Reservation, ReservationId, ReservationStatus, SlotId,
    SlotSpec, SlotStore, TimeSlot,
};
use crate::shared::{DomainError, DomainResult};

/// Availability every sandbox slot reports
pub const SANDBOX_AVAILABILITY: u32 = 20;

pub struct SandboxSlotStore {
    inner: InMemorySlotStore,
}

impl SandboxSlotStore {
    pub fn new() -> Self {
        Self {
            inner: InMemorySlotStore::new(),
        }
    }

    fn unlimited(mut slot: TimeSlot) -> TimeSlot {
        slot.capacity = SANDBOX_AVAILABILITY;
        slot.remaining = SANDBOX_AVAILABILITY;
        slot
    }
}

impl Default for SandboxSlotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SlotStore for SandboxSlotStore {
    async fn get_slots(
        &self,
        location_id: &LocationId,
        date: NaiveDate,
        period: Period,
    ) -> DomainResult<Vec<TimeSlot>> {
        let slots = self.inner.get_slots(location_id, date, period).await?;
        Ok(slots.into_iter().map(Self::unlimited).collect())
    }

    async fn get_slot(&self, slot_id: SlotId) -> DomainResult<Option<TimeSlot>> {
        Ok(self.inner.get_slot(slot_id).await?.map(Self::unlimited))
    }

    async fn materialize_slots(&self, specs: &[SlotSpec]) -> DomainResult<u64> {
        self.inner.materialize_slots(specs).await
    }

    async fn try_decrement(&self, slot_id: SlotId) -> DomainResult<bool> {
        if self.inner.get_slot(slot_id).await?.is_none() {
            return Err(DomainError::not_found("TimeSlot", "id", slot_id));
        }
        debug!(slot_id = %slot_id, "Sandbox hold always succeeds");
        Ok(true)
    }

    async fn increment(&self, _slot_id: SlotId) -> DomainResult<()> {
        Ok(())
    }

    async fn has_active_reservation(&self, user_id: &str, date: NaiveDate) -> DomainResult<bool> {
        self.inner.has_active_reservation(user_id, date).await
    }

    async fn find_active_reservation(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> DomainResult<Option<Reservation>> {
        self.inner.find_active_reservation(user_id, date).await
    }

    async fn record_reservation(&self, reservation: NewReservation) -> DomainResult<ReservationId> {
        self.inner.record_reservation(reservation).await
    }

    async fn find_reservation(&self, id: ReservationId) -> DomainResult<Option<Reservation>> {
        self.inner.find_reservation(id).await
    }

    async fn confirm_reservation(&self, id: ReservationId, order_id: &str) -> DomainResult<bool> {
        self.inner.confirm_reservation(id, order_id).await
    }

    async fn void_reservation(
        &self,
        id: ReservationId,
        status: ReservationStatus,
    ) -> DomainResult<bool> {
        self.inner.void_reservation(id, status).await
    }

    async fn hold_slot(&self, reservation: NewReservation) -> DomainResult<Option<ReservationId>> {
        let slot_id = reservation.slot_id;
        if !self.try_decrement(slot_id).await? {
            return Ok(None);
        }
        self.inner.record_reservation(reservation).await.map(Some)
    }

    async fn release_reservation(
        &self,
        id: ReservationId,
        status: ReservationStatus,
    ) -> DomainResult<bool> {
        self.inner.void_reservation(id, status).await
    }

    async fn find_expired_holds(&self, now: DateTime<Utc>) -> DomainResult<Vec<Reservation>> {
        self.inner.find_expired_holds(now).await
    }

    async fn ping(&self) -> DomainResult<()> {
        Ok(())
    }
}
