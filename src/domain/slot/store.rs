//! Slot store interface
//!
//! The durable system of record for slot capacity and reservations. Every
//! capacity change goes through a single conditional operation here; callers
//! never read-modify-write `remaining` themselves.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::model::{SlotId, SlotSpec, TimeSlot};
use super::period::Period;
use crate::domain::location::LocationId;
use crate::domain::reservation::{Reservation, ReservationId, ReservationStatus};
use crate::shared::DomainResult;

/// Data for a new `Held` reservation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservation {
    pub user_id: String,
    pub slot_id: SlotId,
    pub date: NaiveDate,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait SlotStore: Send + Sync {
    /// Slots for one location/day/period, ascending by start time
    async fn get_slots(
        &self,
        location_id: &LocationId,
        date: NaiveDate,
        period: Period,
    ) -> DomainResult<Vec<TimeSlot>>;

    /// Find a single slot by ID
    async fn get_slot(&self, slot_id: SlotId) -> DomainResult<Option<TimeSlot>>;

    /// Insert slots that do not exist yet (keyed by location, date, period,
    /// start time). Returns the number of rows actually created.
    async fn materialize_slots(&self, slots: &[SlotSpec]) -> DomainResult<u64>;

    /// Atomically consume one unit: true iff `remaining > 0` held and was decremented
    async fn try_decrement(&self, slot_id: SlotId) -> DomainResult<bool>;

    /// Atomically restore one unit (never above capacity)
    async fn increment(&self, slot_id: SlotId) -> DomainResult<()>;

    /// Whether the user holds a `Held` or `Confirmed` reservation on `date`
    async fn has_active_reservation(&self, user_id: &str, date: NaiveDate) -> DomainResult<bool>;

    /// The user's `Held` or `Confirmed` reservation on `date`, if any
    async fn find_active_reservation(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> DomainResult<Option<Reservation>>;

    /// Persist a new `Held` reservation.
    ///
    /// # Errors
    /// - `DuplicateReservation` if the user already has an active reservation that day
    async fn record_reservation(&self, reservation: NewReservation) -> DomainResult<ReservationId>;

    /// Find reservation by ID
    async fn find_reservation(&self, id: ReservationId) -> DomainResult<Option<Reservation>>;

    /// `Held` → `Confirmed` with the order attached. Returns false if the
    /// reservation was not `Held` anymore.
    async fn confirm_reservation(&self, id: ReservationId, order_id: &str) -> DomainResult<bool>;

    /// Move a reservation to a terminal void status (`Released`, `Expired` or
    /// `Cancelled`). Returns true iff this call performed the transition, so
    /// exactly one caller restores capacity.
    async fn void_reservation(
        &self,
        id: ReservationId,
        status: ReservationStatus,
    ) -> DomainResult<bool>;

    /// Consume one unit and record the `Held` reservation as one unit of
    /// work. `None` means the slot was full and nothing changed.
    ///
    /// # Errors
    /// - `DuplicateReservation` if the user already has an active reservation
    ///   that day; capacity is left untouched
    /// - `NotFound` for an unknown slot
    async fn hold_slot(&self, reservation: NewReservation) -> DomainResult<Option<ReservationId>>;

    /// Void the reservation and restore its unit as one unit of work. Returns
    /// true iff this call performed the transition; on error neither change
    /// is applied.
    async fn release_reservation(
        &self,
        id: ReservationId,
        status: ReservationStatus,
    ) -> DomainResult<bool>;

    /// `Held` reservations whose `expires_at` is before `now`
    async fn find_expired_holds(&self, now: DateTime<Utc>) -> DomainResult<Vec<Reservation>>;

    /// Cheap connectivity check for health probes
    async fn ping(&self) -> DomainResult<()>;
}
