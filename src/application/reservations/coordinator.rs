//! Reservation protocol: hold, then confirm or release
//!
//! Capacity is only ever changed through the store's conditional operations.
//! A hold consumes its unit and records the reservation in one store call; a
//! release voids the reservation and returns the unit in one store call, and
//! only the caller that won the transition returns it, so release, cancel and
//! expiry can race without double-incrementing or losing a unit.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::application::events::{
    ReservationConfirmedEvent, ReservationEvent, SharedEventBus, SlotCapacityChangedEvent,
    SlotEvent,
};
use crate::application::scheduling::SlotGridLoader;
use crate::domain::{
    NewReservation, Reservation, ReservationId, ReservationStatus, SlotId, SlotStore, TimeSlot,
};
use crate::shared::{DomainError, DomainResult, SharedClock};

/// Provisional hold returned by a successful `reserve`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationHandle {
    pub reservation_id: ReservationId,
    pub user_id: String,
    pub slot_id: SlotId,
    pub date: NaiveDate,
    pub expires_at: DateTime<Utc>,
}

impl From<&Reservation> for ReservationHandle {
    fn from(r: &Reservation) -> Self {
        Self {
            reservation_id: r.id,
            user_id: r.user_id.clone(),
            slot_id: r.slot_id,
            date: r.date,
            expires_at: r.expires_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Capacity ran out between selection and reservation
    SlotFull,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveOutcome {
    Held(ReservationHandle),
    Rejected(RejectReason),
}

impl ReserveOutcome {
    pub fn handle(&self) -> Option<&ReservationHandle> {
        match self {
            ReserveOutcome::Held(handle) => Some(handle),
            ReserveOutcome::Rejected(_) => None,
        }
    }
}

pub struct ReservationCoordinator {
    store: Arc<dyn SlotStore>,
    grids: Arc<SlotGridLoader>,
    events: SharedEventBus,
    clock: SharedClock,
    hold_timeout: Duration,
}

impl ReservationCoordinator {
    pub fn new(
        store: Arc<dyn SlotStore>,
        grids: Arc<SlotGridLoader>,
        events: SharedEventBus,
        clock: SharedClock,
        hold_timeout: Duration,
    ) -> Self {
        Self {
            store,
            grids,
            events,
            clock,
            hold_timeout,
        }
    }

    pub fn hold_timeout(&self) -> Duration {
        self.hold_timeout
    }

    /// Place a hold on `slot` for `user_id`.
    ///
    /// # Errors
    /// - `Validation` for an empty user id
    /// - `NotFound` if the slot's date is outside the booking window or its
    ///   location is inactive
    /// - `DuplicateReservation` if the user already holds or confirmed a slot that day
    /// - `StoreUnavailable` on store failure (never retried here)
    pub async fn reserve(&self, user_id: &str, slot: &TimeSlot) -> DomainResult<ReserveOutcome> {
        if user_id.trim().is_empty() {
            return Err(DomainError::Validation("user_id must not be empty".to_string()));
        }

        self.grids.check_bookable(slot).await?;
        self.ensure_no_active_reservation(user_id, slot.date).await?;

        let now = self.clock.now();
        let new = NewReservation {
            user_id: user_id.to_string(),
            slot_id: slot.id,
            date: slot.date,
            expires_at: now + self.hold_timeout,
        };
        let expires_at = new.expires_at;

        let reservation_id = match self.store.hold_slot(new).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                metrics::counter!("lunchline_reservations_total", "outcome" => "slot_full")
                    .increment(1);
                info!(user_id, slot_id = %slot.id, "Slot full, reservation rejected");
                return Ok(ReserveOutcome::Rejected(RejectReason::SlotFull));
            }
            Err(e) => {
                if matches!(e, DomainError::DuplicateReservation { .. }) {
                    metrics::counter!("lunchline_reservations_total", "outcome" => "duplicate")
                        .increment(1);
                }
                return Err(e);
            }
        };

        metrics::counter!("lunchline_reservations_total", "outcome" => "held").increment(1);
        info!(
            user_id,
            slot_id = %slot.id,
            reservation_id = %reservation_id,
            %expires_at,
            "Slot held"
        );

        self.publish_capacity_change(slot.id, slot.date, -1);
        self.events.publish(SlotEvent::ReservationHeld(ReservationEvent {
            reservation_id,
            user_id: user_id.to_string(),
            slot_id: slot.id,
            date: slot.date,
            timestamp: now,
        }));

        Ok(ReserveOutcome::Held(ReservationHandle {
            reservation_id,
            user_id: user_id.to_string(),
            slot_id: slot.id,
            date: slot.date,
            expires_at,
        }))
    }

    /// Make the hold permanent. Confirming twice is a no-op; the first order id wins.
    ///
    /// # Errors
    /// - `HoldNotActive` if the hold was released, cancelled or has expired
    pub async fn confirm(&self, handle: &ReservationHandle, order_id: &str) -> DomainResult<()> {
        if order_id.trim().is_empty() {
            return Err(DomainError::Validation("order_id must not be empty".to_string()));
        }

        let reservation = self.load(handle.reservation_id).await?;
        match reservation.status {
            ReservationStatus::Confirmed => {
                debug!(reservation_id = %reservation.id, "Already confirmed");
                return Ok(());
            }
            ReservationStatus::Held if reservation.is_hold_expired(self.clock.now()) => {
                self.expire_hold(&reservation).await?;
                return Err(DomainError::HoldNotActive {
                    id: reservation.id,
                    status: ReservationStatus::Expired,
                });
            }
            ReservationStatus::Held => {}
            status => {
                return Err(DomainError::HoldNotActive {
                    id: reservation.id,
                    status,
                })
            }
        }

        if !self.store.confirm_reservation(reservation.id, order_id).await? {
            // Lost a race with another transition; report what won.
            let current = self.load(reservation.id).await?;
            return match current.status {
                ReservationStatus::Confirmed => Ok(()),
                status => Err(DomainError::HoldNotActive {
                    id: current.id,
                    status,
                }),
            };
        }

        metrics::counter!("lunchline_confirmations_total").increment(1);
        info!(reservation_id = %reservation.id, order_id, "Reservation confirmed");
        self.events.publish(SlotEvent::ReservationConfirmed(ReservationConfirmedEvent {
            reservation_id: reservation.id,
            slot_id: reservation.slot_id,
            order_id: order_id.to_string(),
            timestamp: self.clock.now(),
        }));
        Ok(())
    }

    /// Give back an unconfirmed hold. Safe to call any number of times.
    ///
    /// # Errors
    /// - `CannotReleaseConfirmed` if the reservation was confirmed; use [`cancel`](Self::cancel)
    pub async fn release(&self, handle: &ReservationHandle) -> DomainResult<()> {
        let reservation = self.load(handle.reservation_id).await?;
        match reservation.status {
            ReservationStatus::Confirmed => {
                return Err(DomainError::CannotReleaseConfirmed(reservation.id))
            }
            ReservationStatus::Held => {}
            _ => {
                debug!(
                    reservation_id = %reservation.id,
                    status = %reservation.status,
                    "Already released"
                );
                return Ok(());
            }
        }

        if self.void(&reservation, ReservationStatus::Released).await? {
            return Ok(());
        }

        match self.load(reservation.id).await?.status {
            ReservationStatus::Confirmed => {
                Err(DomainError::CannotReleaseConfirmed(reservation.id))
            }
            _ => Ok(()),
        }
    }

    /// Explicit cancellation of a held or confirmed reservation.
    pub async fn cancel(&self, handle: &ReservationHandle) -> DomainResult<()> {
        let reservation = self.load(handle.reservation_id).await?;
        if !reservation.is_active() {
            debug!(
                reservation_id = %reservation.id,
                status = %reservation.status,
                "Nothing to cancel"
            );
            return Ok(());
        }
        self.void(&reservation, ReservationStatus::Cancelled).await?;
        Ok(())
    }

    /// Expire a hold past its deadline. Returns true if this call expired it.
    pub async fn expire_hold(&self, reservation: &Reservation) -> DomainResult<bool> {
        self.void(reservation, ReservationStatus::Expired).await
    }

    /// Expire every overdue hold. Returns how many were expired.
    pub async fn expire_overdue_holds(&self) -> DomainResult<usize> {
        let overdue = self.store.find_expired_holds(self.clock.now()).await?;
        if overdue.is_empty() {
            return Ok(0);
        }

        info!(count = overdue.len(), "Expiring overdue holds");
        let mut expired = 0;
        for reservation in &overdue {
            match self.expire_hold(reservation).await {
                Ok(true) => expired += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(reservation_id = %reservation.id, error = %e, "Failed to expire hold");
                }
            }
        }
        Ok(expired)
    }

    pub async fn get(&self, id: ReservationId) -> DomainResult<Reservation> {
        self.load(id).await
    }

    /// Handle for an existing reservation, for callers that only kept the id
    pub async fn handle(&self, id: ReservationId) -> DomainResult<ReservationHandle> {
        Ok(ReservationHandle::from(&self.load(id).await?))
    }

    async fn load(&self, id: ReservationId) -> DomainResult<Reservation> {
        self.store
            .find_reservation(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Reservation", "id", id))
    }

    async fn ensure_no_active_reservation(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> DomainResult<()> {
        if !self.store.has_active_reservation(user_id, date).await? {
            return Ok(());
        }

        // A stale hold nobody swept yet must not block a fresh attempt.
        if let Some(existing) = self.store.find_active_reservation(user_id, date).await? {
            if existing.is_hold_expired(self.clock.now()) {
                self.expire_hold(&existing).await?;
                return Ok(());
            }
        }

        metrics::counter!("lunchline_reservations_total", "outcome" => "duplicate").increment(1);
        info!(user_id, %date, "Duplicate reservation rejected");
        Err(DomainError::DuplicateReservation {
            user_id: user_id.to_string(),
            date,
        })
    }

    /// Transition to a void status and, if this call won, restore one unit.
    async fn void(
        &self,
        reservation: &Reservation,
        status: ReservationStatus,
    ) -> DomainResult<bool> {
        if !self.store.release_reservation(reservation.id, status).await? {
            return Ok(false);
        }

        let reason = match status {
            ReservationStatus::Expired => "expired",
            ReservationStatus::Cancelled => "cancelled",
            _ => "released",
        };
        metrics::counter!("lunchline_releases_total", "reason" => reason).increment(1);
        info!(
            reservation_id = %reservation.id,
            slot_id = %reservation.slot_id,
            user_id = %reservation.user_id,
            reason,
            "Capacity returned"
        );

        self.publish_capacity_change(reservation.slot_id, reservation.date, 1);
        let event = ReservationEvent {
            reservation_id: reservation.id,
            user_id: reservation.user_id.clone(),
            slot_id: reservation.slot_id,
            date: reservation.date,
            timestamp: self.clock.now(),
        };
        self.events.publish(match status {
            ReservationStatus::Expired => SlotEvent::ReservationExpired(event),
            _ => SlotEvent::ReservationReleased(event),
        });
        Ok(true)
    }

    fn publish_capacity_change(&self, slot_id: SlotId, date: NaiveDate, delta: i32) {
        self.events.publish(SlotEvent::SlotCapacityChanged(SlotCapacityChangedEvent {
            slot_id,
            date,
            delta,
            timestamp: self.clock.now(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{fixture, next_weekday, Fixture, MAIN_1, MAIN_2};
    use crate::domain::{LocationId, Period, SlotSpec};
    use crate::infrastructure::storage::InMemorySlotStore;
    use crate::shared::Clock;
    use async_trait::async_trait;
    use chrono::NaiveTime;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Delegates to the in-memory store but fails the next hold or release
    /// once armed, the way a dropped database connection would.
    struct FlakyStore {
        inner: Arc<InMemorySlotStore>,
        fail_next: AtomicBool,
    }

    impl FlakyStore {
        fn arm(&self) {
            self.fail_next.store(true, Ordering::SeqCst);
        }

        fn tripped(&self) -> DomainResult<()> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(DomainError::StoreUnavailable("connection reset".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SlotStore for FlakyStore {
        async fn get_slots(
            &self,
            location_id: &LocationId,
            date: NaiveDate,
            period: Period,
        ) -> DomainResult<Vec<TimeSlot>> {
            self.inner.get_slots(location_id, date, period).await
        }

        async fn get_slot(&self, slot_id: SlotId) -> DomainResult<Option<TimeSlot>> {
            self.inner.get_slot(slot_id).await
        }

        async fn materialize_slots(&self, slots: &[SlotSpec]) -> DomainResult<u64> {
            self.inner.materialize_slots(slots).await
        }

        async fn try_decrement(&self, slot_id: SlotId) -> DomainResult<bool> {
            self.inner.try_decrement(slot_id).await
        }

        async fn increment(&self, slot_id: SlotId) -> DomainResult<()> {
            self.inner.increment(slot_id).await
        }

        async fn has_active_reservation(
            &self,
            user_id: &str,
            date: NaiveDate,
        ) -> DomainResult<bool> {
            self.inner.has_active_reservation(user_id, date).await
        }

        async fn find_active_reservation(
            &self,
            user_id: &str,
            date: NaiveDate,
        ) -> DomainResult<Option<Reservation>> {
            self.inner.find_active_reservation(user_id, date).await
        }

        async fn record_reservation(&self, new: NewReservation) -> DomainResult<ReservationId> {
            self.inner.record_reservation(new).await
        }

        async fn find_reservation(&self, id: ReservationId) -> DomainResult<Option<Reservation>> {
            self.inner.find_reservation(id).await
        }

        async fn confirm_reservation(
            &self,
            id: ReservationId,
            order_id: &str,
        ) -> DomainResult<bool> {
            self.inner.confirm_reservation(id, order_id).await
        }

        async fn void_reservation(
            &self,
            id: ReservationId,
            status: ReservationStatus,
        ) -> DomainResult<bool> {
            self.inner.void_reservation(id, status).await
        }

        async fn hold_slot(&self, new: NewReservation) -> DomainResult<Option<ReservationId>> {
            self.tripped()?;
            self.inner.hold_slot(new).await
        }

        async fn release_reservation(
            &self,
            id: ReservationId,
            status: ReservationStatus,
        ) -> DomainResult<bool> {
            self.tripped()?;
            self.inner.release_reservation(id, status).await
        }

        async fn find_expired_holds(&self, now: DateTime<Utc>) -> DomainResult<Vec<Reservation>> {
            self.inner.find_expired_holds(now).await
        }

        async fn ping(&self) -> DomainResult<()> {
            self.inner.ping().await
        }
    }

    fn flaky(fx: &Fixture) -> (ReservationCoordinator, Arc<FlakyStore>) {
        let store = Arc::new(FlakyStore {
            inner: fx.store.clone(),
            fail_next: AtomicBool::new(false),
        });
        let coordinator = ReservationCoordinator::new(
            store.clone(),
            fx.loader.clone(),
            fx.events.clone(),
            Arc::new(fx.clock.clone()),
            Duration::seconds(300),
        );
        (coordinator, store)
    }

    async fn first_slot(fx: &Fixture) -> TimeSlot {
        let date = next_weekday(fx.today);
        let grid = fx.loader.load(&MAIN_1.into(), date, Period::A).await.unwrap();
        grid.slots[0].clone()
    }

    async fn hold(fx: &Fixture, user: &str, slot: &TimeSlot) -> ReservationHandle {
        match fx.coordinator.reserve(user, slot).await.unwrap() {
            ReserveOutcome::Held(handle) => handle,
            other => panic!("expected hold, got {:?}", other),
        }
    }

    fn remaining(fx: &Fixture, slot: &TimeSlot) -> u32 {
        fx.store.remaining(slot.id).unwrap()
    }

    #[tokio::test]
    async fn reserve_decrements_and_records_hold() {
        let fx = fixture();
        let slot = first_slot(&fx).await;

        let handle = hold(&fx, "user-1", &slot).await;

        assert_eq!(remaining(&fx, &slot), 9);
        let reservation = fx.coordinator.get(handle.reservation_id).await.unwrap();
        assert_eq!(reservation.status, ReservationStatus::Held);
        assert_eq!(reservation.expires_at, fx.clock.now() + Duration::seconds(300));
    }

    #[tokio::test]
    async fn second_reservation_same_day_is_duplicate() {
        let fx = fixture();
        let slot = first_slot(&fx).await;
        hold(&fx, "user-1", &slot).await;

        let grid = fx.loader.load(&MAIN_1.into(), slot.date, Period::A).await.unwrap();
        let next = grid
            .slots
            .iter()
            .find(|s| s.start_time == NaiveTime::from_hms_opt(11, 5, 0).unwrap())
            .unwrap();

        let result = fx.coordinator.reserve("user-1", next).await;
        assert!(matches!(result, Err(DomainError::DuplicateReservation { .. })));
        assert_eq!(remaining(&fx, next), 10);
    }

    #[tokio::test]
    async fn duplicate_check_also_covers_confirmed_orders() {
        let fx = fixture();
        let slot = first_slot(&fx).await;
        let handle = hold(&fx, "user-1", &slot).await;
        fx.coordinator.confirm(&handle, "order-1").await.unwrap();

        let result = fx.coordinator.reserve("user-1", &slot).await;
        assert!(matches!(result, Err(DomainError::DuplicateReservation { .. })));
    }

    #[tokio::test]
    async fn released_reservation_frees_the_day_for_that_user() {
        let fx = fixture();
        let slot = first_slot(&fx).await;
        let handle = hold(&fx, "user-1", &slot).await;
        fx.coordinator.release(&handle).await.unwrap();

        hold(&fx, "user-1", &slot).await;
        assert_eq!(remaining(&fx, &slot), 9);
    }

    #[tokio::test]
    async fn full_slot_is_rejected_without_recording() {
        let fx = fixture();
        let slot = first_slot(&fx).await;
        fx.store.set_remaining(slot.id, 0);

        let outcome = fx.coordinator.reserve("user-1", &slot).await.unwrap();
        assert_eq!(outcome, ReserveOutcome::Rejected(RejectReason::SlotFull));
        assert_eq!(remaining(&fx, &slot), 0);
        assert!(!fx.store.has_active_reservation("user-1", slot.date).await.unwrap());
    }

    #[tokio::test]
    async fn release_twice_restores_capacity_once() {
        let fx = fixture();
        let slot = first_slot(&fx).await;
        let handle = hold(&fx, "user-1", &slot).await;
        assert_eq!(remaining(&fx, &slot), 9);

        fx.coordinator.release(&handle).await.unwrap();
        fx.coordinator.release(&handle).await.unwrap();

        assert_eq!(remaining(&fx, &slot), 10);
        let reservation = fx.coordinator.get(handle.reservation_id).await.unwrap();
        assert_eq!(reservation.status, ReservationStatus::Released);
    }

    #[tokio::test]
    async fn reserve_release_cycles_conserve_capacity() {
        let fx = fixture();
        let slot = first_slot(&fx).await;

        for i in 0..25 {
            let handle = hold(&fx, &format!("user-{}", i), &slot).await;
            fx.coordinator.release(&handle).await.unwrap();
        }
        assert_eq!(remaining(&fx, &slot), 10);
    }

    #[tokio::test]
    async fn confirm_is_idempotent_and_keeps_first_order() {
        let fx = fixture();
        let slot = first_slot(&fx).await;
        let handle = hold(&fx, "user-1", &slot).await;

        fx.coordinator.confirm(&handle, "order-1").await.unwrap();
        fx.coordinator.confirm(&handle, "order-2").await.unwrap();

        let reservation = fx.coordinator.get(handle.reservation_id).await.unwrap();
        assert_eq!(reservation.status, ReservationStatus::Confirmed);
        assert_eq!(reservation.order_id.as_deref(), Some("order-1"));
        assert_eq!(remaining(&fx, &slot), 9);
    }

    #[tokio::test]
    async fn release_of_confirmed_requires_cancellation() {
        let fx = fixture();
        let slot = first_slot(&fx).await;
        let handle = hold(&fx, "user-1", &slot).await;
        fx.coordinator.confirm(&handle, "order-1").await.unwrap();

        let result = fx.coordinator.release(&handle).await;
        assert!(matches!(result, Err(DomainError::CannotReleaseConfirmed(_))));
        assert_eq!(remaining(&fx, &slot), 9);

        fx.coordinator.cancel(&handle).await.unwrap();
        fx.coordinator.cancel(&handle).await.unwrap();
        assert_eq!(remaining(&fx, &slot), 10);
        let reservation = fx.coordinator.get(handle.reservation_id).await.unwrap();
        assert_eq!(reservation.status, ReservationStatus::Cancelled);
    }

    #[tokio::test]
    async fn confirm_after_release_fails() {
        let fx = fixture();
        let slot = first_slot(&fx).await;
        let handle = hold(&fx, "user-1", &slot).await;
        fx.coordinator.release(&handle).await.unwrap();

        let result = fx.coordinator.confirm(&handle, "order-1").await;
        assert!(matches!(
            result,
            Err(DomainError::HoldNotActive { status: ReservationStatus::Released, .. })
        ));
    }

    #[tokio::test]
    async fn expired_hold_cannot_be_confirmed_and_returns_capacity() {
        let fx = fixture();
        let slot = first_slot(&fx).await;
        let handle = hold(&fx, "user-1", &slot).await;

        fx.clock.advance(Duration::seconds(301));

        let result = fx.coordinator.confirm(&handle, "order-1").await;
        assert!(matches!(
            result,
            Err(DomainError::HoldNotActive { status: ReservationStatus::Expired, .. })
        ));
        assert_eq!(remaining(&fx, &slot), 10);

        // Sweep finds nothing left to do
        assert_eq!(fx.coordinator.expire_overdue_holds().await.unwrap(), 0);
        assert_eq!(remaining(&fx, &slot), 10);
    }

    #[tokio::test]
    async fn stale_hold_does_not_block_new_reservation() {
        let fx = fixture();
        let slot = first_slot(&fx).await;
        let stale = hold(&fx, "user-1", &slot).await;
        fx.clock.advance(Duration::minutes(10));

        let fresh = hold(&fx, "user-1", &slot).await;

        assert_ne!(stale.reservation_id, fresh.reservation_id);
        assert_eq!(remaining(&fx, &slot), 9);
        let old = fx.coordinator.get(stale.reservation_id).await.unwrap();
        assert_eq!(old.status, ReservationStatus::Expired);
    }

    #[tokio::test]
    async fn slot_at_deactivated_location_cannot_be_held() {
        let fx = fixture();
        let date = next_weekday(fx.today);
        let grid = fx.loader.load(&MAIN_2.into(), date, Period::A).await.unwrap();
        let slot = grid.slots[0].clone();
        fx.directory.set_active(&MAIN_2.into(), false);

        let result = fx.coordinator.reserve("user-1", &slot).await;
        assert!(matches!(result, Err(DomainError::NotFound { entity: "Location", .. })));
        assert_eq!(remaining(&fx, &slot), 10);
        assert_eq!(fx.store.reservation_count(), 0);
    }

    #[tokio::test]
    async fn slot_whose_day_has_passed_cannot_be_held() {
        let fx = fixture();
        let slot = first_slot(&fx).await;
        fx.clock.advance(Duration::days(10));

        let result = fx.coordinator.reserve("user-1", &slot).await;
        assert!(matches!(result, Err(DomainError::NotFound { entity: "BookingDate", .. })));
        assert_eq!(remaining(&fx, &slot), 10);
    }

    #[tokio::test]
    async fn weekend_and_far_future_slots_cannot_be_held() {
        let fx = fixture();
        let saturday = NaiveDate::from_ymd_opt(2026, 10, 24).unwrap();
        let far = fx.today + Duration::days(120);
        let eleven = NaiveTime::from_hms_opt(11, 0, 0).unwrap();

        for date in [saturday, far] {
            let slot = fx.store.insert_slot(&MAIN_1.into(), date, Period::A, eleven, 10, 10);
            let result = fx.coordinator.reserve("user-1", &slot).await;
            assert!(matches!(result, Err(DomainError::NotFound { .. })), "{}", date);
            assert_eq!(remaining(&fx, &slot), 10);
        }
    }

    #[tokio::test]
    async fn failed_release_keeps_the_hold_releasable() {
        let fx = fixture();
        let (coordinator, store) = flaky(&fx);
        let slot = first_slot(&fx).await;
        let handle = coordinator.reserve("user-1", &slot).await.unwrap().handle().cloned().unwrap();

        store.arm();
        let first = coordinator.release(&handle).await;
        assert!(matches!(first, Err(DomainError::StoreUnavailable(_))));
        assert_eq!(remaining(&fx, &slot), 9);
        let reservation = coordinator.get(handle.reservation_id).await.unwrap();
        assert_eq!(reservation.status, ReservationStatus::Held);

        coordinator.release(&handle).await.unwrap();
        assert_eq!(remaining(&fx, &slot), 10);
    }

    #[tokio::test]
    async fn failed_hold_consumes_nothing() {
        let fx = fixture();
        let (coordinator, store) = flaky(&fx);
        let slot = first_slot(&fx).await;

        store.arm();
        let result = coordinator.reserve("user-1", &slot).await;
        assert!(matches!(result, Err(DomainError::StoreUnavailable(_))));
        assert_eq!(remaining(&fx, &slot), 10);
        assert!(!fx.store.has_active_reservation("user-1", slot.date).await.unwrap());

        coordinator.reserve("user-1", &slot).await.unwrap();
        assert_eq!(remaining(&fx, &slot), 9);
    }

    #[tokio::test]
    async fn sweep_retries_a_hold_it_failed_to_expire() {
        let fx = fixture();
        let (coordinator, store) = flaky(&fx);
        let slot = first_slot(&fx).await;
        coordinator.reserve("user-1", &slot).await.unwrap();
        fx.clock.advance(Duration::seconds(301));

        store.arm();
        assert_eq!(coordinator.expire_overdue_holds().await.unwrap(), 0);
        assert_eq!(remaining(&fx, &slot), 9);

        assert_eq!(coordinator.expire_overdue_holds().await.unwrap(), 1);
        assert_eq!(remaining(&fx, &slot), 10);
    }

    #[tokio::test]
    async fn unknown_reservation_is_not_found() {
        let fx = fixture();
        let result = fx.coordinator.handle(ReservationId(999)).await;
        assert!(matches!(result, Err(DomainError::NotFound { entity: "Reservation", .. })));
    }

    #[tokio::test]
    async fn capacity_changes_are_published() {
        let fx = fixture();
        let slot = first_slot(&fx).await;
        let mut events = fx.events.subscribe();

        let handle = hold(&fx, "user-1", &slot).await;
        fx.coordinator.release(&handle).await.unwrap();

        let mut deltas = Vec::new();
        while deltas.len() < 2 {
            let message = events.recv().await.unwrap();
            if let SlotEvent::SlotCapacityChanged(e) = message.event {
                deltas.push(e.delta);
            }
        }
        assert_eq!(deltas, vec![-1, 1]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reservations_never_oversell() {
        let fx = fixture();
        let date = next_weekday(fx.today);
        let slot = fx.store.insert_slot(
            &MAIN_1.into(),
            date,
            Period::B,
            NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            5,
            5,
        );
        let coordinator = fx.coordinator.clone();

        let mut tasks = Vec::new();
        for i in 0..20 {
            let coordinator = coordinator.clone();
            let slot = slot.clone();
            tasks.push(tokio::spawn(async move {
                coordinator.reserve(&format!("user-{}", i), &slot).await
            }));
        }

        let mut held = 0;
        let mut full = 0;
        for task in tasks {
            match task.await.unwrap().unwrap() {
                ReserveOutcome::Held(_) => held += 1,
                ReserveOutcome::Rejected(RejectReason::SlotFull) => full += 1,
            }
        }

        assert_eq!(held, 5);
        assert_eq!(full, 15);
        assert_eq!(fx.store.remaining(slot.id), Some(0));
    }
}
