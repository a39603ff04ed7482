//! In-memory slot store and location directory for development and testing

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::domain::{
    Location, LocationDirectory, LocationId, NewReservation, Period, Reservation, ReservationId,
    ReservationStatus, SlotId, SlotSpec, SlotStore, TimeSlot,
};
use crate::shared::{DomainError, DomainResult, SharedClock, SystemClock};

type SlotKey = (LocationId, NaiveDate, Period, NaiveTime);

/// In-memory slot store.
///
/// Each slot lives in its own `DashMap` entry, so the conditional decrement
/// and increment run under that entry's lock and are atomic. Locks are only
/// ever nested user-day → reservation → slot.
pub struct InMemorySlotStore {
    slots: DashMap<SlotId, TimeSlot>,
    slot_keys: DashMap<SlotKey, SlotId>,
    reservations: DashMap<ReservationId, Reservation>,
    active_by_user_day: DashMap<(String, NaiveDate), ReservationId>,
    slot_counter: AtomicI64,
    reservation_counter: AtomicI64,
    clock: SharedClock,
}

impl InMemorySlotStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Store whose reservation timestamps come from `clock`
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            slots: DashMap::new(),
            slot_keys: DashMap::new(),
            reservations: DashMap::new(),
            active_by_user_day: DashMap::new(),
            slot_counter: AtomicI64::new(1),
            reservation_counter: AtomicI64::new(1),
            clock,
        }
    }

    /// Insert (or return the existing) slot with explicit remaining capacity
    pub fn insert_slot(
        &self,
        location_id: &LocationId,
        date: NaiveDate,
        period: Period,
        start_time: NaiveTime,
        capacity: u32,
        remaining: u32,
    ) -> TimeSlot {
        let key = (location_id.clone(), date, period, start_time);
        match self.slot_keys.entry(key) {
            Entry::Occupied(e) => {
                let id = *e.get();
                drop(e);
                match self.slots.get(&id).map(|s| s.clone()) {
                    Some(slot) => slot,
                    None => self.new_slot(
                        id,
                        location_id,
                        date,
                        period,
                        start_time,
                        capacity,
                        remaining,
                    ),
                }
            }
            Entry::Vacant(e) => {
                let id = SlotId(self.slot_counter.fetch_add(1, Ordering::SeqCst));
                e.insert(id);
                self.new_slot(id, location_id, date, period, start_time, capacity, remaining)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn new_slot(
        &self,
        id: SlotId,
        location_id: &LocationId,
        date: NaiveDate,
        period: Period,
        start_time: NaiveTime,
        capacity: u32,
        remaining: u32,
    ) -> TimeSlot {
        let slot = TimeSlot {
            id,
            location_id: location_id.clone(),
            date,
            period,
            start_time,
            capacity,
            remaining: remaining.min(capacity),
        };
        self.slots.insert(id, slot.clone());
        slot
    }

    /// Overwrite remaining capacity (clamped to capacity). False if the slot is unknown.
    pub fn set_remaining(&self, slot_id: SlotId, remaining: u32) -> bool {
        match self.slots.get_mut(&slot_id) {
            Some(mut slot) => {
                slot.remaining = remaining.min(slot.capacity);
                true
            }
            None => false,
        }
    }

    pub fn remaining(&self, slot_id: SlotId) -> Option<u32> {
        self.slots.get(&slot_id).map(|s| s.remaining)
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn reservation_count(&self) -> usize {
        self.reservations.len()
    }
}

impl InMemorySlotStore {
    fn held(&self, id: ReservationId, new: NewReservation) -> Reservation {
        let now = self.clock.now();
        Reservation {
            id,
            user_id: new.user_id,
            slot_id: new.slot_id,
            date: new.date,
            status: ReservationStatus::Held,
            order_id: None,
            expires_at: new.expires_at,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for InMemorySlotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SlotStore for InMemorySlotStore {
    async fn get_slots(
        &self,
        location_id: &LocationId,
        date: NaiveDate,
        period: Period,
    ) -> DomainResult<Vec<TimeSlot>> {
        let mut slots: Vec<TimeSlot> = self
            .slots
            .iter()
            .filter(|s| &s.location_id == location_id && s.date == date && s.period == period)
            .map(|s| s.value().clone())
            .collect();
        slots.sort_by_key(|s| s.start_time);
        Ok(slots)
    }

    async fn get_slot(&self, slot_id: SlotId) -> DomainResult<Option<TimeSlot>> {
        Ok(self.slots.get(&slot_id).map(|s| s.clone()))
    }

    async fn materialize_slots(&self, specs: &[SlotSpec]) -> DomainResult<u64> {
        let mut created = 0;
        for spec in specs {
            let key = (spec.location_id.clone(), spec.date, spec.period, spec.start_time);
            if let Entry::Vacant(e) = self.slot_keys.entry(key) {
                let id = SlotId(self.slot_counter.fetch_add(1, Ordering::SeqCst));
                e.insert(id);
                self.new_slot(
                    id,
                    &spec.location_id,
                    spec.date,
                    spec.period,
                    spec.start_time,
                    spec.capacity,
                    spec.capacity,
                );
                created += 1;
            }
        }
        Ok(created)
    }

    async fn try_decrement(&self, slot_id: SlotId) -> DomainResult<bool> {
        match self.slots.get_mut(&slot_id) {
            Some(mut slot) if slot.remaining > 0 => {
                slot.remaining -= 1;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(DomainError::not_found("TimeSlot", "id", slot_id)),
        }
    }

    async fn increment(&self, slot_id: SlotId) -> DomainResult<()> {
        match self.slots.get_mut(&slot_id) {
            Some(mut slot) => {
                if slot.remaining < slot.capacity {
                    slot.remaining += 1;
                }
                Ok(())
            }
            None => Err(DomainError::not_found("TimeSlot", "id", slot_id)),
        }
    }

    async fn has_active_reservation(&self, user_id: &str, date: NaiveDate) -> DomainResult<bool> {
        Ok(self
            .active_by_user_day
            .contains_key(&(user_id.to_string(), date)))
    }

    async fn find_active_reservation(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> DomainResult<Option<Reservation>> {
        let id = match self.active_by_user_day.get(&(user_id.to_string(), date)) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.reservations.get(&id).map(|r| r.clone()))
    }

    async fn record_reservation(&self, new: NewReservation) -> DomainResult<ReservationId> {
        let id = ReservationId(self.reservation_counter.fetch_add(1, Ordering::SeqCst));

        match self.active_by_user_day.entry((new.user_id.clone(), new.date)) {
            Entry::Occupied(_) => {
                return Err(DomainError::DuplicateReservation {
                    user_id: new.user_id,
                    date: new.date,
                })
            }
            Entry::Vacant(e) => {
                e.insert(id);
            }
        }

        self.reservations.insert(id, self.held(id, new));
        Ok(id)
    }

    async fn find_reservation(&self, id: ReservationId) -> DomainResult<Option<Reservation>> {
        Ok(self.reservations.get(&id).map(|r| r.clone()))
    }

    async fn confirm_reservation(&self, id: ReservationId, order_id: &str) -> DomainResult<bool> {
        match self.reservations.get_mut(&id) {
            Some(mut r) if r.status == ReservationStatus::Held => {
                r.status = ReservationStatus::Confirmed;
                r.order_id = Some(order_id.to_string());
                r.updated_at = self.clock.now();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(DomainError::not_found("Reservation", "id", id)),
        }
    }

    async fn void_reservation(
        &self,
        id: ReservationId,
        status: ReservationStatus,
    ) -> DomainResult<bool> {
        let key = {
            let mut r = match self.reservations.get_mut(&id) {
                Some(r) => r,
                None => return Err(DomainError::not_found("Reservation", "id", id)),
            };
            if !status.voidable_from().contains(&r.status) {
                return Ok(false);
            }
            r.status = status;
            r.updated_at = self.clock.now();
            (r.user_id.clone(), r.date)
        };

        self.active_by_user_day.remove_if(&key, |_, active| *active == id);
        Ok(true)
    }

    async fn hold_slot(&self, new: NewReservation) -> DomainResult<Option<ReservationId>> {
        let day = match self.active_by_user_day.entry((new.user_id.clone(), new.date)) {
            Entry::Occupied(_) => {
                return Err(DomainError::DuplicateReservation {
                    user_id: new.user_id,
                    date: new.date,
                })
            }
            Entry::Vacant(e) => e,
        };

        match self.slots.get_mut(&new.slot_id) {
            Some(mut slot) if slot.remaining > 0 => slot.remaining -= 1,
            Some(_) => return Ok(None),
            None => return Err(DomainError::not_found("TimeSlot", "id", new.slot_id)),
        }

        let id = ReservationId(self.reservation_counter.fetch_add(1, Ordering::SeqCst));
        self.reservations.insert(id, self.held(id, new));
        day.insert(id);
        Ok(Some(id))
    }

    async fn release_reservation(
        &self,
        id: ReservationId,
        status: ReservationStatus,
    ) -> DomainResult<bool> {
        let key = {
            let mut r = match self.reservations.get_mut(&id) {
                Some(r) => r,
                None => return Err(DomainError::not_found("Reservation", "id", id)),
            };
            if !status.voidable_from().contains(&r.status) {
                return Ok(false);
            }
            match self.slots.get_mut(&r.slot_id) {
                Some(mut slot) => {
                    if slot.remaining < slot.capacity {
                        slot.remaining += 1;
                    }
                }
                None => return Err(DomainError::not_found("TimeSlot", "id", r.slot_id)),
            }
            r.status = status;
            r.updated_at = self.clock.now();
            (r.user_id.clone(), r.date)
        };

        self.active_by_user_day.remove_if(&key, |_, active| *active == id);
        Ok(true)
    }

    async fn find_expired_holds(&self, now: DateTime<Utc>) -> DomainResult<Vec<Reservation>> {
        Ok(self
            .reservations
            .iter()
            .filter(|r| r.is_hold_expired(now))
            .map(|r| r.value().clone())
            .collect())
    }

    async fn ping(&self) -> DomainResult<()> {
        Ok(())
    }
}

/// In-memory location directory
pub struct InMemoryLocationDirectory {
    locations: DashMap<LocationId, Location>,
}

impl InMemoryLocationDirectory {
    pub fn new(locations: Vec<Location>) -> Self {
        let map = DashMap::new();
        for location in locations {
            map.insert(location.id.clone(), location);
        }
        Self { locations: map }
    }

    pub fn upsert(&self, location: Location) {
        self.locations.insert(location.id.clone(), location);
    }

    pub fn set_active(&self, id: &LocationId, active: bool) -> bool {
        match self.locations.get_mut(id) {
            Some(mut location) => {
                location.is_active = active;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl LocationDirectory for InMemoryLocationDirectory {
    async fn list_active_locations(&self) -> DomainResult<Vec<Location>> {
        let mut active: Vec<Location> = self
            .locations
            .iter()
            .filter(|l| l.is_active)
            .map(|l| l.value().clone())
            .collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(active)
    }

    async fn find_by_id(&self, id: &LocationId) -> DomainResult<Option<Location>> {
        Ok(self.locations.get(id).map(|l| l.clone()))
    }
}
