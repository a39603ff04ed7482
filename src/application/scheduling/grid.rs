//! Slot grids and the loader that reads them from the slot store

use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;
use tracing::{debug, info};

use super::template::SlotTemplate;
use crate::domain::{
    Location, LocationDirectory, LocationId, Period, PeriodWindow, SlotId, SlotStore, TimeSlot,
};
use crate::shared::utils::{retry_with_backoff, RetryConfig};
use crate::shared::{DomainError, DomainResult, SharedClock};

/// One location's slots for one date and period, ascending by start time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotGrid {
    pub location_id: LocationId,
    pub date: NaiveDate,
    pub period: Period,
    pub slots: Vec<TimeSlot>,
}

impl SlotGrid {
    pub fn new(
        location_id: LocationId,
        date: NaiveDate,
        period: Period,
        mut slots: Vec<TimeSlot>,
    ) -> Self {
        slots.sort_by_key(|s| s.start_time);
        Self {
            location_id,
            date,
            period,
            slots,
        }
    }

    pub fn contains(&self, slot_id: SlotId) -> bool {
        self.slots.iter().any(|s| s.id == slot_id)
    }

    pub fn total_remaining(&self) -> u32 {
        self.slots.iter().map(|s| s.remaining).sum()
    }

    pub fn has_availability(&self) -> bool {
        self.slots.iter().any(TimeSlot::is_available)
    }
}

/// Which calendar days may be booked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingWindow {
    pub window_days: u32,
    pub skip_weekends: bool,
    pub timezone_offset_minutes: i32,
}

impl Default for BookingWindow {
    fn default() -> Self {
        Self {
            window_days: 90,
            skip_weekends: true,
            timezone_offset_minutes: 0,
        }
    }
}

impl BookingWindow {
    pub fn is_weekend(date: NaiveDate) -> bool {
        matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// Ok if `date` is within `today ..= today + window_days` and is a school day.
    pub fn check(&self, date: NaiveDate, today: NaiveDate) -> DomainResult<()> {
        let last = today + Duration::days(i64::from(self.window_days));
        if date < today || date > last {
            return Err(DomainError::not_found(
                "BookingDate",
                "date",
                format!("{} (window {}..{})", date, today, last),
            ));
        }
        if self.skip_weekends && Self::is_weekend(date) {
            return Err(DomainError::not_found(
                "BookingDate",
                "date",
                format!("{} (weekend)", date),
            ));
        }
        Ok(())
    }

    /// Bookable days starting today, in order
    pub fn days(&self, today: NaiveDate) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..=i64::from(self.window_days))
            .map(move |offset| today + Duration::days(offset))
            .filter(move |date| !(self.skip_weekends && Self::is_weekend(*date)))
    }
}

/// Builds [`SlotGrid`]s from the store, generating template slots on first use.
pub struct SlotGridLoader {
    store: Arc<dyn SlotStore>,
    directory: Arc<dyn LocationDirectory>,
    template: SlotTemplate,
    booking: BookingWindow,
    clock: SharedClock,
    read_retry: RetryConfig,
}

impl SlotGridLoader {
    pub fn new(
        store: Arc<dyn SlotStore>,
        directory: Arc<dyn LocationDirectory>,
        template: SlotTemplate,
        booking: BookingWindow,
        clock: SharedClock,
    ) -> Self {
        Self {
            store,
            directory,
            template,
            booking,
            clock,
            read_retry: RetryConfig::default(),
        }
    }

    pub fn with_read_retry(mut self, read_retry: RetryConfig) -> Self {
        self.read_retry = read_retry;
        self
    }

    pub fn period_window(&self, period: Period) -> PeriodWindow {
        self.template.period_window(period)
    }

    pub fn booking_window(&self) -> &BookingWindow {
        &self.booking
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today(self.booking.timezone_offset_minutes)
    }

    /// Fails with `NotFound` when the date is outside the booking window.
    pub fn check_date(&self, date: NaiveDate) -> DomainResult<()> {
        self.booking.check(date, self.today())
    }

    /// Fails with `NotFound` when the location is unknown or inactive.
    pub async fn check_location(&self, location_id: &LocationId) -> DomainResult<()> {
        match self.directory.find_by_id(location_id).await? {
            Some(location) if location.is_active => Ok(()),
            _ => Err(DomainError::not_found("Location", "id", location_id)),
        }
    }

    /// Whether `slot` may be booked today: its date is inside the booking
    /// window and its location is active.
    pub async fn check_bookable(&self, slot: &TimeSlot) -> DomainResult<()> {
        self.check_date(slot.date)?;
        self.check_location(&slot.location_id).await
    }

    /// Load the grid for one location/day/period.
    ///
    /// # Errors
    /// - `NotFound` if the location is unknown or inactive, or the date is
    ///   outside the booking window
    /// - `StoreUnavailable` if the store keeps failing after retries
    pub async fn load(
        &self,
        location_id: &LocationId,
        date: NaiveDate,
        period: Period,
    ) -> DomainResult<SlotGrid> {
        self.check_date(date)?;
        self.check_location(location_id).await?;

        let mut slots = self.read_slots(location_id, date, period).await?;
        if slots.is_empty() {
            let specs = self.template.generate(location_id, date, period);
            let created = self.store.materialize_slots(&specs).await?;
            debug!(
                location_id = %location_id,
                %date,
                period = %period,
                created,
                "Materialized slot template"
            );
            slots = self.read_slots(location_id, date, period).await?;
        }

        Ok(SlotGrid::new(location_id.clone(), date, period, slots))
    }

    /// Pre-generate slots for every active location over the booking window.
    /// Returns the number of slots created.
    pub async fn materialize_window(
        &self,
        locations: &[Location],
        period: Period,
    ) -> DomainResult<u64> {
        let today = self.today();
        let mut created = 0;

        for date in self.booking.days(today) {
            let specs: Vec<_> = locations
                .iter()
                .filter(|l| l.is_active)
                .flat_map(|l| self.template.generate(&l.id, date, period))
                .collect();
            if specs.is_empty() {
                continue;
            }
            created += self.store.materialize_slots(&specs).await?;
        }

        info!(
            period = %period,
            locations = locations.len(),
            window_days = self.booking.window_days,
            created,
            "Booking window materialized"
        );
        Ok(created)
    }

    async fn read_slots(
        &self,
        location_id: &LocationId,
        date: NaiveDate,
        period: Period,
    ) -> DomainResult<Vec<TimeSlot>> {
        let store = &self.store;
        retry_with_backoff(
            self.read_retry.clone(),
            move || async move { store.get_slots(location_id, date, period).await },
            DomainError::is_transient,
            "get_slots",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{fixture, next_weekday, MAIN_1, MAIN_2};
    use chrono::NaiveTime;

    #[test]
    fn booking_window_bounds_are_inclusive() {
        let window = BookingWindow {
            window_days: 2,
            skip_weekends: false,
            timezone_offset_minutes: 0,
        };
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();

        assert!(window.check(today, today).is_ok());
        assert!(window.check(today + Duration::days(2), today).is_ok());
        assert!(window.check(today + Duration::days(3), today).is_err());
        assert!(window.check(today - Duration::days(1), today).is_err());
    }

    #[test]
    fn weekends_are_excluded_when_configured() {
        let window = BookingWindow::default();
        let monday = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let saturday = NaiveDate::from_ymd_opt(2026, 10, 24).unwrap();

        assert!(matches!(
            window.check(saturday, monday),
            Err(DomainError::NotFound { .. })
        ));
        let days: Vec<_> = window.days(monday).take(6).collect();
        assert!(days.iter().all(|d| !BookingWindow::is_weekend(*d)));
        assert_eq!(days[5], NaiveDate::from_ymd_opt(2026, 10, 26).unwrap());
    }

    #[tokio::test]
    async fn load_materializes_template_once_in_start_order() {
        let fx = fixture();
        let date = next_weekday(fx.today);

        let grid = fx.loader.load(&MAIN_1.into(), date, Period::A).await.unwrap();
        assert_eq!(grid.slots.len(), 12);
        assert_eq!(grid.slots[0].start_time, NaiveTime::from_hms_opt(11, 0, 0).unwrap());
        assert!(grid.slots.windows(2).all(|w| w[0].start_time < w[1].start_time));
        assert!(grid.slots.iter().all(|s| s.remaining == 10 && s.capacity == 10));

        let again = fx.loader.load(&MAIN_1.into(), date, Period::A).await.unwrap();
        assert_eq!(grid.slots, again.slots);
        assert_eq!(fx.store.slot_count(), 12);
    }

    #[tokio::test]
    async fn inactive_or_unknown_location_is_not_found() {
        let fx = fixture();
        fx.directory.set_active(&MAIN_2.into(), false);
        let date = next_weekday(fx.today);

        let inactive = fx.loader.load(&MAIN_2.into(), date, Period::A).await;
        assert!(matches!(inactive, Err(DomainError::NotFound { entity: "Location", .. })));

        let unknown = fx.loader.load(&"ANNEX".into(), date, Period::A).await;
        assert!(matches!(unknown, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn out_of_window_date_is_not_found() {
        let fx = fixture();
        let past = fx.today - Duration::days(1);
        let far = fx.today + Duration::days(365);

        assert!(matches!(
            fx.loader.load(&MAIN_1.into(), past, Period::A).await,
            Err(DomainError::NotFound { entity: "BookingDate", .. })
        ));
        assert!(fx.loader.load(&MAIN_1.into(), far, Period::A).await.is_err());
    }

    #[tokio::test]
    async fn loaded_slot_stops_being_bookable_when_its_day_passes() {
        let fx = fixture();
        let date = next_weekday(fx.today);
        let slot = fx.loader.load(&MAIN_1.into(), date, Period::A).await.unwrap().slots[0].clone();
        fx.loader.check_bookable(&slot).await.unwrap();

        fx.clock.advance(Duration::days(10));
        assert!(matches!(
            fx.loader.check_bookable(&slot).await,
            Err(DomainError::NotFound { entity: "BookingDate", .. })
        ));
    }

    #[tokio::test]
    async fn materialize_window_skips_weekends_and_is_idempotent() {
        let fx = fixture();
        let locations = fx.directory.list_active_locations().await.unwrap();

        let created = fx.loader.materialize_window(&locations, Period::B).await.unwrap();
        let school_days = fx.loader.booking_window().days(fx.today).count() as u64;
        assert_eq!(created, school_days * 2 * 12);

        let second = fx.loader.materialize_window(&locations, Period::B).await.unwrap();
        assert_eq!(second, 0);
    }
}
