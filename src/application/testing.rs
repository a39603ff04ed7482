//! Shared wiring for application-layer tests

use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use super::events::{create_event_bus, SharedEventBus};
use super::reservations::ReservationCoordinator;
use super::scheduling::{
    BookingWindow, QuickQueue, SlotAllocator, SlotGridCache, SlotGridLoader, SlotTemplate,
};
use crate::domain::Location;
use crate::infrastructure::storage::{InMemoryLocationDirectory, InMemorySlotStore};
use crate::shared::utils::RetryConfig;
use crate::shared::FixedClock;

pub const MAIN_1: &str = "MAIN 1";
pub const MAIN_2: &str = "MAIN 2";

pub struct Fixture {
    pub today: NaiveDate,
    pub clock: FixedClock,
    pub store: Arc<InMemorySlotStore>,
    pub directory: Arc<InMemoryLocationDirectory>,
    pub events: SharedEventBus,
    pub loader: Arc<SlotGridLoader>,
    pub cache: Arc<SlotGridCache>,
    pub quick_queue: Arc<QuickQueue>,
    pub coordinator: Arc<ReservationCoordinator>,
}

/// Two active locations, default template, clock pinned to a Monday morning.
pub fn fixture() -> Fixture {
    let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
    let clock = FixedClock::at_date(today);
    let store = Arc::new(InMemorySlotStore::with_clock(Arc::new(clock.clone())));
    let directory = Arc::new(InMemoryLocationDirectory::new(vec![
        Location::new(MAIN_1, "Main Cafeteria"),
        Location::new(MAIN_2, "Student Center"),
    ]));
    let events = create_event_bus();

    let loader = Arc::new(
        SlotGridLoader::new(
            store.clone(),
            directory.clone(),
            SlotTemplate::default(),
            BookingWindow::default(),
            Arc::new(clock.clone()),
        )
        .with_read_retry(RetryConfig::none()),
    );
    let cache = Arc::new(SlotGridCache::new(
        loader.clone(),
        Duration::seconds(15),
        Arc::new(clock.clone()),
    ));
    let quick_queue = Arc::new(QuickQueue::new(
        cache.clone(),
        directory.clone(),
        SlotAllocator::default(),
    ));
    let coordinator = Arc::new(ReservationCoordinator::new(
        store.clone(),
        loader.clone(),
        events.clone(),
        Arc::new(clock.clone()),
        Duration::seconds(300),
    ));

    Fixture {
        today,
        clock,
        store,
        directory,
        events,
        loader,
        cache,
        quick_queue,
        coordinator,
    }
}

/// First school day strictly after `date`
pub fn next_weekday(date: NaiveDate) -> NaiveDate {
    let mut next = date + Duration::days(1);
    while matches!(next.weekday(), Weekday::Sat | Weekday::Sun) {
        next += Duration::days(1);
    }
    next
}
