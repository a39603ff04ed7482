//! Slot grid cache
//!
//! Snapshots are advisory: the store re-validates capacity on every
//! reservation, so a stale entry can only cause a `SlotFull` retry, never an
//! oversell. Entries are refreshed lazily once older than the refresh
//! interval and dropped whenever the event bus reports a capacity change.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::grid::{SlotGrid, SlotGridLoader};
use crate::application::events::{SharedEventBus, SlotEvent};
use crate::domain::{LocationId, Period, SlotId};
use crate::shared::{DomainResult, SharedClock, ShutdownSignal};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GridKey {
    pub location_id: LocationId,
    pub date: NaiveDate,
    pub period: Period,
}

struct CachedGrid {
    grid: SlotGrid,
    loaded_at: DateTime<Utc>,
}

pub struct SlotGridCache {
    loader: Arc<SlotGridLoader>,
    entries: DashMap<GridKey, CachedGrid>,
    refresh_interval: Duration,
    clock: SharedClock,
}

impl SlotGridCache {
    pub fn new(
        loader: Arc<SlotGridLoader>,
        refresh_interval: Duration,
        clock: SharedClock,
    ) -> Self {
        Self {
            loader,
            entries: DashMap::new(),
            refresh_interval,
            clock,
        }
    }

    pub fn loader(&self) -> &Arc<SlotGridLoader> {
        &self.loader
    }

    /// Cloned snapshot for the caller, reloaded if missing or stale.
    pub async fn get(
        &self,
        location_id: &LocationId,
        date: NaiveDate,
        period: Period,
    ) -> DomainResult<SlotGrid> {
        let key = GridKey {
            location_id: location_id.clone(),
            date,
            period,
        };
        let now = self.clock.now();

        if let Some(entry) = self.entries.get(&key) {
            if now - entry.loaded_at < self.refresh_interval {
                return Ok(entry.grid.clone());
            }
        }

        let grid = self.loader.load(location_id, date, period).await?;
        self.entries.insert(
            key,
            CachedGrid {
                grid: grid.clone(),
                loaded_at: now,
            },
        );
        Ok(grid)
    }

    pub fn invalidate(&self, key: &GridKey) {
        self.entries.remove(key);
    }

    /// Drop every snapshot containing `slot_id`
    pub fn invalidate_slot(&self, slot_id: SlotId) {
        self.entries.retain(|_, cached| !cached.grid.contains(slot_id));
    }

    pub fn invalidate_all(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Invalidate cached grids whenever slot capacity changes.
pub fn start_cache_invalidation_listener(
    cache: Arc<SlotGridCache>,
    events: SharedEventBus,
    shutdown: ShutdownSignal,
) -> JoinHandle<()> {
    let mut subscriber = events.subscribe();

    tokio::spawn(async move {
        info!("Slot grid cache listener started");

        loop {
            tokio::select! {
                message = subscriber.recv() => {
                    match message {
                        Some(message) => {
                            if let SlotEvent::SlotCapacityChanged(event) = &message.event {
                                debug!(
                                    slot_id = %event.slot_id,
                                    delta = event.delta,
                                    "Invalidating cached grid"
                                );
                                cache.invalidate_slot(event.slot_id);
                            }
                        }
                        None => break,
                    }
                }
                _ = shutdown.notified().wait() => {
                    break;
                }
            }
        }

        info!("Slot grid cache listener stopped");
    })
}
