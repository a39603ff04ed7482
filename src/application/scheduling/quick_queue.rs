//! QuickQueue: automatic lowest-wait slot selection across locations

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};

use super::allocator::{Allocation, SlotAllocator};
use super::cache::SlotGridCache;
use crate::domain::{LocationDirectory, LocationId, Period, SlotId};
use crate::shared::{DomainError, DomainResult};

pub struct QuickQueue {
    cache: Arc<SlotGridCache>,
    directory: Arc<dyn LocationDirectory>,
    allocator: SlotAllocator,
}

impl QuickQueue {
    pub fn new(
        cache: Arc<SlotGridCache>,
        directory: Arc<dyn LocationDirectory>,
        allocator: SlotAllocator,
    ) -> Self {
        Self {
            cache,
            directory,
            allocator,
        }
    }

    pub fn allocator(&self) -> &SlotAllocator {
        &self.allocator
    }

    /// Best slot among `locations` for the given day and period.
    ///
    /// Locations that are unknown or inactive are skipped; a date outside the
    /// booking window fails with `NotFound`.
    pub async fn find_optimal_slot(
        &self,
        locations: &[LocationId],
        date: NaiveDate,
        period: Period,
        preferred: Option<&LocationId>,
        exclude: &[SlotId],
    ) -> DomainResult<Allocation> {
        self.cache.loader().check_date(date)?;

        let mut grids = Vec::with_capacity(locations.len());
        for location_id in locations {
            match self.cache.get(location_id, date, period).await {
                Ok(grid) => grids.push(grid),
                Err(DomainError::NotFound { entity: "Location", .. }) => {
                    debug!(location_id = %location_id, "Skipping unavailable location");
                }
                Err(e) => return Err(e),
            }
        }

        let exclude: HashSet<SlotId> = exclude.iter().copied().collect();
        let allocation = self.allocator.find_optimal_slot(&grids, preferred, &exclude);

        match &allocation {
            Allocation::Available(slot) => {
                metrics::counter!("lunchline_allocations_total", "result" => "found").increment(1);
                info!(
                    slot_id = %slot.id,
                    location_id = %slot.location_id,
                    start_time = %slot.start_time,
                    remaining = slot.remaining,
                    preferred = ?preferred.map(LocationId::as_str),
                    "QuickQueue selected slot"
                );
            }
            Allocation::NotAvailable => {
                metrics::counter!("lunchline_allocations_total", "result" => "not_available")
                    .increment(1);
                info!(%date, period = %period, locations = grids.len(), "No slot available");
            }
        }

        Ok(allocation)
    }

    /// Same as [`find_optimal_slot`](Self::find_optimal_slot) over every active location.
    pub async fn find_optimal_slot_for_active(
        &self,
        date: NaiveDate,
        period: Period,
        preferred: Option<&LocationId>,
        exclude: &[SlotId],
    ) -> DomainResult<Allocation> {
        let locations: Vec<LocationId> = self
            .directory
            .list_active_locations()
            .await?
            .into_iter()
            .map(|l| l.id)
            .collect();
        self.find_optimal_slot(&locations, date, period, preferred, exclude)
            .await
    }
}
