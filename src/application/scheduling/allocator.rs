//! Optimal slot selection (QuickQueue cost model)

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use super::grid::SlotGrid;
use crate::domain::{LocationId, SlotId, TimeSlot};

/// Estimated wait, in minutes-equivalent, of picking up from `slot`.
pub trait WaitCostPolicy: Send + Sync {
    fn wait_cost(&self, slot: &TimeSlot) -> f64;
}

/// `base_unit * (1 + occupancy)`: emptier slots are cheaper.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OccupancyWaitCost {
    pub base_unit_minutes: f64,
}

impl Default for OccupancyWaitCost {
    fn default() -> Self {
        Self {
            base_unit_minutes: 5.0,
        }
    }
}

impl WaitCostPolicy for OccupancyWaitCost {
    fn wait_cost(&self, slot: &TimeSlot) -> f64 {
        self.base_unit_minutes * (1.0 + slot.occupancy())
    }
}

/// Result of a slot search. `NotAvailable` is a normal outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", content = "slot", rename_all = "snake_case")]
pub enum Allocation {
    Available(TimeSlot),
    NotAvailable,
}

impl Allocation {
    pub fn slot(&self) -> Option<&TimeSlot> {
        match self {
            Allocation::Available(slot) => Some(slot),
            Allocation::NotAvailable => None,
        }
    }

    pub fn into_slot(self) -> Option<TimeSlot> {
        match self {
            Allocation::Available(slot) => Some(slot),
            Allocation::NotAvailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Allocation::Available(_))
    }
}

#[derive(Clone)]
pub struct SlotAllocator {
    policy: Arc<dyn WaitCostPolicy>,
}

impl SlotAllocator {
    pub fn new(policy: Arc<dyn WaitCostPolicy>) -> Self {
        Self { policy }
    }

    pub fn wait_cost(&self, slot: &TimeSlot) -> f64 {
        self.policy.wait_cost(slot)
    }

    /// Pick the cheapest open slot, preferring `preferred` when it has any.
    ///
    /// Ties on cost go to the earliest start, then the lowest location id.
    /// Slots in `exclude` are skipped (they were found full moments ago).
    pub fn find_optimal_slot(
        &self,
        grids: &[SlotGrid],
        preferred: Option<&LocationId>,
        exclude: &HashSet<SlotId>,
    ) -> Allocation {
        if let Some(preferred) = preferred {
            let scoped = grids.iter().filter(|g| &g.location_id == preferred);
            if let Some(slot) = self.best(scoped, exclude) {
                return Allocation::Available(slot.clone());
            }
        }

        match self.best(grids.iter(), exclude) {
            Some(slot) => Allocation::Available(slot.clone()),
            None => Allocation::NotAvailable,
        }
    }

    fn best<'a>(
        &self,
        grids: impl Iterator<Item = &'a SlotGrid>,
        exclude: &HashSet<SlotId>,
    ) -> Option<&'a TimeSlot> {
        grids
            .flat_map(|g| g.slots.iter())
            .filter(|s| s.is_available() && !exclude.contains(&s.id))
            .map(|s| (self.policy.wait_cost(s), s))
            .min_by(|(cost_a, a), (cost_b, b)| {
                cost_a
                    .total_cmp(cost_b)
                    .then_with(|| a.start_time.cmp(&b.start_time))
                    .then_with(|| a.location_id.cmp(&b.location_id))
            })
            .map(|(_, s)| s)
    }
}

impl Default for SlotAllocator {
    fn default() -> Self {
        Self::new(Arc::new(OccupancyWaitCost::default()))
    }
}
