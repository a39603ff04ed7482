use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::application::{SlotAllocator, SlotGrid};
use crate::domain::TimeSlot;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SlotGridParams {
    /// School day, `YYYY-MM-DD`
    pub date: NaiveDate,
    /// Lunch period, `A` or `B`
    pub period: String,
    pub location_id: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OptimalSlotParams {
    pub date: NaiveDate,
    pub period: String,
    /// Location tried first; every active location is the fallback
    pub preferred_location: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SlotDto {
    pub id: i64,
    pub location_id: String,
    pub date: NaiveDate,
    pub period: String,
    /// Pickup time, `HH:MM`
    pub start_time: String,
    pub capacity: u32,
    pub remaining: u32,
    /// Estimated wait at pickup, in minutes
    pub wait_cost: f64,
}

impl SlotDto {
    pub fn new(slot: &TimeSlot, allocator: &SlotAllocator) -> Self {
        Self {
            id: slot.id.0,
            location_id: slot.location_id.to_string(),
            date: slot.date,
            period: slot.period.to_string(),
            start_time: slot.start_time.format("%H:%M").to_string(),
            capacity: slot.capacity,
            remaining: slot.remaining,
            wait_cost: allocator.wait_cost(slot),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SlotGridDto {
    pub location_id: String,
    pub date: NaiveDate,
    pub period: String,
    pub total_remaining: u32,
    pub slots: Vec<SlotDto>,
}

impl SlotGridDto {
    pub fn new(grid: &SlotGrid, allocator: &SlotAllocator) -> Self {
        Self {
            location_id: grid.location_id.to_string(),
            date: grid.date,
            period: grid.period.to_string(),
            total_remaining: grid.total_remaining(),
            slots: grid.slots.iter().map(|s| SlotDto::new(s, allocator)).collect(),
        }
    }
}
