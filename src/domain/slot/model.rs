//! TimeSlot domain entity

use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::period::Period;
use crate::domain::location::LocationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(pub i64);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One pickup window at one location on one day.
///
/// Invariant: `remaining <= capacity`. Capacity values read from the store
/// are a snapshot; only the store may change `remaining`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: SlotId,
    pub location_id: LocationId,
    pub date: NaiveDate,
    pub period: Period,
    pub start_time: NaiveTime,
    pub capacity: u32,
    pub remaining: u32,
}

impl TimeSlot {
    pub fn is_available(&self) -> bool {
        self.remaining > 0
    }

    /// Fraction of capacity already consumed, 0.0 for an empty slot.
    pub fn occupancy(&self) -> f64 {
        if self.capacity == 0 {
            return 1.0;
        }
        1.0 - f64::from(self.remaining) / f64::from(self.capacity)
    }
}

/// A slot to be generated; the store assigns the ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSpec {
    pub location_id: LocationId,
    pub date: NaiveDate,
    pub period: Period,
    pub start_time: NaiveTime,
    pub capacity: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(capacity: u32, remaining: u32) -> TimeSlot {
        TimeSlot {
            id: SlotId(1),
            location_id: LocationId::new("MAIN 1"),
            date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            period: Period::A,
            start_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            capacity,
            remaining,
        }
    }

    #[test]
    fn occupancy_tracks_consumed_fraction() {
        assert_eq!(slot(10, 10).occupancy(), 0.0);
        assert_eq!(slot(10, 5).occupancy(), 0.5);
        assert_eq!(slot(10, 0).occupancy(), 1.0);
    }

    #[test]
    fn empty_capacity_is_never_available() {
        let s = slot(0, 0);
        assert!(!s.is_available());
        assert_eq!(s.occupancy(), 1.0);
    }
}
