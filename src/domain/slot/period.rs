//! Lunch periods and their slot windows

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::shared::{DomainError, DomainResult};

/// Slot widths the generator supports.
pub const SUPPORTED_GRANULARITIES: [u32; 3] = [5, 15, 30];

/// Named daily lunch window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Period {
    A,
    B,
}

impl Period {
    pub const ALL: [Period; 2] = [Period::A, Period::B];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Self::A),
            "B" | "b" => Ok(Self::B),
            other => Err(DomainError::Validation(format!(
                "Unknown lunch period '{}', expected A or B",
                other
            ))),
        }
    }
}

/// Start time, slot width and length of one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodWindow {
    pub period_start_time: NaiveTime,
    pub slot_granularity_minutes: u32,
    pub period_duration_minutes: u32,
}

impl PeriodWindow {
    pub fn new(
        period_start_time: NaiveTime,
        slot_granularity_minutes: u32,
        period_duration_minutes: u32,
    ) -> DomainResult<Self> {
        let window = Self {
            period_start_time,
            slot_granularity_minutes,
            period_duration_minutes,
        };
        window.validate()?;
        Ok(window)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if !SUPPORTED_GRANULARITIES.contains(&self.slot_granularity_minutes) {
            return Err(DomainError::Validation(format!(
                "Slot granularity must be one of {:?} minutes, got {}",
                SUPPORTED_GRANULARITIES, self.slot_granularity_minutes
            )));
        }
        if self.period_duration_minutes == 0
            || self.period_duration_minutes % self.slot_granularity_minutes != 0
        {
            return Err(DomainError::Validation(format!(
                "Period duration {} is not a positive multiple of {} minutes",
                self.period_duration_minutes, self.slot_granularity_minutes
            )));
        }
        let end = self.period_start_time
            + Duration::minutes(i64::from(self.period_duration_minutes));
        if end <= self.period_start_time {
            return Err(DomainError::Validation(
                "Period must end on the same day it starts".to_string(),
            ));
        }
        Ok(())
    }

    pub fn slot_count(&self) -> u32 {
        self.period_duration_minutes / self.slot_granularity_minutes
    }

    /// Slot start times in ascending order
    pub fn slot_starts(&self) -> impl Iterator<Item = NaiveTime> + '_ {
        let step = i64::from(self.slot_granularity_minutes);
        (0..i64::from(self.slot_count()))
            .map(move |i| self.period_start_time + Duration::minutes(i * step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn period_parses_case_insensitively() {
        assert_eq!("A".parse::<Period>().unwrap(), Period::A);
        assert_eq!(" b ".parse::<Period>().unwrap(), Period::B);
        assert!("C".parse::<Period>().is_err());
    }

    #[test]
    fn five_minute_hour_has_twelve_slots() {
        let window = PeriodWindow::new(hm(11, 0), 5, 60).unwrap();
        let starts: Vec<_> = window.slot_starts().collect();
        assert_eq!(starts.len(), 12);
        assert_eq!(starts[0], hm(11, 0));
        assert_eq!(starts[1], hm(11, 5));
        assert_eq!(starts[11], hm(11, 55));
    }

    #[test]
    fn fifteen_minute_template_spans_three_hours() {
        let window = PeriodWindow::new(hm(11, 0), 15, 180).unwrap();
        assert_eq!(window.slot_count(), 12);
        assert_eq!(window.slot_starts().last(), Some(hm(13, 45)));
    }

    #[test]
    fn rejects_unsupported_granularity() {
        assert!(PeriodWindow::new(hm(11, 0), 7, 70).is_err());
    }

    #[test]
    fn rejects_duration_not_multiple_of_granularity() {
        assert!(PeriodWindow::new(hm(11, 0), 15, 50).is_err());
        assert!(PeriodWindow::new(hm(11, 0), 15, 0).is_err());
    }

    #[test]
    fn rejects_window_crossing_midnight() {
        assert!(PeriodWindow::new(hm(23, 30), 30, 60).is_err());
    }
}
