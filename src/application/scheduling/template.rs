//! Deterministic daily slot generation

use chrono::{NaiveDate, NaiveTime};

use crate::domain::{LocationId, Period, PeriodWindow, SlotSpec};
use crate::shared::{DomainError, DomainResult};

/// Window and per-slot capacity for one period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodTemplate {
    pub window: PeriodWindow,
    pub slot_capacity: u32,
}

impl PeriodTemplate {
    pub fn new(window: PeriodWindow, slot_capacity: u32) -> DomainResult<Self> {
        window.validate()?;
        if slot_capacity == 0 {
            return Err(DomainError::Validation(
                "Slot capacity must be positive".to_string(),
            ));
        }
        Ok(Self {
            window,
            slot_capacity,
        })
    }
}

/// The fixed daily template: one `PeriodTemplate` per lunch period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTemplate {
    period_a: PeriodTemplate,
    period_b: PeriodTemplate,
}

impl SlotTemplate {
    pub fn new(period_a: PeriodTemplate, period_b: PeriodTemplate) -> Self {
        Self { period_a, period_b }
    }

    pub fn period(&self, period: Period) -> &PeriodTemplate {
        match period {
            Period::A => &self.period_a,
            Period::B => &self.period_b,
        }
    }

    pub fn period_window(&self, period: Period) -> PeriodWindow {
        self.period(period).window
    }

    /// Slots for one location/day/period, ascending by start time.
    pub fn generate(
        &self,
        location_id: &LocationId,
        date: NaiveDate,
        period: Period,
    ) -> Vec<SlotSpec> {
        let template = self.period(period);
        template
            .window
            .slot_starts()
            .map(|start_time| SlotSpec {
                location_id: location_id.clone(),
                date,
                period,
                start_time,
                capacity: template.slot_capacity,
            })
            .collect()
    }
}

impl Default for SlotTemplate {
    /// Period A at 11:00 and B at 12:00, one hour of 5-minute slots, 10 orders each.
    fn default() -> Self {
        let window = |hour| PeriodWindow {
            period_start_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN),
            slot_granularity_minutes: 5,
            period_duration_minutes: 60,
        };
        Self {
            period_a: PeriodTemplate {
                window: window(11),
                slot_capacity: 10,
            },
            period_b: PeriodTemplate {
                window: window(12),
                slot_capacity: 10,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_period_a_generates_twelve_slots_of_ten() {
        let template = SlotTemplate::default();
        let date = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
        let slots = template.generate(&LocationId::new("MAIN 1"), date, Period::A);

        assert_eq!(slots.len(), 12);
        assert!(slots.iter().all(|s| s.capacity == 10 && s.date == date));
        assert_eq!(slots[0].start_time, NaiveTime::from_hms_opt(11, 0, 0).unwrap());
        assert_eq!(slots[11].start_time, NaiveTime::from_hms_opt(11, 55, 0).unwrap());
        assert!(slots.windows(2).all(|w| w[0].start_time < w[1].start_time));
    }

    #[test]
    fn period_b_starts_later() {
        let template = SlotTemplate::default();
        assert_eq!(
            template.period_window(Period::B).period_start_time,
            NaiveTime::from_hms_opt(12, 0, 0).unwrap()
        );
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let window = SlotTemplate::default().period_window(Period::A);
        assert!(PeriodTemplate::new(window, 0).is_err());
        assert!(PeriodTemplate::new(window, 1).is_ok());
    }
}
