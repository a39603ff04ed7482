//! Domain layer: pickup locations, time slots, reservations and the
//! interfaces of the external systems that own them.

pub mod location;
pub mod reservation;
pub mod slot;

pub use location::{Location, LocationDirectory, LocationId};
pub use reservation::{Reservation, ReservationId, ReservationStatus};
pub use slot::{NewReservation, Period, PeriodWindow, SlotId, SlotSpec, SlotStore, TimeSlot};

pub use crate::shared::errors::{DomainError, DomainResult};
