//! Time slot aggregate
//!
//! Contains the TimeSlot entity, lunch periods and the slot store interface.

pub mod model;
pub mod period;
pub mod store;

pub use model::{SlotId, SlotSpec, TimeSlot};
pub use period::{Period, PeriodWindow};
pub use store::{NewReservation, SlotStore};
