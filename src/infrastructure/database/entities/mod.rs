//! Database entities module

pub mod location;
pub mod reservation;
pub mod time_slot;

pub use location::Entity as Location;
pub use reservation::Entity as Reservation;
pub use time_slot::Entity as TimeSlot;
