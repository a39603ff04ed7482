//! Reservation aggregate

pub mod model;

pub use model::{Reservation, ReservationId, ReservationStatus};
