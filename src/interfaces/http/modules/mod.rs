pub mod health;
pub mod locations;
pub mod metrics;
pub mod request_id;
pub mod reservations;
pub mod slots;
