//! Location aggregate
//!
//! Pickup locations are managed by administrative tooling; this service
//! only reads them through [`LocationDirectory`].

pub mod directory;
pub mod model;

pub use directory::LocationDirectory;
pub use model::{Location, LocationId};
