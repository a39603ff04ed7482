//! Database repository implementations
//!
//! SeaORM-backed slot store and location directory.

pub mod location_directory;
pub mod slot_store;

pub use location_directory::SeaOrmLocationDirectory;
pub use slot_store::SeaOrmSlotStore;
