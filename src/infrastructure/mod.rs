//! Infrastructure layer - slot stores and location directories

pub mod database;
pub mod storage;

pub use database::{
    init_database, run_migrations, DatabaseConfig, SeaOrmLocationDirectory, SeaOrmSlotStore,
};
pub use storage::{InMemoryLocationDirectory, InMemorySlotStore, SandboxSlotStore};
