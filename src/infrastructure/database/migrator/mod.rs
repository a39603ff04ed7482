//! Database migrations module

pub use sea_orm_migration::prelude::*;

mod m20250101_000001_create_locations;
mod m20250101_000002_create_time_slots;
mod m20250101_000003_create_reservations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_locations::Migration),
            Box::new(m20250101_000002_create_time_slots::Migration),
            Box::new(m20250101_000003_create_reservations::Migration),
        ]
    }
}
