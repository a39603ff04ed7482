//! Create time_slots table
//!
//! One row per (location, date, period, start time). `remaining` is the
//! capacity counter guarded by conditional updates.

use sea_orm_migration::prelude::*;

use super::m20250101_000001_create_locations::Locations;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TimeSlots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TimeSlots::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TimeSlots::LocationId).string().not_null())
                    .col(ColumnDef::new(TimeSlots::Date).date().not_null())
                    .col(ColumnDef::new(TimeSlots::Period).string().not_null())
                    .col(ColumnDef::new(TimeSlots::StartTime).time().not_null())
                    .col(ColumnDef::new(TimeSlots::Capacity).integer().not_null())
                    .col(ColumnDef::new(TimeSlots::Remaining).integer().not_null())
                    .col(
                        ColumnDef::new(TimeSlots::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .check(Expr::col(TimeSlots::Remaining).gte(0))
                    .check(Expr::col(TimeSlots::Remaining).lte(Expr::col(TimeSlots::Capacity)))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_time_slots_location")
                            .from(TimeSlots::Table, TimeSlots::LocationId)
                            .to(Locations::Table, Locations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_time_slots_key")
                    .table(TimeSlots::Table)
                    .col(TimeSlots::LocationId)
                    .col(TimeSlots::Date)
                    .col(TimeSlots::Period)
                    .col(TimeSlots::StartTime)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_time_slots_date_period")
                    .table(TimeSlots::Table)
                    .col(TimeSlots::Date)
                    .col(TimeSlots::Period)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TimeSlots::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum TimeSlots {
    Table,
    Id,
    LocationId,
    Date,
    Period,
    StartTime,
    Capacity,
    Remaining,
    CreatedAt,
}
