//! Create reservations table
//!
//! The partial unique index on (user_id, date) over active statuses is the
//! store-side backstop of the one-order-per-day rule.

use sea_orm_migration::prelude::*;

use super::m20250101_000002_create_time_slots::TimeSlots;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Reservations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Reservations::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Reservations::UserId).string().not_null())
                    .col(ColumnDef::new(Reservations::SlotId).big_integer().not_null())
                    .col(ColumnDef::new(Reservations::Date).date().not_null())
                    .col(
                        ColumnDef::new(Reservations::Status)
                            .string()
                            .not_null()
                            .default("Held"),
                    )
                    .col(ColumnDef::new(Reservations::OrderId).string())
                    .col(
                        ColumnDef::new(Reservations::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Reservations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Reservations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reservations_time_slot")
                            .from(Reservations::Table, Reservations::SlotId)
                            .to(TimeSlots::Table, TimeSlots::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // sea-query has no portable partial index builder; SQLite and
        // PostgreSQL accept the same statement.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_reservations_active_user_day \
                 ON reservations (user_id, date) \
                 WHERE status IN ('Held', 'Confirmed')",
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reservations_status_expiry")
                    .table(Reservations::Table)
                    .col(Reservations::Status)
                    .col(Reservations::ExpiresAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Reservations::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Reservations {
    Table,
    Id,
    UserId,
    SlotId,
    Date,
    Status,
    OrderId,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
}
