//! SeaORM implementation of SlotStore
//!
//! Capacity changes are single conditional UPDATE statements; the affected
//! row count tells whether the condition held. Nothing here reads a value
//! and writes it back. Holds and releases pair a capacity UPDATE with a
//! reservation write inside one transaction.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use log::debug;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    NotSet, PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};

use crate::domain::{
    LocationId, NewReservation, Period, Reservation, ReservationId, ReservationStatus, SlotId,
    SlotSpec, SlotStore, TimeSlot,
};
use crate::infrastructure::database::entities::{reservation, time_slot};
use crate::shared::{DomainError, DomainResult};

/// Rows per INSERT when materializing a booking window
const MATERIALIZE_CHUNK: usize = 500;

const ACTIVE_STATUSES: [&str; 2] = ["Held", "Confirmed"];

pub struct SeaOrmSlotStore {
    db: DatabaseConnection,
}

impl SeaOrmSlotStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

}

// ── Statements shared by single and transactional writes ────────

async fn slot_exists<C: ConnectionTrait>(conn: &C, slot_id: SlotId) -> Result<bool, DbErr> {
    Ok(time_slot::Entity::find_by_id(slot_id.0)
        .one(conn)
        .await?
        .is_some())
}

async fn reservation_exists<C: ConnectionTrait>(
    conn: &C,
    id: ReservationId,
) -> Result<bool, DbErr> {
    Ok(reservation::Entity::find_by_id(id.0)
        .one(conn)
        .await?
        .is_some())
}

/// `remaining - 1` where `remaining > 0`; true iff a row changed
async fn decrement_remaining<C: ConnectionTrait>(conn: &C, slot_id: SlotId) -> Result<bool, DbErr> {
    let result = time_slot::Entity::update_many()
        .col_expr(
            time_slot::Column::Remaining,
            Expr::col(time_slot::Column::Remaining).sub(1),
        )
        .filter(time_slot::Column::Id.eq(slot_id.0))
        .filter(time_slot::Column::Remaining.gt(0))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

/// `remaining + 1` where `remaining < capacity`; true iff a row changed
async fn increment_remaining<C: ConnectionTrait>(conn: &C, slot_id: SlotId) -> Result<bool, DbErr> {
    let result = time_slot::Entity::update_many()
        .col_expr(
            time_slot::Column::Remaining,
            Expr::col(time_slot::Column::Remaining).add(1),
        )
        .filter(time_slot::Column::Id.eq(slot_id.0))
        .filter(Expr::col(time_slot::Column::Remaining).lt(Expr::col(time_slot::Column::Capacity)))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

async fn insert_hold<C: ConnectionTrait>(
    conn: &C,
    new: &NewReservation,
) -> DomainResult<ReservationId> {
    let now = Utc::now();
    let model = reservation::ActiveModel {
        id: NotSet,
        user_id: Set(new.user_id.clone()),
        slot_id: Set(new.slot_id.0),
        date: Set(new.date),
        status: Set(ReservationStatus::Held.as_str().to_string()),
        order_id: Set(None),
        expires_at: Set(new.expires_at),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let inserted = model
        .insert(conn)
        .await
        .map_err(|e| insert_err(e, &new.user_id, new.date))?;
    Ok(ReservationId(inserted.id))
}

fn void_sources(status: ReservationStatus) -> DomainResult<Vec<&'static str>> {
    let from: Vec<&str> = status.voidable_from().iter().map(|s| s.as_str()).collect();
    if from.is_empty() {
        return Err(DomainError::Validation(format!("{} is not a void status", status)));
    }
    Ok(from)
}

/// Conditional status change into a void status; true iff a row changed
async fn mark_void<C: ConnectionTrait>(
    conn: &C,
    id: ReservationId,
    status: ReservationStatus,
    from: Vec<&'static str>,
) -> Result<bool, DbErr> {
    let result = reservation::Entity::update_many()
        .col_expr(reservation::Column::Status, Expr::value(status.as_str()))
        .col_expr(reservation::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(reservation::Column::Id.eq(id.0))
        .filter(reservation::Column::Status.is_in(from))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

// ── Conversion helpers ──────────────────────────────────────────

fn slot_to_domain(m: time_slot::Model) -> DomainResult<TimeSlot> {
    Ok(TimeSlot {
        id: SlotId(m.id),
        location_id: LocationId::new(m.location_id),
        date: m.date,
        period: Period::from_str(&m.period)?,
        start_time: m.start_time,
        capacity: u32::try_from(m.capacity).unwrap_or(0),
        remaining: u32::try_from(m.remaining).unwrap_or(0),
    })
}

fn reservation_to_domain(m: reservation::Model) -> DomainResult<Reservation> {
    Ok(Reservation {
        id: ReservationId(m.id),
        user_id: m.user_id,
        slot_id: SlotId(m.slot_id),
        date: m.date,
        status: ReservationStatus::from_str(&m.status)?,
        order_id: m.order_id,
        expires_at: m.expires_at,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

fn to_i32(value: u32) -> DomainResult<i32> {
    i32::try_from(value)
        .map_err(|_| DomainError::Validation(format!("Capacity {} too large", value)))
}

fn insert_err(e: DbErr, user_id: &str, date: NaiveDate) -> DomainError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => DomainError::DuplicateReservation {
            user_id: user_id.to_string(),
            date,
        },
        _ => e.into(),
    }
}

// ── SlotStore impl ──────────────────────────────────────────────

#[async_trait]
impl SlotStore for SeaOrmSlotStore {
    async fn get_slots(
        &self,
        location_id: &LocationId,
        date: NaiveDate,
        period: Period,
    ) -> DomainResult<Vec<TimeSlot>> {
        let models = time_slot::Entity::find()
            .filter(time_slot::Column::LocationId.eq(location_id.as_str()))
            .filter(time_slot::Column::Date.eq(date))
            .filter(time_slot::Column::Period.eq(period.as_str()))
            .order_by_asc(time_slot::Column::StartTime)
            .all(&self.db)
            .await?;
        models.into_iter().map(slot_to_domain).collect()
    }

    async fn get_slot(&self, slot_id: SlotId) -> DomainResult<Option<TimeSlot>> {
        time_slot::Entity::find_by_id(slot_id.0)
            .one(&self.db)
            .await?
            .map(slot_to_domain)
            .transpose()
    }

    async fn materialize_slots(&self, specs: &[SlotSpec]) -> DomainResult<u64> {
        let now = Utc::now();
        let mut created = 0;

        for chunk in specs.chunks(MATERIALIZE_CHUNK) {
            let models = chunk
                .iter()
                .map(|spec| {
                    let capacity = to_i32(spec.capacity)?;
                    Ok(time_slot::ActiveModel {
                        id: NotSet,
                        location_id: Set(spec.location_id.as_str().to_string()),
                        date: Set(spec.date),
                        period: Set(spec.period.as_str().to_string()),
                        start_time: Set(spec.start_time),
                        capacity: Set(capacity),
                        remaining: Set(capacity),
                        created_at: Set(now),
                    })
                })
                .collect::<DomainResult<Vec<_>>>()?;

            created += time_slot::Entity::insert_many(models)
                .on_conflict(
                    OnConflict::columns([
                        time_slot::Column::LocationId,
                        time_slot::Column::Date,
                        time_slot::Column::Period,
                        time_slot::Column::StartTime,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(&self.db)
                .await?;
        }

        debug!("Materialized {} of {} slots", created, specs.len());
        Ok(created)
    }

    async fn try_decrement(&self, slot_id: SlotId) -> DomainResult<bool> {
        if decrement_remaining(&self.db, slot_id).await? {
            return Ok(true);
        }
        if !slot_exists(&self.db, slot_id).await? {
            return Err(DomainError::not_found("TimeSlot", "id", slot_id));
        }
        Ok(false)
    }

    async fn increment(&self, slot_id: SlotId) -> DomainResult<()> {
        if increment_remaining(&self.db, slot_id).await? || slot_exists(&self.db, slot_id).await? {
            return Ok(());
        }
        Err(DomainError::not_found("TimeSlot", "id", slot_id))
    }

    async fn has_active_reservation(&self, user_id: &str, date: NaiveDate) -> DomainResult<bool> {
        let count = reservation::Entity::find()
            .filter(reservation::Column::UserId.eq(user_id))
            .filter(reservation::Column::Date.eq(date))
            .filter(reservation::Column::Status.is_in(ACTIVE_STATUSES))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn find_active_reservation(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> DomainResult<Option<Reservation>> {
        reservation::Entity::find()
            .filter(reservation::Column::UserId.eq(user_id))
            .filter(reservation::Column::Date.eq(date))
            .filter(reservation::Column::Status.is_in(ACTIVE_STATUSES))
            .one(&self.db)
            .await?
            .map(reservation_to_domain)
            .transpose()
    }

    async fn record_reservation(&self, new: NewReservation) -> DomainResult<ReservationId> {
        debug!("Recording hold for user {} on slot {}", new.user_id, new.slot_id);
        insert_hold(&self.db, &new).await
    }

    async fn find_reservation(&self, id: ReservationId) -> DomainResult<Option<Reservation>> {
        reservation::Entity::find_by_id(id.0)
            .one(&self.db)
            .await?
            .map(reservation_to_domain)
            .transpose()
    }

    async fn confirm_reservation(&self, id: ReservationId, order_id: &str) -> DomainResult<bool> {
        let result = reservation::Entity::update_many()
            .col_expr(
                reservation::Column::Status,
                Expr::value(ReservationStatus::Confirmed.as_str()),
            )
            .col_expr(reservation::Column::OrderId, Expr::value(order_id))
            .col_expr(reservation::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(reservation::Column::Id.eq(id.0))
            .filter(reservation::Column::Status.eq(ReservationStatus::Held.as_str()))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 1 {
            return Ok(true);
        }
        if !reservation_exists(&self.db, id).await? {
            return Err(DomainError::not_found("Reservation", "id", id));
        }
        Ok(false)
    }

    async fn void_reservation(
        &self,
        id: ReservationId,
        status: ReservationStatus,
    ) -> DomainResult<bool> {
        let from = void_sources(status)?;

        if mark_void(&self.db, id, status, from).await? {
            debug!("Reservation {} -> {}", id, status);
            return Ok(true);
        }
        if !reservation_exists(&self.db, id).await? {
            return Err(DomainError::not_found("Reservation", "id", id));
        }
        Ok(false)
    }

    async fn hold_slot(&self, new: NewReservation) -> DomainResult<Option<ReservationId>> {
        let txn = self.db.begin().await?;

        if !decrement_remaining(&txn, new.slot_id).await? {
            let exists = slot_exists(&txn, new.slot_id).await?;
            txn.rollback().await?;
            if !exists {
                return Err(DomainError::not_found("TimeSlot", "id", new.slot_id));
            }
            return Ok(None);
        }

        // Dropping the transaction on error rolls the decrement back.
        let id = insert_hold(&txn, &new).await?;
        txn.commit().await?;

        debug!("Held slot {} for user {} as reservation {}", new.slot_id, new.user_id, id);
        Ok(Some(id))
    }

    async fn release_reservation(
        &self,
        id: ReservationId,
        status: ReservationStatus,
    ) -> DomainResult<bool> {
        let from = void_sources(status)?;
        let txn = self.db.begin().await?;

        let slot_id = match reservation::Entity::find_by_id(id.0).one(&txn).await? {
            Some(model) => SlotId(model.slot_id),
            None => return Err(DomainError::not_found("Reservation", "id", id)),
        };
        if !mark_void(&txn, id, status, from).await? {
            txn.rollback().await?;
            return Ok(false);
        }
        increment_remaining(&txn, slot_id).await?;
        txn.commit().await?;

        debug!("Reservation {} -> {}, slot {} restored", id, status, slot_id);
        Ok(true)
    }

    async fn find_expired_holds(&self, now: DateTime<Utc>) -> DomainResult<Vec<Reservation>> {
        reservation::Entity::find()
            .filter(reservation::Column::Status.eq(ReservationStatus::Held.as_str()))
            .filter(reservation::Column::ExpiresAt.lte(now))
            .order_by_asc(reservation::Column::ExpiresAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(reservation_to_domain)
            .collect()
    }

    async fn ping(&self) -> DomainResult<()> {
        self.db.ping().await?;
        Ok(())
    }
}
