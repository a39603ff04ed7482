//! Reservation DTOs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::application::ReservationHandle;
use crate::domain::Reservation;

/// Hold one unit of a slot for a user
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateReservationRequest {
    #[validate(length(min = 1, max = 64, message = "must be 1-64 characters"))]
    pub user_id: String,
    #[validate(range(min = 1, message = "must be a positive slot id"))]
    pub slot_id: i64,
}

/// Attach the external order to a hold
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ConfirmReservationRequest {
    #[validate(length(min = 1, max = 128, message = "must be 1-128 characters"))]
    pub order_id: String,
}

/// Provisional hold returned by `POST /api/v1/reservations`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReservationHandleDto {
    pub reservation_id: i64,
    pub user_id: String,
    pub slot_id: i64,
    pub date: NaiveDate,
    /// The hold is released automatically after this instant
    pub expires_at: DateTime<Utc>,
}

impl From<ReservationHandle> for ReservationHandleDto {
    fn from(h: ReservationHandle) -> Self {
        Self {
            reservation_id: h.reservation_id.0,
            user_id: h.user_id,
            slot_id: h.slot_id.0,
            date: h.date,
            expires_at: h.expires_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReservationDto {
    pub id: i64,
    pub user_id: String,
    pub slot_id: i64,
    pub date: NaiveDate,
    /// Held, Confirmed, Released, Expired or Cancelled
    pub status: String,
    pub order_id: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Reservation> for ReservationDto {
    fn from(r: Reservation) -> Self {
        Self {
            id: r.id.0,
            user_id: r.user_id,
            slot_id: r.slot_id.0,
            date: r.date,
            status: r.status.to_string(),
            order_id: r.order_id,
            expires_at: r.expires_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}
