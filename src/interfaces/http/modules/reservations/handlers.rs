//! Reservation HTTP handlers

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use super::dto::*;
use crate::application::{ReservationCoordinator, ReserveOutcome};
use crate::domain::{ReservationId, SlotId, SlotStore};
use crate::interfaces::http::common::{ApiError, ApiResponse, ValidatedJson};
use crate::shared::DomainError;

#[derive(Clone)]
pub struct ReservationState {
    pub store: Arc<dyn SlotStore>,
    pub coordinator: Arc<ReservationCoordinator>,
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations",
    tag = "Reservations",
    request_body = CreateReservationRequest,
    responses(
        (status = 201, description = "Slot held", body = ApiResponse<ReservationHandleDto>),
        (status = 404, description = "Unknown slot, or its day or location cannot be booked"),
        (status = 409, description = "Slot full, or the user already has an order that day"),
        (status = 422, description = "Invalid request body")
    )
)]
pub async fn create_reservation(
    State(state): State<ReservationState>,
    ValidatedJson(request): ValidatedJson<CreateReservationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ReservationHandleDto>>), ApiError> {
    let slot_id = SlotId(request.slot_id);
    let slot = state
        .store
        .get_slot(slot_id)
        .await?
        .ok_or_else(|| DomainError::not_found("Slot", "id", slot_id))?;

    match state.coordinator.reserve(&request.user_id, &slot).await? {
        ReserveOutcome::Held(handle) => Ok((
            StatusCode::CREATED,
            Json(ApiResponse::success(ReservationHandleDto::from(handle))),
        )),
        ReserveOutcome::Rejected(reason) => Err(reason.into()),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/reservations/{id}",
    tag = "Reservations",
    params(("id" = i64, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Current reservation state",
            body = ApiResponse<ReservationDto>),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn get_reservation(
    State(state): State<ReservationState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ReservationDto>>, ApiError> {
    let reservation = state.coordinator.get(ReservationId(id)).await?;
    Ok(Json(ApiResponse::success(reservation.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations/{id}/confirm",
    tag = "Reservations",
    params(("id" = i64, Path, description = "Reservation ID")),
    request_body = ConfirmReservationRequest,
    responses(
        (status = 200, description = "Reservation confirmed", body = ApiResponse<ReservationDto>),
        (status = 404, description = "Reservation not found"),
        (status = 409, description = "Hold already released or expired")
    )
)]
pub async fn confirm_reservation(
    State(state): State<ReservationState>,
    Path(id): Path<i64>,
    ValidatedJson(request): ValidatedJson<ConfirmReservationRequest>,
) -> Result<Json<ApiResponse<ReservationDto>>, ApiError> {
    let id = ReservationId(id);
    let handle = state.coordinator.handle(id).await?;
    state.coordinator.confirm(&handle, &request.order_id).await?;

    let reservation = state.coordinator.get(id).await?;
    Ok(Json(ApiResponse::success(reservation.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations/{id}/release",
    tag = "Reservations",
    params(("id" = i64, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Hold released (repeat calls are no-ops)",
            body = ApiResponse<ReservationDto>),
        (status = 404, description = "Reservation not found"),
        (status = 409, description = "Reservation is confirmed; cancel it instead")
    )
)]
pub async fn release_reservation(
    State(state): State<ReservationState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ReservationDto>>, ApiError> {
    let id = ReservationId(id);
    let handle = state.coordinator.handle(id).await?;
    state.coordinator.release(&handle).await?;

    let reservation = state.coordinator.get(id).await?;
    Ok(Json(ApiResponse::success(reservation.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations/{id}/cancel",
    tag = "Reservations",
    params(("id" = i64, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation cancelled and capacity restored",
            body = ApiResponse<ReservationDto>),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn cancel_reservation(
    State(state): State<ReservationState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ReservationDto>>, ApiError> {
    let id = ReservationId(id);
    let handle = state.coordinator.handle(id).await?;
    state.coordinator.cancel(&handle).await?;

    let reservation = state.coordinator.get(id).await?;
    Ok(Json(ApiResponse::success(reservation.into())))
}
