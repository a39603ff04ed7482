//! Mapping of domain failures onto HTTP status codes

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::warn;

use super::ApiResponse;
use crate::application::RejectReason;
use crate::shared::DomainError;

pub const SLOT_FULL_MESSAGE: &str = "Slot no longer available, please pick another";

/// Error half of every handler result
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        let status = match &e {
            DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
            DomainError::Validation(_) => StatusCode::BAD_REQUEST,
            DomainError::DuplicateReservation { .. }
            | DomainError::CannotReleaseConfirmed(_)
            | DomainError::HoldNotActive { .. } => StatusCode::CONFLICT,
            DomainError::StoreUnavailable(_) => {
                warn!(error = %e, "Store unavailable while serving request");
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        Self::new(status, e.user_message())
    }
}

impl From<RejectReason> for ApiError {
    fn from(reason: RejectReason) -> Self {
        match reason {
            RejectReason::SlotFull => Self::new(StatusCode::CONFLICT, SLOT_FULL_MESSAGE),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::error(self.message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ReservationId, ReservationStatus};
    use chrono::NaiveDate;

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases = [
            (DomainError::not_found("Slot", "id", 7), StatusCode::NOT_FOUND),
            (DomainError::Validation("bad period".into()), StatusCode::BAD_REQUEST),
            (
                DomainError::CannotReleaseConfirmed(ReservationId(1)),
                StatusCode::CONFLICT,
            ),
            (
                DomainError::HoldNotActive {
                    id: ReservationId(1),
                    status: ReservationStatus::Expired,
                },
                StatusCode::CONFLICT,
            ),
            (
                DomainError::StoreUnavailable("pool timed out".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn duplicate_uses_friendly_message() {
        let err = ApiError::from(DomainError::DuplicateReservation {
            user_id: "u1".into(),
            date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
        });
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.message, "You already have an order today");
    }

    #[test]
    fn slot_full_is_conflict() {
        let err = ApiError::from(RejectReason::SlotFull);
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.message, SLOT_FULL_MESSAGE);
    }
}
