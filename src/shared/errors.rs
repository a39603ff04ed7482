use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::reservation::{ReservationId, ReservationStatus};

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Validation: {0}")]
    Validation(String),

    #[error("User {user_id} already has an order on {date}")]
    DuplicateReservation { user_id: String, date: NaiveDate },

    #[error("Reservation {0} is confirmed and can only be cancelled")]
    CannotReleaseConfirmed(ReservationId),

    #[error("Reservation {id} is no longer held (status: {status})")]
    HoldNotActive {
        id: ReservationId,
        status: ReservationStatus,
    },

    #[error("Slot store unavailable: {0}")]
    StoreUnavailable(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, field: &'static str, value: impl ToString) -> Self {
        Self::NotFound {
            entity,
            field,
            value: value.to_string(),
        }
    }

    /// Whether this error is likely transient (e.g. DB connection lost)
    /// and the operation may succeed if retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::StoreUnavailable(_))
    }

    /// Message shown to end users at the checkout counter or kiosk.
    pub fn user_message(&self) -> String {
        match self {
            DomainError::DuplicateReservation { .. } => {
                "You already have an order today".to_string()
            }
            DomainError::StoreUnavailable(_) => {
                "Something went wrong on our side, please try again in a moment".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        DomainError::StoreUnavailable(format!("Database error: {}", e))
    }
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_store_errors_are_transient() {
        assert!(DomainError::StoreUnavailable("timeout".into()).is_transient());
        assert!(!DomainError::Validation("bad".into()).is_transient());
        assert!(!DomainError::not_found("Location", "id", "X").is_transient());
    }

    #[test]
    fn duplicate_reservation_has_friendly_message() {
        let err = DomainError::DuplicateReservation {
            user_id: "u1".into(),
            date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
        };
        assert_eq!(err.user_message(), "You already have an order today");
    }

    #[test]
    fn not_found_formats_entity_and_field() {
        let err = DomainError::not_found("Location", "id", "MAIN 9");
        assert_eq!(err.to_string(), "Not found: Location with id=MAIN 9");
    }
}
