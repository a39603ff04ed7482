//! Reservation domain entity

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::slot::SlotId;
use crate::shared::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(pub i64);

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reservation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReservationStatus {
    /// Capacity decremented, waiting for the order to be created
    Held,
    /// Order created; terminal unless explicitly cancelled
    Confirmed,
    /// Hold given back before confirmation
    Released,
    /// Hold timed out and was released by the sweep or a lazy check
    Expired,
    /// Explicitly cancelled (held or confirmed)
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Held => "Held",
            Self::Confirmed => "Confirmed",
            Self::Released => "Released",
            Self::Expired => "Expired",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Counts against the one-order-per-day rule and against capacity.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Held | Self::Confirmed)
    }

    /// Statuses a reservation may be voided from to reach `self`.
    /// Empty for statuses that are not void states.
    pub fn voidable_from(&self) -> &'static [ReservationStatus] {
        match self {
            Self::Released | Self::Expired => &[Self::Held],
            Self::Cancelled => &[Self::Held, Self::Confirmed],
            Self::Held | Self::Confirmed => &[],
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Held" => Ok(Self::Held),
            "Confirmed" => Ok(Self::Confirmed),
            "Released" => Ok(Self::Released),
            "Expired" => Ok(Self::Expired),
            "Cancelled" => Ok(Self::Cancelled),
            other => Err(DomainError::Validation(format!(
                "Unknown reservation status '{}'",
                other
            ))),
        }
    }
}

/// A user's claim on one slot for one calendar day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub user_id: String,
    pub slot_id: SlotId,
    pub date: NaiveDate,
    pub status: ReservationStatus,
    /// Set once the order is created
    pub order_id: Option<String>,
    /// Deadline for confirming a `Held` reservation
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// A hold past its deadline. Confirmed reservations never expire.
    pub fn is_hold_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Held && now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn held(expires_in: Duration) -> Reservation {
        let now = Utc::now();
        Reservation {
            id: ReservationId(1),
            user_id: "student-1".into(),
            slot_id: SlotId(7),
            date: now.date_naive(),
            status: ReservationStatus::Held,
            order_id: None,
            expires_at: now + expires_in,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn held_and_confirmed_are_active() {
        assert!(ReservationStatus::Held.is_active());
        assert!(ReservationStatus::Confirmed.is_active());
        assert!(!ReservationStatus::Released.is_active());
        assert!(!ReservationStatus::Expired.is_active());
        assert!(!ReservationStatus::Cancelled.is_active());
    }

    #[test]
    fn only_cancellation_voids_confirmed() {
        assert_eq!(
            ReservationStatus::Released.voidable_from(),
            &[ReservationStatus::Held]
        );
        assert!(ReservationStatus::Cancelled
            .voidable_from()
            .contains(&ReservationStatus::Confirmed));
        assert!(ReservationStatus::Held.voidable_from().is_empty());
    }

    #[test]
    fn status_parses_from_storage_names() {
        for status in [
            ReservationStatus::Held,
            ReservationStatus::Confirmed,
            ReservationStatus::Released,
            ReservationStatus::Expired,
            ReservationStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<ReservationStatus>().unwrap(), status);
        }
        assert!("Accepted".parse::<ReservationStatus>().is_err());
    }

    #[test]
    fn hold_expires_at_deadline() {
        let r = held(Duration::minutes(5));
        assert!(!r.is_hold_expired(Utc::now()));
        assert!(r.is_hold_expired(r.expires_at));
    }

    #[test]
    fn confirmed_reservation_never_expires() {
        let mut r = held(Duration::minutes(-5));
        r.status = ReservationStatus::Confirmed;
        assert!(!r.is_hold_expired(Utc::now()));
    }
}
