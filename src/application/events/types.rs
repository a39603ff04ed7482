//! Slot and reservation events
//!
//! Broadcast whenever durable capacity or reservation state changes, so
//! caches and other listeners can react without polling.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ReservationId, SlotId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SlotEvent {
    SlotCapacityChanged(SlotCapacityChangedEvent),
    ReservationHeld(ReservationEvent),
    ReservationConfirmed(ReservationConfirmedEvent),
    ReservationReleased(ReservationEvent),
    ReservationExpired(ReservationEvent),
}

impl SlotEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            SlotEvent::SlotCapacityChanged(_) => "slot_capacity_changed",
            SlotEvent::ReservationHeld(_) => "reservation_held",
            SlotEvent::ReservationConfirmed(_) => "reservation_confirmed",
            SlotEvent::ReservationReleased(_) => "reservation_released",
            SlotEvent::ReservationExpired(_) => "reservation_expired",
        }
    }

    pub fn slot_id(&self) -> SlotId {
        match self {
            SlotEvent::SlotCapacityChanged(e) => e.slot_id,
            SlotEvent::ReservationHeld(e)
            | SlotEvent::ReservationReleased(e)
            | SlotEvent::ReservationExpired(e) => e.slot_id,
            SlotEvent::ReservationConfirmed(e) => e.slot_id,
        }
    }
}

/// Remaining capacity of a slot moved by `delta` (+1 on release, -1 on hold)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotCapacityChangedEvent {
    pub slot_id: SlotId,
    pub date: NaiveDate,
    pub delta: i32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationEvent {
    pub reservation_id: ReservationId,
    pub user_id: String,
    pub slot_id: SlotId,
    pub date: NaiveDate,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationConfirmedEvent {
    pub reservation_id: ReservationId,
    pub slot_id: SlotId,
    pub order_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Envelope delivered to subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,
    pub event: SlotEvent,
    pub published_at: DateTime<Utc>,
}

impl EventMessage {
    pub fn new(event: SlotEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event,
            published_at: Utc::now(),
        }
    }
}
