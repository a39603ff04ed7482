//! Checkout orchestration: allocate, hold, create the order, confirm
//!
//! The order itself lives in an external system reached through
//! [`OrderCreator`]. Any failure after a hold is placed releases it before
//! the error is returned; an order created for a hold that could not be
//! confirmed is cancelled through the same trait.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use tracing::{error, info, warn};

use super::coordinator::{RejectReason, ReservationCoordinator, ReservationHandle, ReserveOutcome};
use crate::application::scheduling::{Allocation, QuickQueue};
use crate::domain::{LocationId, Period, ReservationId, SlotId, TimeSlot};
use crate::shared::DomainError;

/// What the order system needs to create an order
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub user_id: String,
    pub reservation_id: ReservationId,
    pub slot: TimeSlot,
}

#[derive(Debug, Error)]
#[error("Order creation failed: {0}")]
pub struct OrderError(pub String);

/// External order system
#[async_trait]
pub trait OrderCreator: Send + Sync {
    /// Create the order and return its id
    async fn create_order(&self, request: &OrderRequest) -> Result<String, OrderError>;

    /// Withdraw an order whose pickup slot could not be confirmed
    async fn cancel_order(&self, order_id: &str) -> Result<(), OrderError>;
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("No pickup slot is available")]
    NotAvailable,

    #[error("Slot no longer available, please pick another")]
    SlotFull,

    #[error("Every selected slot filled up after {attempts} attempts")]
    AttemptsExhausted { attempts: u32 },

    #[error(transparent)]
    Order(#[from] OrderError),

    /// The order exists but its hold was lost before confirmation.
    /// `order_cancelled` is false when withdrawing it failed too.
    #[error("Order {order_id} was created but its pickup slot could not be confirmed: {source}")]
    Unconfirmed {
        order_id: String,
        order_cancelled: bool,
        #[source]
        source: DomainError,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: String,
    pub date: NaiveDate,
    pub period: Period,
    pub preferred_location: Option<LocationId>,
}

#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub order_id: String,
    pub reservation_id: ReservationId,
    pub slot: TimeSlot,
}

pub struct CheckoutService {
    quick_queue: Arc<QuickQueue>,
    coordinator: Arc<ReservationCoordinator>,
    orders: Arc<dyn OrderCreator>,
    max_attempts: u32,
}

impl CheckoutService {
    pub fn new(
        quick_queue: Arc<QuickQueue>,
        coordinator: Arc<ReservationCoordinator>,
        orders: Arc<dyn OrderCreator>,
        max_attempts: u32,
    ) -> Self {
        Self {
            quick_queue,
            coordinator,
            orders,
            max_attempts: max_attempts.max(1),
        }
    }

    /// QuickQueue checkout: the best slot is picked automatically and
    /// re-picked whenever the chosen one fills up first.
    pub async fn checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        let mut exclude: Vec<SlotId> = Vec::new();

        for attempt in 1..=self.max_attempts {
            let allocation = self
                .quick_queue
                .find_optimal_slot_for_active(
                    request.date,
                    request.period,
                    request.preferred_location.as_ref(),
                    &exclude,
                )
                .await?;

            let slot = match allocation {
                Allocation::Available(slot) => slot,
                Allocation::NotAvailable => return Err(CheckoutError::NotAvailable),
            };

            match self.coordinator.reserve(&request.user_id, &slot).await? {
                ReserveOutcome::Held(handle) => return self.complete(handle, slot).await,
                ReserveOutcome::Rejected(RejectReason::SlotFull) => {
                    info!(
                        user_id = %request.user_id,
                        slot_id = %slot.id,
                        attempt,
                        "Selected slot filled up, re-allocating"
                    );
                    exclude.push(slot.id);
                }
            }
        }

        Err(CheckoutError::AttemptsExhausted {
            attempts: self.max_attempts,
        })
    }

    /// Manual selection: the user chose `slot`; no automatic re-allocation.
    pub async fn place_order_at_slot(
        &self,
        user_id: &str,
        slot: &TimeSlot,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        match self.coordinator.reserve(user_id, slot).await? {
            ReserveOutcome::Held(handle) => self.complete(handle, slot.clone()).await,
            ReserveOutcome::Rejected(RejectReason::SlotFull) => Err(CheckoutError::SlotFull),
        }
    }

    async fn complete(
        &self,
        handle: ReservationHandle,
        slot: TimeSlot,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        let request = OrderRequest {
            user_id: handle.user_id.clone(),
            reservation_id: handle.reservation_id,
            slot: slot.clone(),
        };

        let order_id = match self.orders.create_order(&request).await {
            Ok(order_id) => order_id,
            Err(e) => {
                warn!(
                    reservation_id = %handle.reservation_id,
                    error = %e,
                    "Order creation failed, releasing hold"
                );
                self.release_quietly(&handle).await;
                return Err(e.into());
            }
        };

        if let Err(e) = self.coordinator.confirm(&handle, &order_id).await {
            warn!(
                reservation_id = %handle.reservation_id,
                order_id = %order_id,
                error = %e,
                "Confirmation failed after order creation, withdrawing order"
            );
            self.release_quietly(&handle).await;
            let order_cancelled = match self.orders.cancel_order(&order_id).await {
                Ok(()) => true,
                Err(cancel) => {
                    error!(order_id = %order_id, error = %cancel, "Failed to withdraw order");
                    false
                }
            };
            return Err(CheckoutError::Unconfirmed {
                order_id,
                order_cancelled,
                source: e,
            });
        }

        Ok(CheckoutReceipt {
            order_id,
            reservation_id: handle.reservation_id,
            slot,
        })
    }

    async fn release_quietly(&self, handle: &ReservationHandle) {
        if let Err(e) = self.coordinator.release(handle).await {
            warn!(reservation_id = %handle.reservation_id, error = %e, "Failed to release hold");
        }
    }
}
