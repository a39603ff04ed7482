//! Reservation protocol, hold expiry and checkout orchestration

pub mod checkout;
pub mod coordinator;
pub mod hold_expiry;

pub use checkout::{
    CheckoutError, CheckoutReceipt, CheckoutRequest, CheckoutService, OrderCreator, OrderError,
    OrderRequest,
};
pub use coordinator::{RejectReason, ReservationCoordinator, ReservationHandle, ReserveOutcome};
pub use hold_expiry::start_hold_expiry_task;
