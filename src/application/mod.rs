//! Application layer: slot grids, allocation and the reservation protocol

pub mod events;
pub mod reservations;
pub mod scheduling;

#[cfg(test)]
pub(crate) mod testing;

pub use events::{create_event_bus, EventBus, EventSubscriber, SharedEventBus, SlotEvent};
pub use reservations::{
    start_hold_expiry_task, CheckoutError, CheckoutReceipt, CheckoutRequest, CheckoutService,
    OrderCreator, OrderError, OrderRequest, RejectReason, ReservationCoordinator,
    ReservationHandle, ReserveOutcome,
};
pub use scheduling::{
    start_cache_invalidation_listener, Allocation, BookingWindow, OccupancyWaitCost, PeriodTemplate,
    QuickQueue, SlotAllocator, SlotGrid, SlotGridCache, SlotGridLoader, SlotTemplate,
    WaitCostPolicy,
};
