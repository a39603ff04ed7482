//! Slot grids, the slot allocator and the QuickQueue service

pub mod allocator;
pub mod cache;
pub mod grid;
pub mod quick_queue;
pub mod template;

pub use allocator::{Allocation, OccupancyWaitCost, SlotAllocator, WaitCostPolicy};
pub use cache::{start_cache_invalidation_listener, GridKey, SlotGridCache};
pub use grid::{BookingWindow, SlotGrid, SlotGridLoader};
pub use quick_queue::QuickQueue;
pub use template::{PeriodTemplate, SlotTemplate};
