//! # lunchline
//!
//! Lunch pickup slot allocation for school cafeterias ("QuickQueue").
//!
//! Students order lunch for a school day and a lunch period; the service
//! picks the pickup slot with the lowest expected wait across the open
//! locations, holds one unit of its capacity while the order is placed, and
//! confirms or releases the hold afterwards. Capacity is only ever changed
//! through conditional store operations, so concurrent checkouts never
//! oversell a slot.
//!
//! ## Architecture
//!
//! - **domain**: slots, periods, locations, reservations and the store traits
//! - **application**: slot grids and cache, the allocator, QuickQueue, the
//!   reservation coordinator, hold expiry, checkout, the event bus
//! - **infrastructure**: SeaORM (SQLite) store, in-memory and sandbox stores
//! - **interfaces**: REST API with Swagger UI
//! - **server**: process wiring and lifecycle

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod shared;

pub use config::{default_config_path, AppConfig};

pub use application::{
    create_event_bus, Allocation, CheckoutService, QuickQueue, ReservationCoordinator,
    ReservationHandle, ReserveOutcome, SharedEventBus, SlotAllocator, SlotGrid,
};
pub use domain::{Location, LocationId, Period, Reservation, ReservationStatus, TimeSlot};
pub use infrastructure::{init_database, DatabaseConfig};
pub use interfaces::create_api_router;
pub use shared::{DomainError, DomainResult};
