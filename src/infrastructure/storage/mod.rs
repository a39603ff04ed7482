//! Non-durable slot store implementations

mod memory;
mod sandbox;

pub use memory::{InMemoryLocationDirectory, InMemorySlotStore};
pub use sandbox::{SandboxSlotStore, SANDBOX_AVAILABILITY};
