pub mod errors;
pub mod shutdown;
pub mod time;
pub mod utils;

pub use errors::{DomainError, DomainResult};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};
pub use time::{Clock, FixedClock, SharedClock, SystemClock};
