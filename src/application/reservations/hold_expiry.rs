//! Background task that periodically expires unconfirmed holds.
//!
//! Runs in a tokio::spawn loop, checking every `sweep_interval_secs` for
//! `Held` reservations past their `expires_at`, marking them `Expired` and
//! returning their capacity.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use super::coordinator::ReservationCoordinator;
use crate::shared::ShutdownSignal;

/// Start the hold expiry background task.
pub fn start_hold_expiry_task(
    coordinator: Arc<ReservationCoordinator>,
    shutdown: ShutdownSignal,
    sweep_interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            sweep_interval = sweep_interval_secs,
            hold_timeout_secs = coordinator.hold_timeout().num_seconds(),
            "Hold expiry task started"
        );

        let mut interval = tokio::time::interval(Duration::from_secs(sweep_interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match coordinator.expire_overdue_holds().await {
                        Ok(0) => {}
                        Ok(count) => debug!(count, "Expired overdue holds"),
                        Err(e) => warn!(error = %e, "Hold expiry check error"),
                    }
                }
                _ = shutdown.notified().wait() => {
                    info!("Hold expiry task shutting down");
                    break;
                }
            }
        }

        info!("Hold expiry task stopped");
    })
}
