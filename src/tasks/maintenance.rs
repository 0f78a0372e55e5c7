//! Maintenance Task
//!
//! Background task that periodically runs coordinator maintenance.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::coordinator::StorageCoordinator;

/// Spawns a task that calls [`StorageCoordinator::run_maintenance`] every
/// `interval`, starting one interval from now.
///
/// The task holds only a weak reference and exits once the coordinator is
/// dropped. Abort the returned handle to stop it sooner.
pub fn spawn_maintenance_task(
    coordinator: Weak<StorageCoordinator>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting maintenance task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let Some(coordinator) = coordinator.upgrade() else {
                debug!("Coordinator dropped, maintenance task exiting");
                break;
            };

            let report = coordinator.run_maintenance();
            debug!("Maintenance tick: {:?}", report);
        }
    })
}
