//! Change Listener Task
//!
//! Forwards backend change notifications to the coordinator.

use std::sync::Weak;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::backend::RawStorageEvent;
use crate::coordinator::StorageCoordinator;

/// Spawns a task that hands every event from `events` to
/// [`StorageCoordinator::handle_raw_event`].
///
/// Exits when the channel closes or the coordinator is dropped. A lagging
/// receiver logs how many events it missed and keeps going.
pub fn spawn_change_listener(
    coordinator: Weak<StorageCoordinator>,
    mut events: broadcast::Receiver<RawStorageEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!("Change listener started");

        loop {
            match events.recv().await {
                Ok(raw) => {
                    let Some(coordinator) = coordinator.upgrade() else {
                        break;
                    };
                    coordinator.handle_raw_event(&raw);
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!("Change listener fell behind, {} events missed", missed);
                }
                Err(RecvError::Closed) => {
                    debug!("Change channel closed");
                    break;
                }
            }
        }
    })
}
