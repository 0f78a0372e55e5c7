//! Coordinator Module
//!
//! The façade that owns every store, plus the event, snapshot, and report
//! types it hands out.

mod events;
mod reports;
mod snapshot;
mod storage;

pub use events::{ChangeType, Listener, ListenerId, ListenerRegistry, StorageChangeEvent};
pub use reports::{HealthReport, MaintenanceReport, StoreKind};
pub use snapshot::{ImportReport, Snapshot, SNAPSHOT_VERSION};
pub use storage::{StorageCoordinator, StoreRef};
