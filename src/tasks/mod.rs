//! Background Tasks Module
//!
//! Tasks the coordinator spawns on the tokio runtime.
//!
//! # Tasks
//! - Maintenance: expiry sweep, queue pruning, and quota check at a fixed interval
//! - Change listener: republishes other tabs' writes to in-process listeners

mod changes;
mod maintenance;

pub use changes::spawn_change_listener;
pub use maintenance::spawn_maintenance_task;
