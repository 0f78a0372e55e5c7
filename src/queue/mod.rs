//! Offline Queue Module
//!
//! Durable FIFO of mutations waiting for connectivity, with attempt
//! counting, pruning, and a replay driver with exponential backoff.

mod action;
mod backoff;
mod offline;


pub use action::{ActionType, NewAction, PendingAction};
pub use backoff::BackoffPolicy;
pub use offline::{OfflineQueue, ReplayReport, QUEUE_KEY};
