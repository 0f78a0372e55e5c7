//! Storekeeper - namespaced client-side storage
//!
//! Typed key-value persistence with TTL expiry, an LRU-capped cache layer,
//! quota monitoring, an offline mutation queue, and a coordinator that ties
//! them together behind a small admin API.

pub mod api;
pub mod backend;
pub mod cache;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod models;
pub mod queue;
pub mod quota;
pub mod store;
pub mod tasks;

pub use api::{create_router, AppState};
pub use backend::{FileBackend, MemoryBackend, StorageBackend};
pub use cache::{CacheLayer, CacheStatistics};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::Config;
pub use coordinator::{StorageChangeEvent, StorageCoordinator, StoreKind};
pub use error::{Result, StorageError};
pub use queue::{ActionType, NewAction, OfflineQueue, PendingAction};
pub use quota::{QuotaInfo, QuotaMonitor};
pub use store::{EncryptedStore, EphemeralStore, KeyValueStore, SetOptions, StorageEntry};
