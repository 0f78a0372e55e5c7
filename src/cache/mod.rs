//! Cache Module
//!
//! TTL cache over the persistent store with LRU eviction and hit/miss
//! statistics.

mod layer;
mod lru;
mod stats;


// Re-export public types
pub use layer::CacheLayer;
pub use lru::{eviction_count, lru_order, select_victims, EVICTION_FRACTION};
pub use stats::{percentage, CacheCounters, CacheStatistics};
