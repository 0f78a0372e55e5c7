//! Cache Statistics Module
//!
//! Running hit/miss/eviction counters plus the derived statistics report.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Counters ==
/// Process-lifetime counters. Never persisted.
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}

// == Cache Statistics ==
/// Snapshot computed from the live entry set and the running counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatistics {
    /// Entries currently stored, expired ones included
    pub total_entries: usize,
    /// Bytes held by the cache namespace
    pub total_size: u64,
    /// Hits as a whole percentage of all reads
    pub hit_rate: u32,
    /// Misses as a whole percentage of all reads
    pub miss_rate: u32,
    /// Entries past their expiry not yet swept
    pub expired_entries: usize,
    /// Creation time of the oldest entry
    pub oldest_entry: Option<u64>,
    /// Creation time of the newest entry
    pub newest_entry: Option<u64>,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

// == Percentage ==
/// `round(part / total * 100)`, or 0 when `total` is 0.
pub fn percentage(part: u64, total: u64) -> u32 {
    if total == 0 {
        0
    } else {
        ((part as f64 / total as f64) * 100.0).round() as u32
    }
}
