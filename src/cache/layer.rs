//! Cache Layer Module
//!
//! TTL cache over the `cache` namespace of the persistent store, bounded by an
//! entry cap with LRU eviction and tracking hit/miss statistics.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{eviction_count, percentage, select_victims, CacheCounters, CacheStatistics};
use crate::error::{Result, StorageError};
use crate::store::{KeyValueStore, StorageEntry};

// == Cache Layer ==
#[derive(Debug)]
pub struct CacheLayer {
    /// Store scoped to the cache namespace
    store: KeyValueStore,
    /// TTL applied when `set` is given none
    default_ttl: Duration,
    /// Entry count at which inserting a new key triggers eviction
    max_entries: usize,
    counters: CacheCounters,
    /// Serializes the evict-then-insert sequence of `set`
    write_lock: Mutex<()>,
}

impl CacheLayer {
    // == Constructor ==
    pub fn new(store: KeyValueStore, default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            store,
            default_ttl,
            max_entries,
            counters: CacheCounters::new(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn is_available(&self) -> bool {
        self.store.is_available()
    }

    pub fn check_health(&self) -> bool {
        self.store.check_health()
    }

    pub(crate) fn store(&self) -> &KeyValueStore {
        &self.store
    }

    // == Set ==
    /// Caches `value` for `ttl` (or the default TTL).
    ///
    /// Inserting a new key while the cache holds `max_entries` or more first
    /// drops expired entries, then evicts the least recently used 10%.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
        if key.is_empty() {
            return Err(StorageError::InvalidRequest(
                "Cache key cannot be empty".to_string(),
            ));
        }
        let value = serde_json::to_value(value)?;

        let _guard = self.write_lock.lock();
        if !self.store.contains_raw(key)? {
            self.make_room()?;
        }

        let ttl = ttl.unwrap_or(self.default_ttl);
        let entry = StorageEntry::new(value, self.store.now_ms(), Some(ttl));
        self.store.put_entry(key, &entry)
    }

    fn make_room(&self) -> Result<usize> {
        let entries = self.store.scan()?;
        if entries.len() < self.max_entries {
            return Ok(0);
        }

        let now = self.store.now_ms();
        let (expired, live): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|(_, entry)| entry.is_expired_at(now));
        for (key, _) in &expired {
            self.store.remove(key)?;
        }
        if live.len() < self.max_entries {
            debug!("Made room by dropping {} expired cache entries", expired.len());
            return Ok(0);
        }

        let victims = select_victims(&live, eviction_count(live.len()));
        for key in &victims {
            self.store.remove(key)?;
        }
        self.counters.record_evictions(victims.len() as u64);
        info!(
            "Evicted {} least recently used cache entries: {:?}",
            victims.len(),
            victims
        );
        Ok(victims.len())
    }

    /// Trims the cache back to `max_entries` after writes that bypass `set`,
    /// such as a snapshot import. Expired entries go first and are not
    /// counted as evictions. Returns how many live entries were evicted.
    pub(crate) fn enforce_cap(&self) -> Result<usize> {
        let _guard = self.write_lock.lock();
        let entries = self.store.scan()?;
        if entries.len() <= self.max_entries {
            return Ok(0);
        }

        let now = self.store.now_ms();
        let (expired, live): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|(_, entry)| entry.is_expired_at(now));
        for (key, _) in &expired {
            self.store.remove(key)?;
        }
        if live.len() <= self.max_entries {
            return Ok(0);
        }

        let victims = select_victims(&live, live.len() - self.max_entries);
        for key in &victims {
            self.store.remove(key)?;
        }
        self.counters.record_evictions(victims.len() as u64);
        info!(
            "Trimmed cache to {} entries, evicting {}",
            self.max_entries,
            victims.len()
        );
        Ok(victims.len())
    }

    // == Get ==
    /// Returns the cached value if present and not expired.
    ///
    /// Every call counts as a hit or a miss. A hit bumps the entry's access
    /// count and last-access time. A stored value that does not decode as `T`
    /// is an error and counts as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(mut entry) = self.store.read_entry(key)? else {
            self.counters.record_miss();
            return Ok(None);
        };

        let value = match T::deserialize(&entry.value) {
            Ok(value) => value,
            Err(e) => {
                self.counters.record_miss();
                return Err(e.into());
            }
        };

        self.counters.record_hit();
        entry.record_access(self.store.now_ms());
        if let Err(e) = self.store.put_access(key, &entry) {
            warn!("Could not record access to cache entry '{}': {}", key, e);
        }

        Ok(Some(value))
    }

    // == Get Or Set ==
    /// Returns the cached value, or awaits `compute` and caches its result.
    ///
    /// Concurrent calls for the same key are not coalesced: a call made while
    /// another call's `compute` is still pending misses and computes again.
    pub async fn get_or_set<T, F, Fut>(&self, key: &str, compute: F, ttl: Option<Duration>) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if let Some(value) = self.get(key)? {
            return Ok(value);
        }

        let value = compute().await;
        self.set(key, &value, ttl)?;
        Ok(value)
    }

    /// Fallible form of [`get_or_set`](Self::get_or_set). A failed
    /// computation is returned as-is and nothing is cached.
    pub async fn try_get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        compute: F,
        ttl: Option<Duration>,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<StorageError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if let Some(value) = self.get(key)? {
            return Ok(value);
        }

        let value = compute().await?;
        self.set(key, &value, ttl)?;
        Ok(value)
    }

    // == Invalidate By Pattern ==
    /// Removes every entry whose key matches the regular expression `pattern`
    /// anywhere, returning how many were removed.
    pub fn invalidate_by_pattern(&self, pattern: &str) -> Result<usize> {
        let regex = Regex::new(pattern)
            .map_err(|e| StorageError::InvalidRequest(format!("Invalid pattern '{}': {}", pattern, e)))?;

        let mut removed = 0;
        for key in self.store.list_keys()? {
            if regex.is_match(&key) {
                self.store.remove(&key)?;
                removed += 1;
            }
        }

        info!("Invalidated {} cache entries matching '{}'", removed, pattern);
        Ok(removed)
    }

    // == Touch TTL ==
    /// Restarts the TTL of a live entry. Returns false if there is none.
    pub fn touch_ttl(&self, key: &str, ttl: Duration) -> Result<bool> {
        let Some(mut entry) = self.store.read_entry(key)? else {
            return Ok(false);
        };
        entry.reset_ttl(self.store.now_ms(), Some(ttl));
        self.store.put_entry(key, &entry)?;
        Ok(true)
    }

    // == Remove / Clear ==
    pub fn remove(&self, key: &str) -> Result<()> {
        self.store.remove(key)
    }

    pub fn clear(&self) -> Result<usize> {
        self.store.clear()
    }

    // == Clear Expired ==
    pub fn clear_expired(&self) -> Result<usize> {
        self.store.clear_expired()
    }

    // == Length ==
    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> Result<usize> {
        Ok(self.store.list_keys()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    // == Stats ==
    pub fn stats(&self) -> Result<CacheStatistics> {
        let now = self.store.now_ms();
        let entries = self.store.scan()?;
        let hits = self.counters.hits();
        let misses = self.counters.misses();
        let reads = hits + misses;

        Ok(CacheStatistics {
            total_entries: entries.len(),
            total_size: self.store.used_bytes()?,
            hit_rate: percentage(hits, reads),
            miss_rate: percentage(misses, reads),
            expired_entries: entries
                .iter()
                .filter(|(_, entry)| entry.is_expired_at(now))
                .count(),
            oldest_entry: entries.iter().map(|(_, entry)| entry.created_at).min(),
            newest_entry: entries.iter().map(|(_, entry)| entry.created_at).max(),
            hits,
            misses,
            evictions: self.counters.evictions(),
        })
    }

    /// Zeroes the hit/miss/eviction counters.
    pub fn reset_stats(&self) {
        self.counters.reset();
    }
}
