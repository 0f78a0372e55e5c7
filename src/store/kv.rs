//! Key-Value Store Module
//!
//! Typed, namespaced persistence over a [`StorageBackend`]. Values are wrapped
//! in a [`StorageEntry`] and written as versioned envelopes under
//! `<prefix>:<namespace>:<key>`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::{item_bytes, total_bytes, BackendError, StorageBackend};
use crate::clock::SharedClock;
use crate::error::{Result, StorageError};
use crate::store::{envelope, KeySpace, Namespace, StorageEntry};

/// Share of the assumed capacity above which a write logs a warning.
pub const SOFT_LIMIT_RATIO: f64 = 0.9;

// == Set Options ==
/// Per-write options for [`KeyValueStore::set`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Lifetime of the entry; `None` never expires
    pub ttl: Option<Duration>,
    /// Marks the value as ciphertext in the envelope
    pub encrypted: bool,
}

impl SetOptions {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Self::default()
        }
    }
}

// == Key-Value Store ==
/// A namespaced view of the persistent backend.
///
/// Availability is probed once at construction. An unavailable store answers
/// reads with `None` and turns writes into no-ops.
#[derive(Debug, Clone)]
pub struct KeyValueStore {
    backend: Arc<dyn StorageBackend>,
    keyspace: KeySpace,
    namespace: Namespace,
    clock: SharedClock,
    assumed_capacity: u64,
    available: bool,
}

impl KeyValueStore {
    // == Constructor ==
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        keyspace: KeySpace,
        namespace: Namespace,
        clock: SharedClock,
        assumed_capacity: u64,
    ) -> Self {
        let available = match backend.probe() {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "{} store disabled: {}",
                    namespace,
                    StorageError::from(e)
                );
                false
            }
        };

        Self {
            backend,
            keyspace,
            namespace,
            clock,
            assumed_capacity,
            available,
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Result of the construction-time probe.
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Probes the backend again without changing the cached availability.
    pub fn check_health(&self) -> bool {
        self.available && self.backend.probe().is_ok()
    }

    pub(crate) fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn physical(&self, key: &str) -> String {
        self.keyspace.physical(self.namespace, key)
    }

    // == Set ==
    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// Fails only with [`StorageError::CapacityExceeded`] (after one sweep and
    /// retry), a serialization error, or a non-capacity backend failure.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, options: SetOptions) -> Result<()> {
        if !self.available {
            debug!("Ignoring write to '{}' on unavailable {} store", key, self.namespace);
            return Ok(());
        }

        let mut entry = StorageEntry::new(serde_json::to_value(value)?, self.now_ms(), options.ttl);
        entry.encrypted = options.encrypted;
        self.put_entry(key, &entry)
    }

    /// Writes a prepared entry as-is.
    pub fn put_entry(&self, key: &str, entry: &StorageEntry) -> Result<()> {
        if !self.available {
            return Ok(());
        }
        let raw = envelope::encode(entry)?;
        self.write_raw(key, &raw, true)
    }

    /// Rewrites an entry whose only change is access bookkeeping. Skips the
    /// soft-limit measurement, which walks the whole backend.
    pub(crate) fn put_access(&self, key: &str, entry: &StorageEntry) -> Result<()> {
        if !self.available {
            return Ok(());
        }
        let raw = envelope::encode(entry)?;
        self.write_raw(key, &raw, false)
    }

    // == Get ==
    /// Reads the value under `key`.
    ///
    /// Expired and corrupted entries read as `None` and are deleted. A value
    /// that does not deserialize into `T` is an error.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_entry(key)? {
            Some(entry) => Ok(Some(serde_json::from_value(entry.value)?)),
            None => Ok(None),
        }
    }

    /// Reads the full entry under `key`, applying lazy expiry.
    pub fn read_entry(&self, key: &str) -> Result<Option<StorageEntry>> {
        if !self.available {
            return Ok(None);
        }

        let physical = self.physical(key);
        let Some(raw) = self.backend.get_item(&physical)? else {
            return Ok(None);
        };

        match self.decode_or_drop(key, &physical, &raw)? {
            Some(entry) if entry.is_expired_at(self.now_ms()) => {
                debug!("Dropping expired entry '{}' on read", key);
                self.backend.remove_item(&physical)?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// True if a stored entry exists for `key` regardless of expiry.
    pub(crate) fn contains_raw(&self, key: &str) -> Result<bool> {
        if !self.available {
            return Ok(false);
        }
        Ok(self.backend.get_item(&self.physical(key))?.is_some())
    }

    // == Remove ==
    pub fn remove(&self, key: &str) -> Result<()> {
        if !self.available {
            return Ok(());
        }
        self.backend.remove_item(&self.physical(key))?;
        Ok(())
    }

    // == Has ==
    pub fn has(&self, key: &str) -> Result<bool> {
        Ok(self.read_entry(key)?.is_some())
    }

    // == Clear ==
    /// Removes every key of this namespace, returning how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let keys = self.list_keys()?;
        for key in &keys {
            self.backend.remove_item(&self.physical(key))?;
        }
        info!("Cleared {} entries from {} store", keys.len(), self.namespace);
        Ok(keys.len())
    }

    // == List Keys ==
    /// Logical keys of this namespace, sorted. Expired entries not yet swept
    /// are included.
    pub fn list_keys(&self) -> Result<Vec<String>> {
        if !self.available {
            return Ok(Vec::new());
        }
        self.keyspace.keys_in(self.backend.as_ref(), self.namespace)
    }

    // == Used Bytes ==
    /// Bytes held by this namespace under the UTF-16 assumption.
    pub fn used_bytes(&self) -> Result<u64> {
        let mut total = 0;
        for key in self.list_keys()? {
            let physical = self.physical(&key);
            if let Some(raw) = self.backend.get_item(&physical)? {
                total += item_bytes(&physical, &raw);
            }
        }
        Ok(total)
    }

    // == Scan ==
    /// Every decodable entry of this namespace, expired ones included.
    /// Corrupted entries are deleted along the way.
    pub fn scan(&self) -> Result<Vec<(String, StorageEntry)>> {
        let mut entries = Vec::new();
        for key in self.list_keys()? {
            let physical = self.physical(&key);
            let Some(raw) = self.backend.get_item(&physical)? else {
                continue;
            };
            if let Some(entry) = self.decode_or_drop(&key, &physical, &raw)? {
                entries.push((key, entry));
            }
        }
        Ok(entries)
    }

    // == Clear Expired ==
    /// Deletes expired entries of this namespace and returns how many.
    pub fn clear_expired(&self) -> Result<usize> {
        let now = self.now_ms();
        let mut removed = 0;
        for (key, entry) in self.scan()? {
            if entry.is_expired_at(now) {
                self.backend.remove_item(&self.physical(&key))?;
                removed += 1;
            }
        }
        if removed > 0 {
            debug!("Removed {} expired entries from {} store", removed, self.namespace);
        }
        Ok(removed)
    }

    // == Export ==
    /// Raw envelopes of every live entry, keyed by logical key.
    pub fn export(&self) -> Result<BTreeMap<String, Value>> {
        let now = self.now_ms();
        let mut out = BTreeMap::new();
        for (key, entry) in self.scan()? {
            if entry.is_expired_at(now) {
                continue;
            }
            let raw = envelope::encode(&entry)?;
            out.insert(key, serde_json::from_str(&raw)?);
        }
        Ok(out)
    }

    // == Import ==
    /// Writes a raw envelope taken from an export, upgrading its version.
    pub fn import_raw(&self, key: &str, raw: &Value) -> Result<()> {
        let entry = envelope::decode_value(key, raw.clone())?;
        self.put_entry(key, &entry)
    }

    // == Internals ==
    fn decode_or_drop(&self, key: &str, physical: &str, raw: &str) -> Result<Option<StorageEntry>> {
        match envelope::decode(key, raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!("{}; removing it", e);
                self.backend.remove_item(physical)?;
                Ok(None)
            }
        }
    }

    fn write_raw(&self, key: &str, raw: &str, check_soft_limit: bool) -> Result<()> {
        let physical = self.physical(key);
        if check_soft_limit {
            self.warn_if_near_capacity(&physical, raw);
        }

        match self.backend.set_item(&physical, raw) {
            Err(BackendError::QuotaExceeded) => {
                let swept = self.sweep_expired_everywhere();
                warn!(
                    "Quota exceeded writing '{}'; swept {} expired entries, retrying once",
                    key, swept
                );
                match self.backend.set_item(&physical, raw) {
                    Err(BackendError::QuotaExceeded) => {
                        Err(StorageError::CapacityExceeded(key.to_string()))
                    }
                    other => other.map_err(StorageError::from),
                }
            }
            other => other.map_err(StorageError::from),
        }
    }

    fn warn_if_near_capacity(&self, physical: &str, raw: &str) {
        let current = match total_bytes(self.backend.as_ref()) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Could not measure storage usage: {}", e);
                return;
            }
        };
        let replaced = self
            .backend
            .get_item(physical)
            .ok()
            .flatten()
            .map_or(0, |old| item_bytes(physical, &old));
        let projected = current.saturating_sub(replaced) + item_bytes(physical, raw);
        let soft_limit = (self.assumed_capacity as f64 * SOFT_LIMIT_RATIO) as u64;

        if projected > soft_limit {
            warn!(
                projected,
                capacity = self.assumed_capacity,
                "Write to {} takes storage above 90% of capacity",
                physical
            );
        }
    }

    /// Removes expired envelopes from every namespace of the key space.
    fn sweep_expired_everywhere(&self) -> usize {
        let backend = self.backend.as_ref();
        let keys = match self.keyspace.owned_keys(backend) {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Expiry sweep could not list keys: {}", e);
                return 0;
            }
        };

        let now = self.now_ms();
        keys.iter()
            .filter(|physical| match backend.get_item(physical) {
                Ok(Some(raw)) => envelope::decode(physical, &raw)
                    .map(|entry| entry.is_expired_at(now))
                    .unwrap_or(false),
                _ => false,
            })
            .filter(|physical| backend.remove_item(physical).is_ok())
            .count()
    }
}
