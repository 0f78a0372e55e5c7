//! Ephemeral store
//!
//! Session-scoped key-value storage for short-lived UI state. It lives on its
//! own backend that disappears with the tab, so there is no expiry, LRU, or
//! quota handling.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::{item_bytes, BackendError, StorageBackend};
use crate::clock::SharedClock;
use crate::error::{Result, StorageError};
use crate::store::{envelope, StorageEntry};

const SESSION_TAG: &str = "session";

#[derive(Debug, Clone)]
pub struct EphemeralStore {
    backend: Arc<dyn StorageBackend>,
    prefix: String,
    clock: SharedClock,
    available: bool,
}

impl EphemeralStore {
    pub fn new(backend: Arc<dyn StorageBackend>, prefix: &str, clock: SharedClock) -> Self {
        let available = match backend.probe() {
            Ok(()) => true,
            Err(e) => {
                warn!("session store disabled: {}", StorageError::from(e));
                false
            }
        };

        Self {
            backend,
            prefix: format!("{}:{}:", prefix, SESSION_TAG),
            clock,
            available,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn check_health(&self) -> bool {
        self.available && self.backend.probe().is_ok()
    }

    fn physical(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        if !self.available {
            return Ok(());
        }
        let entry = StorageEntry::new(serde_json::to_value(value)?, self.clock.now_ms(), None);
        let raw = envelope::encode(&entry)?;
        match self.backend.set_item(&self.physical(key), &raw) {
            Err(BackendError::QuotaExceeded) => Err(StorageError::CapacityExceeded(key.to_string())),
            other => other.map_err(StorageError::from),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_value(key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    fn read_value(&self, key: &str) -> Result<Option<Value>> {
        if !self.available {
            return Ok(None);
        }
        let physical = self.physical(key);
        let Some(raw) = self.backend.get_item(&physical)? else {
            return Ok(None);
        };
        match envelope::decode(key, &raw) {
            Ok(entry) => Ok(Some(entry.value)),
            Err(e) => {
                debug!("{}; removing it", e);
                self.backend.remove_item(&physical)?;
                Ok(None)
            }
        }
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        if self.available {
            self.backend.remove_item(&self.physical(key))?;
        }
        Ok(())
    }

    pub fn has(&self, key: &str) -> Result<bool> {
        Ok(self.read_value(key)?.is_some())
    }

    /// Removes every session key, returning how many.
    pub fn clear(&self) -> Result<usize> {
        let keys = self.list_keys()?;
        for key in &keys {
            self.backend.remove_item(&self.physical(key))?;
        }
        Ok(keys.len())
    }

    /// Session keys, sorted.
    pub fn list_keys(&self) -> Result<Vec<String>> {
        if !self.available {
            return Ok(Vec::new());
        }
        let mut keys: Vec<String> = self
            .backend
            .keys()?
            .iter()
            .filter_map(|physical| physical.strip_prefix(self.prefix.as_str()))
            .map(str::to_string)
            .collect();
        keys.sort();
        Ok(keys)
    }

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

    /// Raw envelopes keyed by session key. Corrupted entries are removed.
    pub fn export(&self) -> Result<BTreeMap<String, Value>> {
        let mut out = BTreeMap::new();
        for key in self.list_keys()? {
            let physical = self.physical(&key);
            let Some(raw) = self.backend.get_item(&physical)? else {
                continue;
            };
            match envelope::decode(&key, &raw) {
                Ok(entry) => {
                    out.insert(key, serde_json::from_str(&envelope::encode(&entry)?)?);
                }
                Err(e) => {
                    debug!("{}; removing it", e);
                    self.backend.remove_item(&physical)?;
                }
            }
        }
        Ok(out)
    }

    /// Writes a raw envelope taken from an export.
    pub fn import_raw(&self, key: &str, raw: &Value) -> Result<()> {
        let mut entry = envelope::decode_value(key, raw.clone())?;
        entry.expires_at = None;
        if !self.available {
            return Ok(());
        }
        match self.backend.set_item(&self.physical(key), &envelope::encode(&entry)?) {
            Err(BackendError::QuotaExceeded) => Err(StorageError::CapacityExceeded(key.to_string())),
            other => other.map_err(StorageError::from),
        }
    }
}
