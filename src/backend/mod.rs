//! Backend Module
//!
//! The host-provided key-value store every logical store writes through.
//! Backends hold plain strings; envelopes, namespaces and expiry live above.

mod file;
mod memory;

use std::fmt::Debug;

use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

pub use file::FileBackend;
pub use memory::MemoryBackend;

/// Key written and removed by [`StorageBackend::probe`].
pub const PROBE_KEY: &str = "__storage_probe__";

/// Identifies one execution context ("tab") sharing a backend.
pub type TabId = Uuid;

// == Backend Error ==
/// Failures reported by a host store.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The write would exceed the host's capacity
    #[error("quota exceeded")]
    QuotaExceeded,

    /// Storage is switched off for this context
    #[error("storage disabled: {0}")]
    Disabled(String),

    /// Persisting to disk failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// On-disk contents could not be encoded or decoded
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

// == Change Notification ==
/// A write observed on a shared backend, as the host delivers it.
///
/// `key == None` means the whole store was cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStorageEvent {
    pub key: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    /// Context that performed the write
    pub origin: TabId,
}

/// Host-level capacity figures, when the platform exposes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageEstimate {
    pub usage: u64,
    pub quota: u64,
}

// == Storage Backend Trait ==
/// A host key-value store with effectively atomic single-key writes.
pub trait StorageBackend: Send + Sync + Debug {
    /// Reads the raw string under `key`.
    fn get_item(&self, key: &str) -> Result<Option<String>, BackendError>;

    /// Writes `value` under `key`, failing with [`BackendError::QuotaExceeded`]
    /// when the host refuses the write for lack of space.
    fn set_item(&self, key: &str, value: &str) -> Result<(), BackendError>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), BackendError>;

    /// Every key currently stored, in no particular order.
    fn keys(&self) -> Result<Vec<String>, BackendError>;

    /// Removes every key.
    fn clear(&self) -> Result<(), BackendError> {
        for key in self.keys()? {
            self.remove_item(&key)?;
        }
        Ok(())
    }

    /// Host capacity estimate; `None` when the platform has none.
    fn estimate(&self) -> Option<StorageEstimate> {
        None
    }

    /// The context this handle writes as.
    fn tab_id(&self) -> TabId;

    /// Change notifications from every context sharing this store, including
    /// this one. `None` when the host cannot notify.
    fn subscribe(&self) -> Option<broadcast::Receiver<RawStorageEvent>> {
        None
    }

    /// Checks the store accepts a write and a delete.
    fn probe(&self) -> Result<(), BackendError> {
        self.set_item(PROBE_KEY, PROBE_KEY)?;
        self.remove_item(PROBE_KEY)
    }
}

// == Byte Accounting ==
/// Size of a string under the UTF-16, 2-bytes-per-code-unit assumption.
pub fn utf16_bytes(s: &str) -> u64 {
    s.encode_utf16().count() as u64 * 2
}

/// Size of one stored key/value pair.
pub fn item_bytes(key: &str, value: &str) -> u64 {
    utf16_bytes(key) + utf16_bytes(value)
}

/// Sum of [`item_bytes`] over every item of a backend.
pub fn total_bytes(backend: &dyn StorageBackend) -> Result<u64, BackendError> {
    let mut total = 0;
    for key in backend.keys()? {
        if let Some(value) = backend.get_item(&key)? {
            total += item_bytes(&key, &value);
        }
    }
    Ok(total)
}
