//! In-memory backend
//!
//! A process-local host store. Handles created with [`MemoryBackend::open_tab`]
//! share the same items and change channel, which is how several "tabs" of one
//! origin are modelled.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{
    item_bytes, BackendError, RawStorageEvent, StorageBackend, StorageEstimate, TabId,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
struct Shared {
    items: Mutex<BTreeMap<String, String>>,
    capacity: Option<u64>,
    disabled: bool,
    events: broadcast::Sender<RawStorageEvent>,
}

// == Memory Backend ==
/// Shared in-memory key-value store with an optional byte capacity.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
    tab: TabId,
}

impl MemoryBackend {
    /// Creates an unbounded store.
    pub fn new() -> Self {
        Self::build(None, false)
    }

    /// Creates a store that refuses writes beyond `bytes` (UTF-16 accounting).
    pub fn with_capacity(bytes: u64) -> Self {
        Self::build(Some(bytes), false)
    }

    /// Creates a store that rejects every operation, like storage switched
    /// off by browser policy.
    pub fn disabled() -> Self {
        Self::build(None, true)
    }

    fn build(capacity: Option<u64>, disabled: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                items: Mutex::new(BTreeMap::new()),
                capacity,
                disabled,
                events,
            }),
            tab: Uuid::new_v4(),
        }
    }

    /// Opens another context on the same store.
    pub fn open_tab(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            tab: Uuid::new_v4(),
        }
    }

    /// Bytes currently held.
    pub fn used_bytes(&self) -> u64 {
        let items = self.shared.items.lock();
        items.iter().map(|(k, v)| item_bytes(k, v)).sum()
    }

    fn check_enabled(&self) -> Result<(), BackendError> {
        if self.shared.disabled {
            Err(BackendError::Disabled(
                "storage is disabled for this context".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn notify(&self, key: Option<&str>, old_value: Option<String>, new_value: Option<String>) {
        // No subscribers is fine
        let _ = self.shared.events.send(RawStorageEvent {
            key: key.map(str::to_string),
            old_value,
            new_value,
            origin: self.tab,
        });
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, BackendError> {
        self.check_enabled()?;
        Ok(self.shared.items.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), BackendError> {
        self.check_enabled()?;
        let old = {
            let mut items = self.shared.items.lock();
            if let Some(capacity) = self.shared.capacity {
                let used: u64 = items.iter().map(|(k, v)| item_bytes(k, v)).sum();
                let replaced = items.get(key).map_or(0, |old| item_bytes(key, old));
                if used - replaced + item_bytes(key, value) > capacity {
                    return Err(BackendError::QuotaExceeded);
                }
            }
            items.insert(key.to_string(), value.to_string())
        };
        self.notify(Some(key), old, Some(value.to_string()));
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), BackendError> {
        self.check_enabled()?;
        let old = self.shared.items.lock().remove(key);
        if old.is_some() {
            self.notify(Some(key), old, None);
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, BackendError> {
        self.check_enabled()?;
        Ok(self.shared.items.lock().keys().cloned().collect())
    }

    fn clear(&self) -> Result<(), BackendError> {
        self.check_enabled()?;
        self.shared.items.lock().clear();
        self.notify(None, None, None);
        Ok(())
    }

    fn estimate(&self) -> Option<StorageEstimate> {
        let quota = self.shared.capacity?;
        Some(StorageEstimate {
            usage: self.used_bytes(),
            quota,
        })
    }

    fn tab_id(&self) -> TabId {
        self.tab
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<RawStorageEvent>> {
        Some(self.shared.events.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let backend = MemoryBackend::new();

        backend.set_item("k", "v").unwrap();
        assert_eq!(backend.get_item("k").unwrap().as_deref(), Some("v"));

        backend.remove_item("k").unwrap();
        assert!(backend.get_item("k").unwrap().is_none());
        // Removing again is a no-op
        backend.remove_item("k").unwrap();
    }

    #[test]
    fn test_capacity_rejects_oversized_write() {
        // "k" + "vvvv" = 10 bytes
        let backend = MemoryBackend::with_capacity(10);
        backend.set_item("k", "vvvv").unwrap();

        let result = backend.set_item("x", "y");
        assert!(matches!(result, Err(BackendError::QuotaExceeded)));

        // Replacing in place within the budget still works
        backend.set_item("k", "ww").unwrap();
        assert_eq!(backend.used_bytes(), 6);
    }

    #[test]
    fn test_estimate_only_with_capacity() {
        assert!(MemoryBackend::new().estimate().is_none());

        let backend = MemoryBackend::with_capacity(100);
        backend.set_item("ab", "cd").unwrap();
        let estimate = backend.estimate().unwrap();
        assert_eq!(estimate.usage, 8);
        assert_eq!(estimate.quota, 100);
    }

    #[test]
    fn test_disabled_rejects_everything() {
        let backend = MemoryBackend::disabled();
        assert!(matches!(
            backend.get_item("k"),
            Err(BackendError::Disabled(_))
        ));
        assert!(backend.probe().is_err());
    }

    #[test]
    fn test_tabs_share_items_and_events() {
        let first = MemoryBackend::new();
        let second = first.open_tab();
        assert_ne!(first.tab_id(), second.tab_id());

        let mut events = first.subscribe().unwrap();
        second.set_item("shared", "1").unwrap();

        assert_eq!(first.get_item("shared").unwrap().as_deref(), Some("1"));

        let event = events.try_recv().unwrap();
        assert_eq!(event.key.as_deref(), Some("shared"));
        assert_eq!(event.old_value, None);
        assert_eq!(event.new_value.as_deref(), Some("1"));
        assert_eq!(event.origin, second.tab_id());
    }

    #[test]
    fn test_clear_emits_keyless_event() {
        let backend = MemoryBackend::new();
        backend.set_item("a", "1").unwrap();
        let mut events = backend.subscribe().unwrap();

        backend.clear().unwrap();

        assert!(backend.keys().unwrap().is_empty());
        let event = events.try_recv().unwrap();
        assert!(event.key.is_none());
    }
}
