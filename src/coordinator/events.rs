//! Change events and in-process listeners.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::backend::RawStorageEvent;
use crate::store::{envelope, KeySpace, Namespace};

// == Change Type ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Set,
    Remove,
    Clear,
}

// == Storage Change Event ==
/// A change made by another tab, with keys and values decoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageChangeEvent {
    /// Logical key; `None` when the whole store was cleared
    pub key: Option<String>,
    /// Namespace the key belongs to
    pub store: Option<Namespace>,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub timestamp: u64,
    #[serde(rename = "type")]
    pub change_type: ChangeType,
}

impl StorageChangeEvent {
    /// Decodes a raw host notification. Returns `None` for keys outside
    /// `keyspace`.
    pub fn from_raw(keyspace: &KeySpace, raw: &RawStorageEvent, now_ms: u64) -> Option<Self> {
        let Some(physical) = raw.key.as_deref() else {
            return Some(Self {
                key: None,
                store: None,
                old_value: None,
                new_value: None,
                timestamp: now_ms,
                change_type: ChangeType::Clear,
            });
        };

        let (namespace, logical) = keyspace.parse(physical)?;
        let old_value = raw.old_value.as_deref().map(|s| decode_value(logical, s));
        let new_value = raw.new_value.as_deref().map(|s| decode_value(logical, s));
        let change_type = if new_value.is_some() {
            ChangeType::Set
        } else {
            ChangeType::Remove
        };

        Some(Self {
            key: Some(logical.to_string()),
            store: Some(namespace),
            old_value,
            new_value,
            timestamp: now_ms,
            change_type,
        })
    }
}

/// Envelope value if `raw` is an envelope, else the raw JSON, else the raw
/// string.
fn decode_value(key: &str, raw: &str) -> Value {
    match envelope::decode(key, raw) {
        Ok(entry) => entry.value,
        Err(_) => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())),
    }
}

// == Listener Registry ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ListenerId(u64);

/// Callback receiving change events. Errors are logged, never propagated.
pub type Listener = Arc<dyn Fn(&StorageChangeEvent) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&StorageChangeEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Returns false if `id` was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls every listener in registration order and returns how many
    /// completed without error. A failing or panicking listener does not stop
    /// the others.
    pub fn emit(&self, event: &StorageChangeEvent) -> usize {
        // Listeners may add or remove listeners
        let listeners: Vec<(ListenerId, Listener)> = self.listeners.read().clone();

        let mut delivered = 0;
        for (id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => warn!("Change listener {:?} failed: {:#}", id, e),
                Err(_) => error!("Change listener {:?} panicked", id),
            }
        }
        delivered
    }
}
