//! Export/import snapshot format.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Snapshot format version written by `export_all`.
pub const SNAPSHOT_VERSION: u32 = 1;

// == Snapshot ==
/// Every store's raw envelopes keyed by logical key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
    #[serde(default)]
    pub cache: BTreeMap<String, Value>,
    #[serde(default)]
    pub queue: BTreeMap<String, Value>,
    #[serde(default)]
    pub session: BTreeMap<String, Value>,
    /// RFC 3339 export time
    pub timestamp: String,
    pub version: u32,
}

impl Snapshot {
    pub fn entry_count(&self) -> usize {
        self.data.len() + self.cache.len() + self.queue.len() + self.session.len()
    }
}

// == Import Report ==
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    /// Entries whose envelope could not be read
    pub skipped: usize,
}
