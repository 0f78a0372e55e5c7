//! Envelope codec
//!
//! Serializes [`StorageEntry`] values into the tagged, versioned JSON envelope
//! stored in the backend, and upgrades older envelopes through a migration
//! table keyed by version.
//!
//! Version history:
//! - v1: `{ value, timestamp, expiresAt? }` with no version tag
//! - v2: adds `v`, `encrypted?`, `accessCount`, `lastAccessAt`

use serde_json::{Map, Value};

use crate::error::{Result, StorageError};
use crate::store::StorageEntry;

/// Version written by [`encode`].
pub const CURRENT_VERSION: u64 = 2;

const VERSION_FIELD: &str = "v";

type Migration = fn(Map<String, Value>) -> std::result::Result<Map<String, Value>, String>;

/// `(from_version, step)` pairs; each step produces `from_version + 1`.
const MIGRATIONS: &[(u64, Migration)] = &[(1, migrate_v1_to_v2)];

// == Encode ==
/// Serializes an entry as a current-version envelope.
pub fn encode(entry: &StorageEntry<Value>) -> Result<String> {
    let Value::Object(mut object) = serde_json::to_value(entry)? else {
        return Err(StorageError::InvalidRequest(
            "entry did not serialize to an object".to_string(),
        ));
    };
    object.insert(VERSION_FIELD.to_string(), Value::from(CURRENT_VERSION));
    Ok(serde_json::to_string(&object)?)
}

// == Decode ==
/// Parses an envelope of any known version.
///
/// Fails with [`StorageError::Corrupted`] when the text is not JSON, required
/// fields are missing, or the version is newer than [`CURRENT_VERSION`].
/// Unknown extra fields are ignored.
pub fn decode(key: &str, raw: &str) -> Result<StorageEntry<Value>> {
    let parsed: Value = serde_json::from_str(raw).map_err(|e| StorageError::corrupted(key, e))?;
    decode_value(key, parsed)
}

/// Like [`decode`], from already-parsed JSON.
pub fn decode_value(key: &str, parsed: Value) -> Result<StorageEntry<Value>> {
    let Value::Object(mut object) = parsed else {
        return Err(StorageError::corrupted(key, "envelope is not an object"));
    };

    let mut version = match object.get(VERSION_FIELD) {
        None => 1,
        Some(v) => v
            .as_u64()
            .ok_or_else(|| StorageError::corrupted(key, "version tag is not a number"))?,
    };

    if version > CURRENT_VERSION {
        return Err(StorageError::corrupted(
            key,
            format!("envelope version {} is newer than {}", version, CURRENT_VERSION),
        ));
    }

    while version < CURRENT_VERSION {
        let step = MIGRATIONS
            .iter()
            .find(|(from, _)| *from == version)
            .map(|(_, step)| *step)
            .ok_or_else(|| {
                StorageError::corrupted(key, format!("no migration from version {}", version))
            })?;
        object = step(object).map_err(|reason| StorageError::corrupted(key, reason))?;
        version += 1;
    }

    object.remove(VERSION_FIELD);
    serde_json::from_value(Value::Object(object)).map_err(|e| StorageError::corrupted(key, e))
}

fn migrate_v1_to_v2(mut object: Map<String, Value>) -> std::result::Result<Map<String, Value>, String> {
    if !object.contains_key("value") {
        return Err("v1 envelope has no value".to_string());
    }
    let timestamp = object
        .get("timestamp")
        .and_then(Value::as_u64)
        .ok_or("v1 envelope has no numeric timestamp")?;

    object.entry("accessCount").or_insert(Value::from(0u64));
    object
        .entry("lastAccessAt")
        .or_insert(Value::from(timestamp));
    Ok(object)
}
