//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::coordinator::StoreKind;
use crate::queue::{ActionType, NewAction};

/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Returns an error message if `key` is not usable, None if valid.
pub fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {} characters",
            MAX_KEY_LENGTH
        ));
    }
    None
}

/// Request body for PUT /store/:kind/:key
///
/// # Fields
/// - `value`: Any JSON value
/// - `ttl`: Optional TTL in seconds (cache uses its default if not specified)
#[derive(Debug, Clone, Deserialize)]
pub struct SetValueRequest {
    pub value: Value,
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl SetValueRequest {
    /// Validates the request against the target store
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self, kind: StoreKind) -> Option<String> {
        match (kind, self.ttl) {
            (_, Some(0)) => Some("TTL must be at least one second".to_string()),
            (StoreKind::Session, Some(_)) => Some("Session values cannot expire".to_string()),
            _ => None,
        }
    }
}

/// Request body for POST /queue
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub entity_kind: String,
    #[serde(default, alias = "data")]
    pub payload: Value,
}

impl EnqueueRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.entity_kind.trim().is_empty() {
            return Some("Entity kind cannot be empty".to_string());
        }
        None
    }
}

impl From<EnqueueRequest> for NewAction {
    fn from(req: EnqueueRequest) -> Self {
        NewAction::new(req.action_type, req.entity_kind, req.payload)
    }
}
