//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheStatistics;
use crate::coordinator::StoreKind;
use crate::queue::PendingAction;

/// Response body for GET /store/:kind/:key
#[derive(Debug, Clone, Serialize)]
pub struct ValueResponse {
    pub store: StoreKind,
    pub key: String,
    pub value: Value,
}

impl ValueResponse {
    pub fn new(store: StoreKind, key: impl Into<String>, value: Value) -> Self {
        Self {
            store,
            key: key.into(),
            value,
        }
    }
}

/// Response body for PUT /store/:kind/:key
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    pub store: StoreKind,
    pub key: String,
}

impl SetResponse {
    pub fn new(store: StoreKind, key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set in {} store", key, store),
            store,
            key,
        }
    }
}

/// Response body for DELETE /store/:kind/:key and DELETE /queue/:id
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key or action id that was removed
    pub key: String,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("'{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for GET /stats
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub cache: CacheStatistics,
    pub data_entries: usize,
    pub session_entries: usize,
    pub queue_length: usize,
}

/// Response body for GET /queue
#[derive(Debug, Clone, Serialize)]
pub struct QueueResponse {
    pub count: usize,
    pub actions: Vec<PendingAction>,
}

impl QueueResponse {
    pub fn new(actions: Vec<PendingAction>) -> Self {
        Self {
            count: actions.len(),
            actions,
        }
    }
}

/// Response body for DELETE /data
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
    pub removed: usize,
}

impl ClearResponse {
    pub fn new(removed: usize) -> Self {
        Self {
            message: format!("Removed {} keys", removed),
            removed,
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_response_serialize() {
        let resp = ValueResponse::new(StoreKind::Cache, "k", Value::from(3));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["store"], "cache");
        assert_eq!(json["value"], 3);
    }

    #[test]
    fn test_set_response_serialize() {
        let resp = SetResponse::new(StoreKind::Data, "my_key");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("my_key"));
        assert!(json.contains("data store"));
    }

    #[test]
    fn test_delete_response_serialize() {
        let resp = DeleteResponse::new("deleted_key");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("deleted_key"));
        assert!(json.contains("deleted"));
    }

    #[test]
    fn test_stats_response_serialize() {
        let resp = StatsResponse {
            cache: CacheStatistics::default(),
            data_entries: 2,
            session_entries: 0,
            queue_length: 1,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["queueLength"], 1);
        assert_eq!(json["cache"]["hitRate"], 0);
    }

    #[test]
    fn test_queue_response_counts() {
        assert_eq!(QueueResponse::new(Vec::new()).count, 0);
    }

    #[test]
    fn test_error_response_serialize() {
        let resp = ErrorResponse::new("Something went wrong");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("error"));
        assert!(json.contains("Something went wrong"));
    }
}
