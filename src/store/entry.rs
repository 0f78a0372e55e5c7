//! Storage Entry Module
//!
//! The value-plus-metadata record every persistent store writes.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::duration_ms;

// == Storage Entry ==
/// A stored value with creation, expiry and access metadata.
///
/// Only cache reads touch `access_count` and `last_access_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEntry<T = Value> {
    /// The stored value
    pub value: T,
    /// Creation timestamp (Unix milliseconds)
    #[serde(rename = "timestamp")]
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    /// Value holds ciphertext
    #[serde(default, skip_serializing_if = "is_false")]
    pub encrypted: bool,
    pub access_count: u64,
    pub last_access_at: u64,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

impl<T> StorageEntry<T> {
    // == Constructor ==
    /// Creates an entry at `now_ms`, expiring `ttl` later if given.
    pub fn new(value: T, now_ms: u64, ttl: Option<Duration>) -> Self {
        Self {
            value,
            created_at: now_ms,
            expires_at: ttl.map(|ttl| now_ms.saturating_add(duration_ms(ttl))),
            encrypted: false,
            access_count: 0,
            last_access_at: now_ms,
        }
    }

    // == Is Expired ==
    /// An entry is expired strictly after its expiry instant; at exactly
    /// `expires_at` it is still valid.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        self.expires_at.is_some_and(|expires| now_ms > expires)
    }

    /// Remaining lifetime in milliseconds, `None` when the entry never expires.
    pub fn ttl_remaining_ms(&self, now_ms: u64) -> Option<u64> {
        self.expires_at.map(|expires| expires.saturating_sub(now_ms))
    }

    /// Records a cache read.
    pub fn record_access(&mut self, now_ms: u64) {
        self.access_count += 1;
        self.last_access_at = now_ms;
    }

    /// Restarts the expiry window from `now_ms`.
    pub fn reset_ttl(&mut self, now_ms: u64, ttl: Option<Duration>) {
        self.expires_at = ttl.map(|ttl| now_ms.saturating_add(duration_ms(ttl)));
    }

    /// Replaces the value, keeping metadata.
    pub fn map_value<U>(self, f: impl FnOnce(T) -> U) -> StorageEntry<U> {
        StorageEntry {
            value: f(self.value),
            created_at: self.created_at,
            expires_at: self.expires_at,
            encrypted: self.encrypted,
            access_count: self.access_count,
            last_access_at: self.last_access_at,
        }
    }
}
