//! Health and maintenance reports.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::quota::QuotaInfo;

// == Store Kind ==
/// The stores a coordinator owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Data,
    Cache,
    Queue,
    Session,
}

impl StoreKind {
    pub const ALL: [StoreKind; 4] = [
        StoreKind::Data,
        StoreKind::Cache,
        StoreKind::Queue,
        StoreKind::Session,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StoreKind::Data => "data",
            StoreKind::Cache => "cache",
            StoreKind::Queue => "queue",
            StoreKind::Session => "session",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| StorageError::InvalidRequest(format!("Unknown store '{}'", s)))
    }
}

// == Health Report ==
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    /// Whether each store accepted a probe write
    pub stores: BTreeMap<StoreKind, bool>,
    /// True when every store is healthy
    pub overall: bool,
    pub timestamp: String,
}

// == Maintenance Report ==
/// What one maintenance tick did. Steps that failed count zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceReport {
    pub expired_data: usize,
    pub expired_cache: usize,
    /// Queued actions past the age limit
    pub pruned_stale: usize,
    /// Queued actions past the attempt limit
    pub pruned_failed: usize,
    /// `None` if the quota could not be read
    pub quota: Option<QuotaInfo>,
}
