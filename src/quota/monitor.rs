//! Quota Monitor
//!
//! Reads the host estimate when the backend has one, otherwise counts bytes
//! under the UTF-16 assumption against the configured capacity.

use std::sync::Arc;

use tracing::debug;

use crate::backend::{item_bytes, total_bytes, StorageBackend};
use crate::error::Result;
use crate::quota::{recommendations, QuotaInfo, QuotaSource, UsageBreakdown, UsageCategory, UsageReport};
use crate::store::KeySpace;

#[derive(Debug, Clone)]
pub struct QuotaMonitor {
    backend: Arc<dyn StorageBackend>,
    keyspace: KeySpace,
    assumed_capacity: u64,
}

impl QuotaMonitor {
    pub fn new(backend: Arc<dyn StorageBackend>, keyspace: KeySpace, assumed_capacity: u64) -> Self {
        Self {
            backend,
            keyspace,
            assumed_capacity,
        }
    }

    // == Quota Info ==
    pub fn get_quota_info(&self) -> Result<QuotaInfo> {
        if let Some(estimate) = self.backend.estimate() {
            return Ok(QuotaInfo::from_usage(
                estimate.usage,
                estimate.quota,
                QuotaSource::Estimate,
            ));
        }

        let usage = total_bytes(self.backend.as_ref())?;
        debug!(
            "No host estimate; counted {} bytes against {} assumed",
            usage, self.assumed_capacity
        );
        Ok(QuotaInfo::from_usage(
            usage,
            self.assumed_capacity,
            QuotaSource::Manual,
        ))
    }

    // == Usage Report ==
    /// Quota figures plus bytes per category over every key in the store.
    pub fn get_usage_report(&self) -> Result<UsageReport> {
        let quota = self.get_quota_info()?;

        let mut breakdown = UsageBreakdown::default();
        for physical in self.backend.keys()? {
            let Some(raw) = self.backend.get_item(&physical)? else {
                continue;
            };
            let category = match self.keyspace.parse(&physical) {
                Some((namespace, logical)) => UsageCategory::classify(Some(namespace), logical),
                None => UsageCategory::classify(None, &physical),
            };
            breakdown.add(category, item_bytes(&physical, &raw));
        }

        let recommendations = recommendations(&quota, &breakdown);
        Ok(UsageReport {
            quota,
            breakdown,
            recommendations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    fn monitor(backend: MemoryBackend, assumed: u64) -> QuotaMonitor {
        QuotaMonitor::new(Arc::new(backend), KeySpace::new("app"), assumed)
    }

    #[test]
    fn test_manual_count_without_estimate() {
        let backend = MemoryBackend::new();
        backend.set_item("ab", "cd").unwrap();

        let info = monitor(backend, 100).get_quota_info().unwrap();

        assert_eq!(info.source, QuotaSource::Manual);
        assert_eq!(info.usage, 8);
        assert_eq!(info.quota, 100);
        assert_eq!(info.usage + info.available, info.quota);
    }

    #[test]
    fn test_prefers_host_estimate() {
        let backend = MemoryBackend::with_capacity(1000);
        backend.set_item("k", "v").unwrap();

        let info = monitor(backend, 5).get_quota_info().unwrap();

        assert_eq!(info.source, QuotaSource::Estimate);
        assert_eq!(info.quota, 1000);
        assert_eq!(info.usage, 4);
    }

    #[test]
    fn test_fallback_overflow_is_critical() {
        let backend = MemoryBackend::new();
        backend.set_item("key", &"x".repeat(100)).unwrap();

        let info = monitor(backend, 50).get_quota_info().unwrap();

        assert!(info.is_critical);
        assert_eq!(info.available, 0);
    }

    #[test]
    fn test_usage_report_breakdown() {
        let backend = MemoryBackend::new();
        backend.set_item("app:cache:recipes", "xxxxxxxxxx").unwrap();
        backend.set_item("app:data:auth_token", "t").unwrap();
        backend.set_item("app:data:user_prefs", "p").unwrap();
        backend.set_item("unrelated", "o").unwrap();

        let report = monitor(backend.clone(), 1 << 20).get_usage_report().unwrap();

        assert_eq!(report.breakdown.cache, item_bytes("app:cache:recipes", "xxxxxxxxxx"));
        assert_eq!(report.breakdown.tokens, item_bytes("app:data:auth_token", "t"));
        assert_eq!(report.breakdown.preferences, item_bytes("app:data:user_prefs", "p"));
        assert_eq!(report.breakdown.other, item_bytes("unrelated", "o"));
        assert_eq!(report.breakdown.total(), report.quota.usage);
        assert_eq!(report.recommendations.len(), 1);
        assert!(report.recommendations[0].contains("Clearing the cache"));
    }

    #[test]
    fn test_disabled_backend_errors() {
        let result = monitor(MemoryBackend::disabled(), 100).get_quota_info();
        assert!(result.is_err());
    }
}
