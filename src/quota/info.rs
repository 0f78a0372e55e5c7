//! Quota figures and usage bands.

use serde::Serialize;

/// Usage at or above this percentage is near the limit.
pub const NEAR_LIMIT_PERCENT: f64 = 80.0;

/// Usage at or above this percentage is critical.
pub const CRITICAL_PERCENT: f64 = 95.0;

// == Quota Source ==
/// Where the figures came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaSource {
    /// Reported by the host store
    Estimate,
    /// Counted key by key against the assumed capacity
    Manual,
}

// == Quota Band ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum QuotaBand {
    Normal,
    NearLimit,
    Critical,
}

// == Quota Info ==
/// Usage against capacity. `usage + available == quota` always holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaInfo {
    pub usage: u64,
    pub quota: u64,
    pub available: u64,
    /// 0 to 100
    pub percentage_used: f64,
    pub is_near_limit: bool,
    pub is_critical: bool,
    pub source: QuotaSource,
}

impl QuotaInfo {
    /// Builds the figures for `usage` bytes out of `quota`.
    ///
    /// A usage above the quota raises the quota to the usage, which reads as
    /// 100% and critical.
    pub fn from_usage(usage: u64, quota: u64, source: QuotaSource) -> Self {
        let quota = quota.max(usage);
        let percentage_used = if quota == 0 {
            0.0
        } else {
            usage as f64 / quota as f64 * 100.0
        };

        Self {
            usage,
            quota,
            available: quota - usage,
            percentage_used,
            is_near_limit: percentage_used >= NEAR_LIMIT_PERCENT,
            is_critical: percentage_used >= CRITICAL_PERCENT,
            source,
        }
    }

    pub fn band(&self) -> QuotaBand {
        if self.is_critical {
            QuotaBand::Critical
        } else if self.is_near_limit {
            QuotaBand::NearLimit
        } else {
            QuotaBand::Normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands() {
        let info = |usage| QuotaInfo::from_usage(usage, 1000, QuotaSource::Manual);

        assert_eq!(info(0).band(), QuotaBand::Normal);
        assert_eq!(info(799).band(), QuotaBand::Normal);
        assert_eq!(info(800).band(), QuotaBand::NearLimit);
        assert_eq!(info(949).band(), QuotaBand::NearLimit);
        assert_eq!(info(950).band(), QuotaBand::Critical);
        assert!(info(950).is_near_limit);
    }

    #[test]
    fn test_usage_plus_available_is_quota() {
        let info = QuotaInfo::from_usage(300, 1000, QuotaSource::Estimate);
        assert_eq!(info.usage + info.available, info.quota);
        assert!((info.percentage_used - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_usage_over_quota_raises_quota() {
        let info = QuotaInfo::from_usage(1500, 1000, QuotaSource::Manual);

        assert_eq!(info.quota, 1500);
        assert_eq!(info.available, 0);
        assert!(info.is_critical);
        assert!((info.percentage_used - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_quota() {
        let info = QuotaInfo::from_usage(0, 0, QuotaSource::Manual);
        assert_eq!(info.percentage_used, 0.0);
        assert_eq!(info.band(), QuotaBand::Normal);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(QuotaInfo::from_usage(1, 2, QuotaSource::Estimate)).unwrap();
        assert_eq!(json["percentageUsed"], 50.0);
        assert_eq!(json["isNearLimit"], false);
        assert_eq!(json["source"], "estimate");
    }
}
