//! Usage breakdown and recommendations.

use serde::Serialize;

use crate::quota::QuotaInfo;
use crate::store::Namespace;

// == Usage Category ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageCategory {
    Tokens,
    Cache,
    Preferences,
    Other,
}

impl UsageCategory {
    /// Classifies a key by substring. Keys in the cache namespace are always
    /// cache; the match is otherwise case-insensitive and heuristic.
    pub fn classify(namespace: Option<Namespace>, key: &str) -> Self {
        if namespace == Some(Namespace::Cache) {
            return UsageCategory::Cache;
        }

        let key = key.to_lowercase();
        if key.contains("cache") {
            UsageCategory::Cache
        } else if key.contains("token") || key.contains("auth") {
            UsageCategory::Tokens
        } else if key.contains("pref") || key.contains("setting") {
            UsageCategory::Preferences
        } else {
            UsageCategory::Other
        }
    }
}

// == Usage Breakdown ==
/// Bytes per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageBreakdown {
    pub tokens: u64,
    pub cache: u64,
    pub preferences: u64,
    pub other: u64,
}

impl UsageBreakdown {
    pub fn add(&mut self, category: UsageCategory, bytes: u64) {
        match category {
            UsageCategory::Tokens => self.tokens += bytes,
            UsageCategory::Cache => self.cache += bytes,
            UsageCategory::Preferences => self.preferences += bytes,
            UsageCategory::Other => self.other += bytes,
        }
    }

    pub fn total(&self) -> u64 {
        self.tokens + self.cache + self.preferences + self.other
    }
}

// == Usage Report ==
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReport {
    pub quota: QuotaInfo,
    pub breakdown: UsageBreakdown,
    pub recommendations: Vec<String>,
}

// == Recommendations ==
/// Advice derived only from the figures passed in.
pub fn recommendations(info: &QuotaInfo, breakdown: &UsageBreakdown) -> Vec<String> {
    let mut advice = Vec::new();

    if info.is_critical {
        advice.push(format!(
            "Storage is critically full ({:.1}% used). Clear cached data and stale offline actions now.",
            info.percentage_used
        ));
    } else if info.is_near_limit {
        advice.push(format!(
            "Storage is nearly full ({:.1}% used). Consider removing data you no longer need.",
            info.percentage_used
        ));
    }

    if breakdown.cache > breakdown.tokens + breakdown.preferences {
        advice.push(format!(
            "Cached data takes {} bytes, more than tokens and preferences combined. Clearing the cache would free that space.",
            breakdown.cache
        ));
    }

    if advice.is_empty() {
        advice.push("Storage usage is healthy.".to_string());
    }
    advice
}
