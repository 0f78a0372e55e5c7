//! Quota Module
//!
//! Measures storage usage against capacity and reports where the bytes go.

mod info;
mod monitor;
mod report;

pub use info::{QuotaBand, QuotaInfo, QuotaSource, CRITICAL_PERCENT, NEAR_LIMIT_PERCENT};
pub use monitor::QuotaMonitor;
pub use report::{recommendations, UsageBreakdown, UsageCategory, UsageReport};
