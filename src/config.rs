//! Configuration Module
//!
//! Handles loading and managing storage configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Storage configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Prefix shared by every physical key this subsystem writes
    pub prefix: String,
    /// Default cache TTL in seconds for entries without explicit TTL
    pub default_ttl: u64,
    /// Maximum number of entries the cache layer holds before evicting
    pub max_entries: usize,
    /// Capacity in bytes assumed when the host gives no estimate
    pub assumed_capacity: u64,
    /// Maintenance tick interval in seconds
    pub maintenance_interval: u64,
    /// Queued actions older than this many days are pruned by maintenance
    pub queue_max_age_days: u32,
    /// Queued actions with at least this many attempts are pruned by maintenance
    pub queue_max_attempts: u32,
    /// Admin HTTP server port
    pub server_port: u16,
    /// File backing the persistent store
    pub data_file: PathBuf,
    /// Hex-encoded AES-256 key for the encrypted store
    pub encryption_key: Option<String>,
}

/// 5 MiB, the usual per-origin local storage ceiling.
pub const DEFAULT_ASSUMED_CAPACITY: u64 = 5 * 1024 * 1024;

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `STORE_PREFIX` - Physical key prefix (default: storekeeper)
    /// - `DEFAULT_TTL` - Default cache TTL in seconds (default: 300)
    /// - `MAX_ENTRIES` - Cache entry cap (default: 100)
    /// - `ASSUMED_CAPACITY` - Fallback capacity in bytes (default: 5 MiB)
    /// - `MAINTENANCE_INTERVAL` - Maintenance frequency in seconds (default: 300)
    /// - `QUEUE_MAX_AGE_DAYS` - Queue pruning age (default: 7)
    /// - `QUEUE_MAX_ATTEMPTS` - Queue pruning attempts (default: 5)
    /// - `SERVER_PORT` - Admin HTTP port (default: 3000)
    /// - `DATA_FILE` - Persistent store path (default: storekeeper.json)
    /// - `ENCRYPTION_KEY` - Hex AES-256 key (default: unset)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            prefix: env::var("STORE_PREFIX")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.prefix),
            default_ttl: parse_var("DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            max_entries: parse_var("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            assumed_capacity: parse_var("ASSUMED_CAPACITY").unwrap_or(defaults.assumed_capacity),
            maintenance_interval: parse_var("MAINTENANCE_INTERVAL")
                .unwrap_or(defaults.maintenance_interval),
            queue_max_age_days: parse_var("QUEUE_MAX_AGE_DAYS")
                .unwrap_or(defaults.queue_max_age_days),
            queue_max_attempts: parse_var("QUEUE_MAX_ATTEMPTS")
                .unwrap_or(defaults.queue_max_attempts),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            data_file: env::var("DATA_FILE")
                .ok()
                .map(PathBuf::from)
                .unwrap_or(defaults.data_file),
            encryption_key: env::var("ENCRYPTION_KEY").ok().filter(|v| !v.is_empty()),
        }
    }

    /// Default cache TTL as a duration.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }

    /// Maintenance interval as a duration.
    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval)
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: "storekeeper".to_string(),
            default_ttl: 300,
            max_entries: 100,
            assumed_capacity: DEFAULT_ASSUMED_CAPACITY,
            maintenance_interval: 300,
            queue_max_age_days: 7,
            queue_max_attempts: 5,
            server_port: 3000,
            data_file: PathBuf::from("storekeeper.json"),
            encryption_key: None,
        }
    }
}
