//! Configuration schema for statecache
//!
//! Configuration is stored at `~/.config/statecache/config.toml`

use crate::cache::DEFAULT_MAX_AGE_DAYS_FOR_RECREATABLE_ENTRIES;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache settings
    pub cache: CacheConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// State cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Base directory (defaults to the platform cache dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Remove entries not accessed for this many days
    pub max_age_days: u32,

    /// Seconds to wait for the cross-process cache lock
    pub lock_timeout_secs: u64,

    /// Minimum hours between automatic cleanup runs
    pub cleanup_interval_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            max_age_days: DEFAULT_MAX_AGE_DAYS_FOR_RECREATABLE_ENTRIES,
            lock_timeout_secs: 60,
            cleanup_interval_hours: 24,
        }
    }
}

impl CacheConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_hours.saturating_mul(60 * 60))
    }
}
