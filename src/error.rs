//! Error types for statecache
//!
//! All modules use `StateCacheResult<T>` as their return type.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for statecache operations
pub type StateCacheResult<T> = Result<T, StateCacheError>;

/// All errors that can occur in statecache
#[derive(Error, Debug)]
pub enum StateCacheError {
    // Handle capability errors
    #[error("Cannot {operation} {path}: handle does not grant this access")]
    UnsupportedOperation {
        operation: &'static str,
        path: PathBuf,
    },

    #[error("State file not found: {0}")]
    NotFound(PathBuf),

    // Addressing errors
    #[error("Invalid cache key {key:?}: {reason}")]
    InvalidCacheKey { key: String, reason: &'static str },

    #[error("Unknown state type: {0}")]
    UnknownStateType(String),

    // Locking errors
    #[error("Timed out after {timeout:?} waiting for cache lock {path}")]
    LockTimeout { path: PathBuf, timeout: Duration },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl StateCacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an unsupported-operation error for a handle path
    pub fn unsupported(operation: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::UnsupportedOperation {
            operation,
            path: path.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::LockTimeout { .. } => {
                Some("Another process holds the cache lock. Retry, or raise cache.lock_timeout_secs")
            }
            Self::NotFound(_) => Some("Store state for this key first: statecache store <key>"),
            Self::UnknownStateType(_) => Some(
                "Valid state types: entry, fingerprint, projectfingerprint, work, model, intermediatemodels, projectmetadata",
            ),
            Self::InvalidCacheKey { .. } => {
                Some("Cache keys are single path components without a leading '.'")
            }
            _ => None,
        }
    }
}
