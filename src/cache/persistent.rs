//! Base-directory cache resource with locking and scheduled cleanup

use crate::cache::cleanup::{CleanupAction, CleanupReport};
use crate::cache::lock::{FileLock, LockMode};
use crate::error::{StateCacheError, StateCacheResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

/// Marker whose modification time records the last cleanup run
pub const CLEANUP_MARKER_FILENAME: &str = ".cleanup-marker";

/// Default time to wait for the cross-process lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// Default minimum time between two cleanup runs
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Builder for [`PersistentCache`]
#[derive(Debug)]
pub struct PersistentCacheBuilder {
    display_name: String,
    base_dir: PathBuf,
    lock_mode: LockMode,
    lock_timeout: Duration,
    cleanup: Option<Box<dyn CleanupAction>>,
    cleanup_interval: Duration,
}

impl PersistentCacheBuilder {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            display_name: "cache".to_string(),
            base_dir: base_dir.into(),
            lock_mode: LockMode::OnDemand,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            cleanup: None,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn lock_mode(mut self, mode: LockMode) -> Self {
        self.lock_mode = mode;
        self
    }

    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn cleanup(mut self, action: impl CleanupAction + 'static) -> Self {
        self.cleanup = Some(Box::new(action));
        self
    }

    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Create the base directory if needed and open the cache
    pub fn open(self) -> StateCacheResult<PersistentCache> {
        let base_dir = &self.base_dir;
        // A directory that already exists belongs to the user; keep its mode.
        if !base_dir.exists() {
            fs::create_dir_all(base_dir).map_err(|e| {
                StateCacheError::io(format!("creating cache directory {}", base_dir.display()), e)
            })?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let perms = fs::Permissions::from_mode(0o700);
                fs::set_permissions(base_dir, perms)
                    .map_err(|e| StateCacheError::io("setting cache dir permissions", e))?;
            }
        }

        let held = match self.lock_mode {
            LockMode::Exclusive => Some(FileLock::acquire(base_dir, self.lock_timeout)?),
            LockMode::OnDemand => None,
        };

        let marker = base_dir.join(CLEANUP_MARKER_FILENAME);
        if !marker.exists() {
            touch(&marker)?;
        }

        debug!(
            "Opened {} at {} ({:?} lock)",
            self.display_name,
            base_dir.display(),
            self.lock_mode
        );

        Ok(PersistentCache {
            display_name: self.display_name,
            base_dir: self.base_dir,
            lock_mode: self.lock_mode,
            lock_timeout: self.lock_timeout,
            cleanup: self.cleanup,
            cleanup_interval: self.cleanup_interval,
            guard: Mutex::new(()),
            held,
        })
    }
}

/// Opened cache resource owning a base directory
///
/// Closing consumes the cache, so it can happen at most once.
#[derive(Debug)]
pub struct PersistentCache {
    display_name: String,
    base_dir: PathBuf,
    lock_mode: LockMode,
    lock_timeout: Duration,
    cleanup: Option<Box<dyn CleanupAction>>,
    cleanup_interval: Duration,
    guard: Mutex<()>,
    held: Option<FileLock>,
}

impl PersistentCache {
    pub fn builder(base_dir: impl Into<PathBuf>) -> PersistentCacheBuilder {
        PersistentCacheBuilder::new(base_dir)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Run `action` while holding both the in-process and cross-process lock
    pub fn with_file_lock<T, E, F>(&self, action: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<StateCacheError>,
    {
        // Guards nothing but mutual exclusion, so a poisoned lock is still usable.
        let _local = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let _file_lock = match self.lock_mode {
            LockMode::OnDemand => Some(FileLock::acquire(&self.base_dir, self.lock_timeout)?),
            LockMode::Exclusive => None,
        };
        action()
    }

    /// Whether the configured cleanup interval has elapsed
    pub fn is_cleanup_due(&self) -> bool {
        let marker = self.base_dir.join(CLEANUP_MARKER_FILENAME);
        let last = fs::metadata(&marker).and_then(|m| m.modified());
        match last {
            Ok(last) => SystemTime::now()
                .duration_since(last)
                .map(|elapsed| elapsed >= self.cleanup_interval)
                .unwrap_or(false),
            Err(_) => true,
        }
    }

    /// Run the cleanup action immediately, regardless of schedule
    pub fn cleanup_now(&self) -> StateCacheResult<CleanupReport> {
        self.with_file_lock(|| self.run_cleanup())
    }

    fn run_cleanup(&self) -> StateCacheResult<CleanupReport> {
        let Some(action) = &self.cleanup else {
            return Ok(CleanupReport::default());
        };
        info!("Cleaning up {} at {}", self.display_name, self.base_dir.display());
        let report = action.clean(&self.base_dir)?;
        touch(&self.base_dir.join(CLEANUP_MARKER_FILENAME))?;
        Ok(report)
    }

    /// Close the cache, running cleanup first when it is due
    pub fn close(self) -> StateCacheResult<Option<CleanupReport>> {
        let report = if self.cleanup.is_some() && self.is_cleanup_due() {
            Some(self.cleanup_now()?)
        } else {
            None
        };
        debug!("Closed {} at {}", self.display_name, self.base_dir.display());
        Ok(report)
    }
}

fn touch(path: &Path) -> StateCacheResult<()> {
    fs::write(path, b"")
        .map_err(|e| StateCacheError::io(format!("writing {}", path.display()), e))
}
