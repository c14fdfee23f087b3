//! Key-addressed repository of persisted state
//!
//! Every load and store runs under the cache's single base-directory lock,
//! so operations on different keys also exclude each other. Stores create
//! the entry directory with mode 0700 and, on every exit path, tighten each
//! file written during the store to 0600.

use crate::cache::{
    CleanupAction, CleanupReport, FileAccessTimeJournal, FileAccessTracker,
    LeastRecentlyUsedCleanup, LockMode, ModificationTimeJournal, PersistentCache,
    SingleDepthFileAccessTracker, SingleDepthFilesFinder,
};
use crate::config::CacheConfig;
use crate::error::{StateCacheError, StateCacheResult};
use crate::state::{
    CheckedFingerprint, ReadLayout, ReadableStateFile, StateFile, StateLayout, StateType,
    TouchedFiles, WriteLayout,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Name the underlying cache reports itself as
pub const DISPLAY_NAME: &str = "state cache";

/// Entry directories sit directly below the base directory
const ENTRY_DEPTH: usize = 1;

/// Summary of one entry directory
#[derive(Debug, Clone, Serialize)]
pub struct EntrySummary {
    pub key: String,
    pub path: PathBuf,
    pub last_accessed: Option<DateTime<Utc>>,
    pub state_files: Vec<String>,
    pub size_bytes: u64,
}

/// Repository handing out read and write layouts per cache key
#[derive(Debug)]
pub struct CacheRepository {
    cache: PersistentCache,
    tracker: Arc<SingleDepthFileAccessTracker>,
    journal: Arc<dyn FileAccessTimeJournal>,
    max_age_days: u32,
}

impl CacheRepository {
    /// Open a repository at `base_dir`, tracking access through file mtimes
    pub fn open(base_dir: impl Into<PathBuf>, config: &CacheConfig) -> StateCacheResult<Self> {
        Self::open_with_journal(base_dir, config, Arc::new(ModificationTimeJournal::new()))
    }

    /// Open a repository with an explicit access-time journal
    pub fn open_with_journal(
        base_dir: impl Into<PathBuf>,
        config: &CacheConfig,
        journal: Arc<dyn FileAccessTimeJournal>,
    ) -> StateCacheResult<Self> {
        let cleanup = LeastRecentlyUsedCleanup::new(
            SingleDepthFilesFinder::new(ENTRY_DEPTH),
            Arc::clone(&journal),
            config.max_age_days,
        );
        let cache = PersistentCache::builder(base_dir)
            .display_name(DISPLAY_NAME)
            .lock_mode(LockMode::OnDemand)
            .lock_timeout(config.lock_timeout())
            .cleanup_interval(config.cleanup_interval())
            .cleanup(cleanup)
            .open()?;

        // The tracker needs the base directory the opened cache settled on.
        let tracker = Arc::new(SingleDepthFileAccessTracker::new(
            cache.base_dir(),
            ENTRY_DEPTH,
            Arc::clone(&journal),
        ));

        Ok(Self {
            cache,
            tracker,
            journal,
            max_age_days: config.max_age_days,
        })
    }

    pub fn base_dir(&self) -> &Path {
        self.cache.base_dir()
    }

    /// Directory holding the state of `key`; performs no I/O
    pub fn entry_dir(&self, key: &str) -> StateCacheResult<PathBuf> {
        validate_cache_key(key)?;
        Ok(self.base_dir().join(key))
    }

    /// Run `action` with readable handles for `key`
    ///
    /// The entry directory is not created; handles in a missing entry simply
    /// report `can_read() == false`.
    pub fn load_state<T, E, F>(&self, key: &str, state_type: StateType, action: F) -> Result<T, E>
    where
        F: FnOnce(&ReadLayout) -> Result<T, E>,
        E: From<StateCacheError>,
    {
        let dir = self.entry_dir(key)?;
        self.cache.with_file_lock(|| {
            debug!("Loading {} state for {}", state_type, key);
            let tracker: Arc<dyn FileAccessTracker> = self.tracker.clone();
            let layout = ReadLayout::new(dir, state_type, tracker);
            action(&layout)
        })
    }

    /// Run `action` with writeable handles for `key`
    ///
    /// Files opened for writing are restricted to owner read/write once the
    /// action returns, whether it succeeded, failed or panicked. An error from
    /// the action takes precedence over one from the permission change.
    pub fn store_state<T, E, F>(&self, key: &str, state_type: StateType, action: F) -> Result<T, E>
    where
        F: FnOnce(&WriteLayout) -> Result<T, E>,
        E: From<StateCacheError>,
    {
        let dir = self.entry_dir(key)?;
        self.cache.with_file_lock(|| {
            debug!("Storing {} state for {}", state_type, key);
            // An existing directory is reused; stale files are overwritten.
            self.prepare_entry_dir(&dir)?;

            let touched = TouchedFiles::new();
            let hardening = HardenOnExit::new(touched.clone());
            let layout = WriteLayout::new(&dir, state_type, touched);
            let result = action(&layout);

            match (result, hardening.finish()) {
                (Ok(value), Ok(())) => Ok(value),
                (Ok(_), Err(e)) => Err(e.into()),
                (Err(e), Ok(())) => Err(e),
                (Err(e), Err(hardening_err)) => {
                    warn!("Failed to restrict permissions after failed store: {}", hardening_err);
                    Err(e)
                }
            }
        })
    }

    /// Validate the stored fingerprint of `key` with a caller-supplied check
    ///
    /// `check` returns `None` when the fingerprint is still valid, or a
    /// human-readable reason when it is not.
    pub fn check_fingerprint<E, F>(&self, key: &str, check: F) -> Result<CheckedFingerprint, E>
    where
        F: FnOnce(&ReadableStateFile) -> Result<Option<String>, E>,
        E: From<StateCacheError>,
    {
        self.load_state(key, StateType::Fingerprint, |layout| {
            let fingerprint = layout.primary();
            if !fingerprint.can_read() {
                return Ok(CheckedFingerprint::NotFound);
            }
            Ok(CheckedFingerprint::from_reason(check(fingerprint)?))
        })
    }

    /// List entry directories without recording any access
    pub fn entries(&self) -> StateCacheResult<Vec<EntrySummary>> {
        self.cache.with_file_lock(|| {
            let base = self.base_dir();
            let mut entries = Vec::new();
            let read = fs::read_dir(base).map_err(|e| {
                StateCacheError::io(format!("reading cache directory {}", base.display()), e)
            })?;

            for item in read {
                let item = item.map_err(|e| StateCacheError::io("reading cache entry", e))?;
                let key = item.file_name().to_string_lossy().into_owned();
                let path = item.path();
                if key.starts_with('.') || !path.is_dir() {
                    continue;
                }

                let mut state_files = Vec::new();
                let mut size_bytes = 0;
                let files = fs::read_dir(&path).map_err(|e| {
                    StateCacheError::io(format!("reading entry {}", path.display()), e)
                })?;
                for file in files.flatten() {
                    if let Ok(meta) = file.metadata() {
                        if meta.is_file() {
                            size_bytes += meta.len();
                            state_files.push(file.file_name().to_string_lossy().into_owned());
                        }
                    }
                }
                state_files.sort();

                entries.push(EntrySummary {
                    last_accessed: self.journal.get_last_access_time(&path).map(DateTime::from),
                    key,
                    path,
                    state_files,
                    size_bytes,
                });
            }

            entries.sort_by(|a, b| a.key.cmp(&b.key));
            Ok(entries)
        })
    }

    /// Run LRU cleanup now
    ///
    /// `max_age_days` overrides the configured age for this run only.
    pub fn cleanup(&self, max_age_days: Option<u32>, dry_run: bool) -> StateCacheResult<CleanupReport> {
        if max_age_days.is_none() && !dry_run {
            return self.cache.cleanup_now();
        }
        let mut lru = LeastRecentlyUsedCleanup::new(
            SingleDepthFilesFinder::new(ENTRY_DEPTH),
            Arc::clone(&self.journal),
            max_age_days.unwrap_or(self.max_age_days),
        );
        if dry_run {
            lru = lru.with_dry_run();
        }
        self.cache.with_file_lock(|| lru.clean(self.base_dir()))
    }

    /// Release the underlying cache, running scheduled cleanup if due
    pub fn shutdown(self) -> StateCacheResult<Option<CleanupReport>> {
        self.cache.close()
    }

    fn prepare_entry_dir(&self, dir: &Path) -> StateCacheResult<()> {
        if !dir.exists() {
            debug!("Creating cache entry {}", dir.display());
        }
        fs::create_dir_all(dir).map_err(|e| {
            StateCacheError::io(format!("creating cache entry {}", dir.display()), e)
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(dir, fs::Permissions::from_mode(0o700)).map_err(|e| {
                StateCacheError::io(format!("setting permissions on {}", dir.display()), e)
            })?;
        }

        self.tracker.mark_accessed(dir);
        Ok(())
    }
}

/// Check that `key` names exactly one directory below the base
pub fn validate_cache_key(key: &str) -> StateCacheResult<()> {
    let reason = if key.is_empty() {
        Some("must not be empty")
    } else if key.starts_with('.') {
        Some("must not start with '.'")
    } else if key.contains(['/', '\\', '\0']) {
        Some("must be a single path component")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(StateCacheError::InvalidCacheKey {
            key: key.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Restricts touched files to owner read/write exactly once
///
/// `finish` reports failures; if the guard is dropped instead (the store
/// action panicked) failures are only logged.
struct HardenOnExit {
    touched: TouchedFiles,
    done: bool,
}

impl HardenOnExit {
    fn new(touched: TouchedFiles) -> Self {
        Self {
            touched,
            done: false,
        }
    }

    fn finish(mut self) -> StateCacheResult<()> {
        self.done = true;
        harden_files(&self.touched.snapshot())
    }
}

impl Drop for HardenOnExit {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Err(e) = harden_files(&self.touched.snapshot()) {
            warn!("Failed to restrict state file permissions: {}", e);
        }
    }
}

/// Set mode 0600 on every path that is a regular file; keeps going past failures
///
/// Paths that no longer exist are skipped. A path that cannot be inspected
/// counts as a failure.
fn harden_files(paths: &[PathBuf]) -> StateCacheResult<()> {
    let mut first_error = None;
    for path in paths {
        let outcome = match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_file() => restrict_to_owner(path),
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StateCacheError::io(
                format!("inspecting {}", path.display()),
                e,
            )),
        };
        if let Err(e) = outcome {
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> StateCacheResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| {
        StateCacheError::io(format!("setting permissions on {}", path.display()), e)
    })?;
    debug!("Restricted {} to owner read/write", path.display());
    Ok(())
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> StateCacheResult<()> {
    Ok(())
}
