//! Least-recently-used cleanup of cache entries
//!
//! Candidates are the files and directories exactly `depth` levels below
//! the base directory. A candidate is removed once its last journal-recorded
//! access is older than the configured maximum age. Dot-files (lock file,
//! cleanup marker) are never candidates.

use crate::cache::journal::FileAccessTimeJournal;
use crate::error::{StateCacheError, StateCacheResult};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

/// Default maximum age, in days, for entries that can be recreated on demand
pub const DEFAULT_MAX_AGE_DAYS_FOR_RECREATABLE_ENTRIES: u32 = 7;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Reclaims space in a cache base directory
pub trait CleanupAction: Send + Sync + fmt::Debug {
    fn clean(&self, base_dir: &Path) -> StateCacheResult<CleanupReport>;
}

/// Outcome of a cleanup run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Number of candidates examined
    pub scanned: usize,
    /// Number of candidates removed (or that would be, in dry-run)
    pub deleted: usize,
    /// Bytes freed by removal
    pub bytes_reclaimed: u64,
    /// Paths removed (or that would be, in dry-run)
    pub removed: Vec<PathBuf>,
    /// Non-fatal errors
    pub errors: Vec<String>,
}

/// Enumerates cleanup candidates at a fixed depth
#[derive(Debug, Clone, Copy)]
pub struct SingleDepthFilesFinder {
    depth: usize,
}

impl SingleDepthFilesFinder {
    pub fn new(depth: usize) -> Self {
        assert!(depth > 0, "finder depth must be at least 1");
        Self { depth }
    }

    /// All non-hidden paths exactly `depth` levels below `base_dir`, sorted
    pub fn find(&self, base_dir: &Path) -> StateCacheResult<Vec<PathBuf>> {
        let mut level = vec![base_dir.to_path_buf()];
        for _ in 0..self.depth {
            let mut next = Vec::new();
            for dir in level.iter().filter(|p| p.is_dir()) {
                let entries = fs::read_dir(dir).map_err(|e| {
                    StateCacheError::io(format!("reading directory {}", dir.display()), e)
                })?;
                for entry in entries {
                    let entry = entry.map_err(|e| {
                        StateCacheError::io(format!("reading entry in {}", dir.display()), e)
                    })?;
                    if entry.file_name().to_string_lossy().starts_with('.') {
                        continue;
                    }
                    next.push(entry.path());
                }
            }
            level = next;
        }
        level.sort();
        Ok(level)
    }
}

/// Removes candidates whose last access exceeds a maximum age
#[derive(Debug)]
pub struct LeastRecentlyUsedCleanup {
    finder: SingleDepthFilesFinder,
    journal: Arc<dyn FileAccessTimeJournal>,
    max_age: Duration,
    dry_run: bool,
}

impl LeastRecentlyUsedCleanup {
    pub fn new(
        finder: SingleDepthFilesFinder,
        journal: Arc<dyn FileAccessTimeJournal>,
        max_age_days: u32,
    ) -> Self {
        Self {
            finder,
            journal,
            max_age: Duration::from_secs(u64::from(max_age_days) * SECONDS_PER_DAY),
            dry_run: false,
        }
    }

    /// Report what would be removed without touching the disk
    pub fn with_dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    fn is_expired(&self, path: &Path, now: SystemTime) -> bool {
        match self.journal.get_last_access_time(path) {
            Some(last) => now
                .duration_since(last)
                .map(|age| age > self.max_age)
                .unwrap_or(false),
            // Nothing recorded: the entry vanished mid-scan or was never tracked.
            None => false,
        }
    }
}

impl CleanupAction for LeastRecentlyUsedCleanup {
    fn clean(&self, base_dir: &Path) -> StateCacheResult<CleanupReport> {
        let mut report = CleanupReport::default();
        if !base_dir.is_dir() {
            return Ok(report);
        }

        let candidates = self.finder.find(base_dir)?;
        report.scanned = candidates.len();
        let now = SystemTime::now();

        for path in candidates {
            if !self.is_expired(&path, now) {
                continue;
            }

            let size = disk_usage(&path);
            if self.dry_run {
                info!("Would remove unused cache entry {} ({} bytes)", path.display(), size);
            } else {
                let removed = if path.is_dir() {
                    fs::remove_dir_all(&path)
                } else {
                    fs::remove_file(&path)
                };
                if let Err(e) = removed {
                    report
                        .errors
                        .push(format!("Failed to delete {}: {}", path.display(), e));
                    continue;
                }
                if let Err(e) = self.journal.delete_last_access_time(&path) {
                    report.errors.push(e.to_string());
                }
                info!("Removed unused cache entry {} ({} bytes)", path.display(), size);
            }

            report.deleted += 1;
            report.bytes_reclaimed += size;
            report.removed.push(path);
        }

        debug!(
            "Cleanup of {} scanned {} entries, removed {}",
            base_dir.display(),
            report.scanned,
            report.deleted
        );
        Ok(report)
    }
}

/// Total size of a file or directory tree; unreadable parts count as zero
fn disk_usage(path: &Path) -> u64 {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return 0;
    };
    if !meta.is_dir() {
        return meta.len();
    }
    fs::read_dir(path)
        .map(|entries| entries.flatten().map(|e| disk_usage(&e.path())).sum())
        .unwrap_or(0)
}
