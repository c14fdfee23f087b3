//! Access tracking at a fixed depth below the cache base directory

use crate::cache::journal::FileAccessTimeJournal;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};

/// Sink for "this path was just used" events
pub trait FileAccessTracker: Send + Sync {
    fn mark_accessed(&self, path: &Path);
}

/// Tracker that records access on the ancestor `depth` levels below `base_dir`
///
/// With depth 1, reading `<base>/<key>/entry.bin` marks `<base>/<key>`.
pub struct SingleDepthFileAccessTracker {
    base_dir: PathBuf,
    depth: usize,
    journal: Arc<dyn FileAccessTimeJournal>,
}

impl SingleDepthFileAccessTracker {
    pub fn new(
        base_dir: impl Into<PathBuf>,
        depth: usize,
        journal: Arc<dyn FileAccessTimeJournal>,
    ) -> Self {
        assert!(depth > 0, "tracking depth must be at least 1");
        Self {
            base_dir: base_dir.into(),
            depth,
            journal,
        }
    }

    /// The tracked ancestor of `path`, if `path` is deep enough below the base
    pub fn tracked_path(&self, path: &Path) -> Option<PathBuf> {
        let relative = path.strip_prefix(&self.base_dir).ok()?;
        let components: Vec<Component<'_>> = relative.components().collect();
        if components.len() < self.depth
            || components
                .iter()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        let mut tracked = self.base_dir.clone();
        for component in &components[..self.depth] {
            tracked.push(component);
        }
        Some(tracked)
    }
}

impl FileAccessTracker for SingleDepthFileAccessTracker {
    fn mark_accessed(&self, path: &Path) {
        let Some(tracked) = self.tracked_path(path) else {
            debug!("Not tracking access outside cache depth: {}", path.display());
            return;
        };
        if let Err(e) = self.journal.set_last_access_time(&tracked, SystemTime::now()) {
            warn!("Failed to record access to {}: {}", tracked.display(), e);
        }
    }
}

impl fmt::Debug for SingleDepthFileAccessTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleDepthFileAccessTracker")
            .field("base_dir", &self.base_dir)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}
