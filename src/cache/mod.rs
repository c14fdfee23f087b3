//! Cache infrastructure underneath the state repository
//!
//! Provides the pieces a repository needs from its storage:
//!
//! - a base directory guarded by a cross-process advisory lock
//! - an access-time journal and a tracker that feeds it
//! - least-recently-used cleanup of entries nobody has touched lately
//!
//! # On-disk layout
//!
//! | Path | Purpose |
//! |------|---------|
//! | `<base>/.statecache.lock` | advisory lock file |
//! | `<base>/.cleanup-marker` | mtime = last cleanup run |
//! | `<base>/<key>/` | one entry; mtime = last access |

pub mod cleanup;
pub mod journal;
pub mod lock;
pub mod persistent;
pub mod tracker;

pub use cleanup::{
    CleanupAction, CleanupReport, LeastRecentlyUsedCleanup, SingleDepthFilesFinder,
    DEFAULT_MAX_AGE_DAYS_FOR_RECREATABLE_ENTRIES,
};
pub use journal::{FileAccessTimeJournal, ModificationTimeJournal};
pub use lock::{FileLock, LockMode, LOCK_FILENAME};
pub use persistent::{PersistentCache, PersistentCacheBuilder, CLEANUP_MARKER_FILENAME};
pub use tracker::{FileAccessTracker, SingleDepthFileAccessTracker};
