//! Per-entry grouping of state file handles

use crate::cache::FileAccessTracker;
use crate::state::file::{ReadableStateFile, StateFile, WriteHook, WriteableStateFile};
use crate::state::types::StateType;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Handles for one cache entry, all sharing one access mode
pub trait StateLayout {
    type File: StateFile;

    /// Entry directory the handles live in
    fn dir(&self) -> &Path;

    /// Handle for the state type the caller asked for
    fn primary(&self) -> &Self::File;

    /// New handle for another state kind in the same entry
    fn file_for(&self, state_type: StateType) -> Self::File;
}

/// Layout producing readable handles
#[derive(Clone)]
pub struct ReadLayout {
    dir: PathBuf,
    primary: ReadableStateFile,
    tracker: Arc<dyn FileAccessTracker>,
}

impl ReadLayout {
    pub fn new(
        dir: impl Into<PathBuf>,
        state_type: StateType,
        tracker: Arc<dyn FileAccessTracker>,
    ) -> Self {
        let dir = dir.into();
        let primary = ReadableStateFile::new(dir.join(state_type.file_name()), Arc::clone(&tracker));
        Self {
            dir,
            primary,
            tracker,
        }
    }
}

impl fmt::Debug for ReadLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadLayout")
            .field("dir", &self.dir)
            .field("primary", &self.primary)
            .finish_non_exhaustive()
    }
}

impl StateLayout for ReadLayout {
    type File = ReadableStateFile;

    fn dir(&self) -> &Path {
        &self.dir
    }

    fn primary(&self) -> &ReadableStateFile {
        &self.primary
    }

    fn file_for(&self, state_type: StateType) -> ReadableStateFile {
        ReadableStateFile::new(self.dir.join(state_type.file_name()), Arc::clone(&self.tracker))
    }
}

/// Set of physical paths opened for writing during one store
#[derive(Debug, Clone, Default)]
pub struct TouchedFiles {
    paths: Arc<Mutex<BTreeSet<PathBuf>>>,
}

impl TouchedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, path: &Path) {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf());
    }

    /// Recorded paths in sorted order
    pub fn snapshot(&self) -> Vec<PathBuf> {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    fn hook(&self) -> WriteHook {
        let touched = self.clone();
        Arc::new(move |path: &Path| touched.record(path))
    }
}

/// Layout producing writeable handles that report every opened path
#[derive(Debug, Clone)]
pub struct WriteLayout {
    dir: PathBuf,
    primary: WriteableStateFile,
    touched: TouchedFiles,
}

impl WriteLayout {
    pub fn new(dir: impl Into<PathBuf>, state_type: StateType, touched: TouchedFiles) -> Self {
        let dir = dir.into();
        let primary = WriteableStateFile::new(dir.join(state_type.file_name()), touched.hook());
        Self {
            dir,
            primary,
            touched,
        }
    }
}

impl StateLayout for WriteLayout {
    type File = WriteableStateFile;

    fn dir(&self) -> &Path {
        &self.dir
    }

    fn primary(&self) -> &WriteableStateFile {
        &self.primary
    }

    fn file_for(&self, state_type: StateType) -> WriteableStateFile {
        WriteableStateFile::new(self.dir.join(state_type.file_name()), self.touched.hook())
    }
}
