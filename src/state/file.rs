//! Capability-restricted handles to a single state file
//!
//! A handle is either readable or writeable, never both. The two variants
//! are distinct types: a [`ReadableStateFile`] has no way to open a writer
//! and a [`WriteableStateFile`] has no way to open a reader. Code that needs
//! to hold either kind behind one type uses [`AnyStateFile`], which reports
//! a mismatched capability as [`StateCacheError::UnsupportedOperation`].

use crate::cache::FileAccessTracker;
use crate::error::{StateCacheError, StateCacheResult};
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Callback invoked with the physical path each time a writer is opened
pub type WriteHook = Arc<dyn Fn(&Path) + Send + Sync>;

/// Access granted by a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Operations shared by both handle variants
pub trait StateFile: Sized {
    /// Physical path this handle is bound to
    fn path(&self) -> &Path;

    /// Access this handle grants
    fn access(&self) -> Access;

    /// Whether the file can currently be read through this handle
    fn can_read(&self) -> bool;

    /// Handle of the same kind bound to `<path>.<build_name>`
    ///
    /// Performs no I/O.
    fn for_included_build(&self, build_name: &str) -> Self;
}

fn included_build_path(path: &Path, build_name: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(".");
    raw.push(build_name);
    PathBuf::from(raw)
}

/// Read-only handle
#[derive(Clone)]
pub struct ReadableStateFile {
    path: PathBuf,
    tracker: Arc<dyn FileAccessTracker>,
}

impl ReadableStateFile {
    pub fn new(path: impl Into<PathBuf>, tracker: Arc<dyn FileAccessTracker>) -> Self {
        Self {
            path: path.into(),
            tracker,
        }
    }

    /// Open the file for reading and record the access
    pub fn open_for_read(&self) -> StateCacheResult<File> {
        if !self.can_read() {
            return Err(StateCacheError::NotFound(self.path.clone()));
        }
        let file = File::open(&self.path).map_err(|e| {
            StateCacheError::io(format!("opening state file {}", self.path.display()), e)
        })?;
        self.tracker.mark_accessed(&self.path);
        Ok(file)
    }
}

impl StateFile for ReadableStateFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn access(&self) -> Access {
        Access::Read
    }

    fn can_read(&self) -> bool {
        self.path.is_file()
    }

    fn for_included_build(&self, build_name: &str) -> Self {
        Self {
            path: included_build_path(&self.path, build_name),
            tracker: Arc::clone(&self.tracker),
        }
    }
}

impl fmt::Debug for ReadableStateFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadableStateFile")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Write-only handle
#[derive(Clone)]
pub struct WriteableStateFile {
    path: PathBuf,
    on_write: WriteHook,
}

impl WriteableStateFile {
    pub fn new(path: impl Into<PathBuf>, on_write: WriteHook) -> Self {
        Self {
            path: path.into(),
            on_write,
        }
    }

    /// Create (or truncate) the file and return a writer positioned at its start
    pub fn open_for_write(&self) -> StateCacheResult<File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                StateCacheError::io(format!("creating directory {}", parent.display()), e)
            })?;
        }
        (self.on_write)(&self.path);
        File::create(&self.path).map_err(|e| {
            StateCacheError::io(format!("creating state file {}", self.path.display()), e)
        })
    }

    /// Remove the physical file
    pub fn delete(&self) -> StateCacheResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StateCacheError::NotFound(self.path.clone()))
            }
            Err(e) => Err(StateCacheError::io(
                format!("deleting state file {}", self.path.display()),
                e,
            )),
        }
    }
}

impl StateFile for WriteableStateFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn access(&self) -> Access {
        Access::Write
    }

    /// A fresh writer cannot assume any prior content.
    fn can_read(&self) -> bool {
        false
    }

    fn for_included_build(&self, build_name: &str) -> Self {
        Self {
            path: included_build_path(&self.path, build_name),
            on_write: Arc::clone(&self.on_write),
        }
    }
}

impl fmt::Debug for WriteableStateFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteableStateFile")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Either handle variant behind one type
#[derive(Debug, Clone)]
pub enum AnyStateFile {
    Readable(ReadableStateFile),
    Writeable(WriteableStateFile),
}

impl AnyStateFile {
    pub fn open_for_read(&self) -> StateCacheResult<File> {
        match self {
            Self::Readable(file) => file.open_for_read(),
            Self::Writeable(file) => Err(StateCacheError::unsupported("read", file.path())),
        }
    }

    pub fn open_for_write(&self) -> StateCacheResult<File> {
        match self {
            Self::Readable(file) => Err(StateCacheError::unsupported("write", file.path())),
            Self::Writeable(file) => file.open_for_write(),
        }
    }

    pub fn delete(&self) -> StateCacheResult<()> {
        match self {
            Self::Readable(file) => Err(StateCacheError::unsupported("delete", file.path())),
            Self::Writeable(file) => file.delete(),
        }
    }
}

impl StateFile for AnyStateFile {
    fn path(&self) -> &Path {
        match self {
            Self::Readable(file) => file.path(),
            Self::Writeable(file) => file.path(),
        }
    }

    fn access(&self) -> Access {
        match self {
            Self::Readable(_) => Access::Read,
            Self::Writeable(_) => Access::Write,
        }
    }

    fn can_read(&self) -> bool {
        match self {
            Self::Readable(file) => file.can_read(),
            Self::Writeable(file) => file.can_read(),
        }
    }

    fn for_included_build(&self, build_name: &str) -> Self {
        match self {
            Self::Readable(file) => Self::Readable(file.for_included_build(build_name)),
            Self::Writeable(file) => Self::Writeable(file.for_included_build(build_name)),
        }
    }
}

impl From<ReadableStateFile> for AnyStateFile {
    fn from(file: ReadableStateFile) -> Self {
        Self::Readable(file)
    }
}

impl From<WriteableStateFile> for AnyStateFile {
    fn from(file: WriteableStateFile) -> Self {
        Self::Writeable(file)
    }
}
