//! Last-access journal consulted by LRU cleanup

use crate::error::{StateCacheError, StateCacheResult};
use std::fmt;
use std::fs::{self, File, FileTimes};
use std::path::Path;
use std::time::SystemTime;

/// Records and answers "when was this path last used"
pub trait FileAccessTimeJournal: Send + Sync + fmt::Debug {
    fn set_last_access_time(&self, path: &Path, time: SystemTime) -> StateCacheResult<()>;

    /// Last recorded access, or `None` if nothing is known about `path`
    fn get_last_access_time(&self, path: &Path) -> Option<SystemTime>;

    fn delete_last_access_time(&self, path: &Path) -> StateCacheResult<()>;
}

/// Journal that stores access times as file modification times
///
/// Needs no side storage, so deleting an entry also forgets its record.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModificationTimeJournal;

impl ModificationTimeJournal {
    pub fn new() -> Self {
        Self
    }
}

impl FileAccessTimeJournal for ModificationTimeJournal {
    fn set_last_access_time(&self, path: &Path, time: SystemTime) -> StateCacheResult<()> {
        let handle = File::open(path)
            .map_err(|e| StateCacheError::io(format!("opening {}", path.display()), e))?;
        handle
            .set_times(FileTimes::new().set_modified(time))
            .map_err(|e| {
                StateCacheError::io(format!("setting access time of {}", path.display()), e)
            })
    }

    fn get_last_access_time(&self, path: &Path) -> Option<SystemTime> {
        fs::metadata(path).and_then(|m| m.modified()).ok()
    }

    fn delete_last_access_time(&self, _path: &Path) -> StateCacheResult<()> {
        Ok(())
    }
}
