//! Cross-process advisory lock on a cache base directory
//!
//! The lock is an exclusive `flock(2)` on a well-known file inside the base
//! directory. Acquisition polls a non-blocking attempt until a timeout so a
//! stuck holder surfaces as [`StateCacheError::LockTimeout`] instead of a
//! hang. Contention is logged once per acquisition.

use crate::error::{StateCacheError, StateCacheResult};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Name of the lock file inside the base directory
pub const LOCK_FILENAME: &str = ".statecache.lock";

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const CONTENTION_WARN_AFTER: Duration = Duration::from_millis(500);

/// When the cross-process lock is held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    /// Acquired around each operation and released right after
    #[default]
    OnDemand,
    /// Acquired when the cache opens and held until it closes
    Exclusive,
}

/// Held advisory lock, released on drop
#[derive(Debug)]
pub struct FileLock {
    lock_path: PathBuf,
    lock_file: File,
}

impl FileLock {
    /// Acquire the lock for `base_dir`, waiting up to `timeout`
    pub fn acquire(base_dir: &Path, timeout: Duration) -> StateCacheResult<Self> {
        let lock_path = base_dir.join(LOCK_FILENAME);
        let start = Instant::now();
        let mut warned = false;

        loop {
            match Self::try_acquire_exclusive(&lock_path) {
                Ok(file) => {
                    if warned {
                        warn!(
                            "Cache lock acquired after {:.1}s contention: {}",
                            start.elapsed().as_secs_f64(),
                            lock_path.display()
                        );
                    } else {
                        debug!("Acquired cache lock {}", lock_path.display());
                    }
                    return Ok(Self {
                        lock_path,
                        lock_file: file,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if !warned && start.elapsed() > CONTENTION_WARN_AFTER {
                        warn!("Lock contention on {}, waiting...", lock_path.display());
                        warned = true;
                    }
                }
                Err(e) => {
                    return Err(StateCacheError::io(
                        format!("locking {}", lock_path.display()),
                        e,
                    ))
                }
            }

            if start.elapsed() >= timeout {
                return Err(StateCacheError::LockTimeout {
                    path: lock_path,
                    timeout,
                });
            }

            std::thread::sleep(POLL_INTERVAL);
        }
    }

    #[cfg(unix)]
    fn try_acquire_exclusive(lock_path: &Path) -> io::Result<File> {
        use std::os::unix::fs::OpenOptionsExt;
        use std::os::unix::io::AsRawFd;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o600)
            .open(lock_path)?;

        // SAFETY: the descriptor is owned by `file` and stays open for the call.
        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if result == 0 {
            Ok(file)
        } else {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
                Err(io::Error::new(io::ErrorKind::WouldBlock, "lock held"))
            } else {
                Err(err)
            }
        }
    }

    #[cfg(not(unix))]
    fn try_acquire_exclusive(lock_path: &Path) -> io::Result<File> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(lock_path)
        {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(io::Error::new(io::ErrorKind::WouldBlock, "lock held"))
            }
            Err(e) => Err(e),
        }
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            // SAFETY: the descriptor is still owned by `self.lock_file`.
            unsafe {
                libc::flock(self.lock_file.as_raw_fd(), libc::LOCK_UN);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = std::fs::remove_file(&self.lock_path);
        }
        debug!("Released cache lock {}", self.lock_path.display());
    }
}
