//! statecache - key-addressed cache for persisted build state
//!
//! Resolves an opaque cache key to an entry directory, hands out read-only
//! or write-only handles to the state files inside it, validates stored
//! fingerprints with caller-supplied checks, and lets least-recently-used
//! cleanup reclaim entries nobody has touched lately.
//!
//! ```rust,no_run
//! use statecache::config::CacheConfig;
//! use statecache::repository::CacheRepository;
//! use statecache::state::{CheckedFingerprint, StateLayout, StateType};
//! use std::io::Write;
//!
//! # fn main() -> statecache::StateCacheResult<()> {
//! let repo = CacheRepository::open("/tmp/state-cache", &CacheConfig::default())?;
//!
//! repo.store_state("build-42", StateType::Fingerprint, |layout| {
//!     let mut out = layout.primary().open_for_write()?;
//!     out.write_all(b"inputs-v1")
//!         .map_err(|e| statecache::StateCacheError::io("writing fingerprint", e))
//! })?;
//!
//! let checked = repo.check_fingerprint("build-42", |_file| {
//!     Ok::<_, statecache::StateCacheError>(None)
//! })?;
//! assert_eq!(checked, CheckedFingerprint::Valid);
//!
//! repo.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod repository;
pub mod state;

pub use error::{StateCacheError, StateCacheResult};
pub use repository::CacheRepository;
