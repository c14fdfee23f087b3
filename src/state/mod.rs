//! State files and layouts for a single cache entry
//!
//! An entry directory holds one file per [`StateType`], named
//! `<type>.bin`, plus `<type>.bin.<build>[.<nested>...]` variants for
//! included builds. Handles come in a readable and a writeable flavour and
//! are always obtained through a layout.

pub mod file;
pub mod fingerprint;
pub mod layout;
pub mod types;

pub use file::{Access, AnyStateFile, ReadableStateFile, StateFile, WriteHook, WriteableStateFile};
pub use fingerprint::CheckedFingerprint;
pub use layout::{ReadLayout, StateLayout, TouchedFiles, WriteLayout};
pub use types::{StateType, STATE_FILE_EXTENSION};
