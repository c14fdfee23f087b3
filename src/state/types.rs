//! State kinds stored inside a cache entry

use crate::error::StateCacheError;
use std::fmt;
use std::str::FromStr;

/// Extension shared by every state file
pub const STATE_FILE_EXTENSION: &str = "bin";

/// Kind of payload a state file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateType {
    /// Full serialized entry state
    Entry,
    /// Build-level fingerprint used to validate the entry
    Fingerprint,
    /// Per-project fingerprint
    ProjectFingerprint,
    /// Scheduled work graph
    Work,
    /// Tooling model payload
    Model,
    /// Intermediate models produced while building a model
    IntermediateModels,
    /// Project metadata
    ProjectMetadata,
}

impl StateType {
    /// Lower-cased tag used for the file name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Fingerprint => "fingerprint",
            Self::ProjectFingerprint => "projectfingerprint",
            Self::Work => "work",
            Self::Model => "model",
            Self::IntermediateModels => "intermediatemodels",
            Self::ProjectMetadata => "projectmetadata",
        }
    }

    /// File name of this state kind within an entry directory
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.as_str(), STATE_FILE_EXTENSION)
    }

    /// All state types in declaration order
    pub fn all() -> &'static [Self] {
        &[
            Self::Entry,
            Self::Fingerprint,
            Self::ProjectFingerprint,
            Self::Work,
            Self::Model,
            Self::IntermediateModels,
            Self::ProjectMetadata,
        ]
    }
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateType {
    type Err = StateCacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_ascii_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| StateCacheError::UnknownStateType(s.to_string()))
    }
}
