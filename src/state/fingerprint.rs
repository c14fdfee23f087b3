//! Outcome of validating a stored fingerprint

use std::fmt;

/// Result of checking stored state against current expectations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckedFingerprint {
    /// No fingerprint file is present for the key
    NotFound,
    /// The caller's check found nothing wrong
    Valid,
    /// The caller's check reported a mismatch
    Invalid(String),
}

impl CheckedFingerprint {
    /// Map a check outcome (`None` = nothing wrong) to a result
    pub fn from_reason(reason: Option<String>) -> Self {
        match reason {
            None => Self::Valid,
            Some(reason) => Self::Invalid(reason),
        }
    }
}

impl fmt::Display for CheckedFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not-found"),
            Self::Valid => write!(f, "valid"),
            Self::Invalid(reason) => write!(f, "invalid: {}", reason),
        }
    }
}
