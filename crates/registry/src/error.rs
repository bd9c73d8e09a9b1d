//! Error types for the registry crate.

use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Registry and record store errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The backing store could not be reached. Dedup state is unknown.
    #[error("record store '{operation}' unavailable: {reason}")]
    StoreUnavailable { operation: String, reason: String },

    /// The record was modified concurrently.
    #[error("conflicting update to record '{record}': {reason}")]
    StoreConflict { record: String, reason: String },

    /// Stored record could not be encoded or decoded.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },
}

impl Error {
    /// Create a store unavailable error.
    pub fn store_unavailable(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a store conflict error.
    pub fn store_conflict(record: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StoreConflict {
            record: record.into(),
            reason: reason.into(),
        }
    }

    /// Create a serialization error.
    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization {
            reason: reason.into(),
        }
    }

    /// Check if this error is a version conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::StoreConflict { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
