//! Error types for the events crate.

use thiserror::Error;

use crate::types::TransitionKind;

/// Result type alias for event operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Event construction errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The resource identity is missing a namespace or name.
    #[error("invalid resource identity: {reason}")]
    InvalidIdentity { reason: String },

    /// No event type is configured for the transition kind.
    #[error("no event type mapped for transition '{kind}'")]
    UnmappedTransition { kind: TransitionKind },

    /// Serialization error.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },
}

impl Error {
    /// Create an invalid identity error.
    pub fn invalid_identity(reason: impl Into<String>) -> Self {
        Self::InvalidIdentity {
            reason: reason.into(),
        }
    }

    /// Create an unmapped transition error.
    #[must_use]
    pub const fn unmapped_transition(kind: TransitionKind) -> Self {
        Self::UnmappedTransition { kind }
    }

    /// Create a serialization error.
    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_identity("empty name");
        assert!(err.to_string().contains("empty name"));
    }

    #[test]
    fn test_unmapped_display_names_kind() {
        let err = Error::unmapped_transition(TransitionKind::Modified);
        assert!(err.to_string().contains("modified"));
    }
}
