//! Error types for the delivery crate.

use thiserror::Error;

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Delivery errors surfaced to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Missing or malformed configuration. Fatal at startup.
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    /// The sink permanently refused the event.
    #[error("event {event_id} rejected by sink (status {status:?}): {reason}")]
    DeliveryRejected {
        event_id: String,
        status: Option<u16>,
        reason: String,
    },

    /// Retries were exhausted (or cancelled) without an acknowledgement.
    #[error("event {event_id} undelivered after {attempts} attempt(s): {reason}")]
    DeliveryUndelivered {
        event_id: String,
        attempts: u32,
        reason: String,
    },
}

impl Error {
    /// Create a configuration error.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Check whether the outer reconcile loop should retry later.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::DeliveryUndelivered { .. })
    }
}

/// Failure of a single transmission attempt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Worth retrying: connection failures, timeouts, 5xx, 408, 429.
    #[error("transient failure: {reason}")]
    Transient { reason: String },

    /// Not worth retrying: the sink refused the event.
    #[error("permanent failure (status {status:?}): {reason}")]
    Permanent { status: Option<u16>, reason: String },
}

impl TransportError {
    /// Create a transient error.
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
        }
    }

    /// Create a permanent error.
    pub fn permanent(status: Option<u16>, reason: impl Into<String>) -> Self {
        Self::Permanent {
            status,
            reason: reason.into(),
        }
    }

    /// Check if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}
