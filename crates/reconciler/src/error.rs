//! Error types for the reconciler crate.

use thiserror::Error;

use crate::types::ExternalObservation;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciler error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Identity or event construction failed.
    #[error(transparent)]
    Events(#[from] cdp_events::Error),

    /// The idempotency registry could not be read or written.
    #[error(transparent)]
    Registry(#[from] cdp_registry::Error),

    /// The sink did not acknowledge the event.
    #[error(transparent)]
    Delivery(#[from] cdp_delivery::Error),

    /// Invalid adapter configuration.
    #[error("configuration error: {reason}")]
    Configuration { reason: String },
}

impl Error {
    /// Create a configuration error.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Check whether a later reconcile may succeed without intervention.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Registry(_) => true,
            Self::Delivery(inner) => inner.is_transient(),
            Self::Events(_) | Self::Configuration { .. } => false,
        }
    }
}

/// A failed observe.
///
/// The observation is still reported; the error asks the runtime to
/// requeue the resource.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("observe failed: {source}")]
pub struct ObserveError {
    pub observation: ExternalObservation,
    #[source]
    pub source: Error,
}

impl ObserveError {
    #[must_use]
    pub const fn new(observation: ExternalObservation, source: Error) -> Self {
        Self {
            observation,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_is_transparent() {
        let err = Error::from(cdp_registry::Error::store_unavailable("get", "connection refused"));
        assert!(err.to_string().contains("connection refused"));
        assert!(err.is_transient());
    }

    #[test]
    fn test_rejection_is_not_transient() {
        let err = Error::from(cdp_delivery::Error::DeliveryRejected {
            event_id: "id".to_string(),
            status: Some(400),
            reason: "bad request".to_string(),
        });
        assert!(!err.is_transient());
    }

    #[test]
    fn test_observe_error_keeps_observation() {
        let err = ObserveError::new(
            ExternalObservation::up_to_date(),
            Error::configuration("missing sink"),
        );
        assert!(err.observation.resource_exists);
        assert!(err.to_string().contains("missing sink"));
    }
}
