//! Core types for the reconciler.

use std::collections::BTreeMap;
use std::fmt;

use cdp_events::TransitionKind;
use serde::{Deserialize, Serialize};

/// Connection details published for a managed resource.
///
/// This provider publishes none; the map is always empty.
pub type ConnectionDetails = BTreeMap<String, Vec<u8>>;

/// What an observe reports back to the operator runtime.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExternalObservation {
    pub resource_exists: bool,
    pub resource_up_to_date: bool,
    #[serde(default)]
    pub connection_details: ConnectionDetails,
}

impl ExternalObservation {
    /// The resource exists and needs no create or update.
    #[must_use]
    pub const fn up_to_date() -> Self {
        Self {
            resource_exists: true,
            resource_up_to_date: true,
            connection_details: BTreeMap::new(),
        }
    }
}

/// Result of a create call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExternalCreation {
    #[serde(default)]
    pub connection_details: ConnectionDetails,
}

/// Result of an update call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExternalUpdate {
    #[serde(default)]
    pub connection_details: ConnectionDetails,
}

/// Outcome of transition detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    /// The transition observed, if the resource is ready.
    pub kind: Option<TransitionKind>,
    /// Whether a creation notification is owed.
    pub should_notify: bool,
}

impl Detection {
    /// Not ready: nothing to report.
    #[must_use]
    pub const fn not_ready() -> Self {
        Self {
            kind: None,
            should_notify: false,
        }
    }

    /// Ready and already notified.
    #[must_use]
    pub const fn modified() -> Self {
        Self {
            kind: Some(TransitionKind::Modified),
            should_notify: false,
        }
    }

    /// Ready for the first time.
    #[must_use]
    pub const fn created() -> Self {
        Self {
            kind: Some(TransitionKind::Created),
            should_notify: true,
        }
    }
}

/// Notification state of one resource, as perceived from status and the
/// registry.
///
/// `ReadyNotified` is terminal for the lifetime of the registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyState {
    /// The registry could not be read.
    Unknown,
    /// No `Ready=True` condition.
    NotReady,
    /// Ready, creation event not yet acknowledged.
    ReadyPendingNotify,
    /// Ready and the creation event was acknowledged and recorded.
    ReadyNotified,
}

impl fmt::Display for NotifyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unknown => "unknown",
            Self::NotReady => "not_ready",
            Self::ReadyPendingNotify => "ready_pending_notify",
            Self::ReadyNotified => "ready_notified",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_observation_always_exists_and_up_to_date() {
        let observation = ExternalObservation::up_to_date();
        assert!(observation.resource_exists);
        assert!(observation.resource_up_to_date);
        assert!(observation.connection_details.is_empty());
    }

    #[test]
    fn test_detection_constructors() {
        assert_eq!(Detection::not_ready().kind, None);
        assert!(!Detection::modified().should_notify);
        assert_eq!(Detection::created().kind, Some(TransitionKind::Created));
        assert!(Detection::created().should_notify);
    }

    #[test]
    fn test_notify_state_serializes_snake_case() {
        let json = serde_json::to_string(&NotifyState::ReadyPendingNotify).unwrap();
        assert_eq!(json, "\"ready_pending_notify\"");
        assert_eq!(NotifyState::ReadyNotified.to_string(), "ready_notified");
    }
}
