//! Domain event carried to the sink.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::types::EventId;

/// CloudEvents specification version carried by every event.
pub const SPEC_VERSION: &str = "1.0";

/// Content type of the event data.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Informational metadata attached to every event.
///
/// These fields are not identity-bearing; the sink treats them as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_git_source_name")]
    pub git_source_name: String,
    #[serde(default = "default_docker_repo")]
    pub docker_repo: String,
}

impl Default for EventPayload {
    fn default() -> Self {
        Self {
            path: default_path(),
            git_source_name: default_git_source_name(),
            docker_repo: default_docker_repo(),
        }
    }
}

fn default_path() -> String {
    "workspace/source/config/".to_string()
}

fn default_git_source_name() -> String {
    "cluster-git".to_string()
}

fn default_docker_repo() -> String {
    "ishankhare07".to_string()
}

/// A uniquely identified event, serialized in CloudEvents structured form.
///
/// Built once per logical notification. Every retry of the same send reuses
/// the same value, so the id stays stable and the sink can deduplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    #[serde(rename = "specversion")]
    spec_version: String,
    id: EventId,
    source: String,
    #[serde(rename = "type")]
    event_type: String,
    time: DateTime<Utc>,
    #[serde(rename = "datacontenttype")]
    data_content_type: String,
    data: serde_json::Value,
}

impl DomainEvent {
    pub(crate) fn new(
        id: EventId,
        event_type: impl Into<String>,
        source: impl Into<String>,
        time: DateTime<Utc>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            spec_version: SPEC_VERSION.to_string(),
            id,
            source: source.into(),
            event_type: event_type.into(),
            time,
            data_content_type: JSON_CONTENT_TYPE.to_string(),
            data,
        }
    }

    #[must_use]
    pub const fn id(&self) -> EventId {
        self.id
    }

    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub const fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Timestamp formatted as RFC3339.
    #[must_use]
    pub fn time_rfc3339(&self) -> String {
        self.time.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    #[must_use]
    pub fn spec_version(&self) -> &str {
        &self.spec_version
    }

    #[must_use]
    pub fn data_content_type(&self) -> &str {
        &self.data_content_type
    }

    #[must_use]
    pub const fn data(&self) -> &serde_json::Value {
        &self.data
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample() -> DomainEvent {
        DomainEvent::new(
            EventId::new(),
            "cd.environment.created.v1",
            "default/c1",
            Utc::now(),
            serde_json::to_value(EventPayload::default()).unwrap(),
        )
    }

    #[test]
    fn test_structured_json_shape() {
        let event = sample();
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["specversion"], "1.0");
        assert_eq!(json["type"], "cd.environment.created.v1");
        assert_eq!(json["source"], "default/c1");
        assert_eq!(json["datacontenttype"], "application/json");
        assert_eq!(json["data"]["git_source_name"], "cluster-git");
        assert_eq!(json["id"], event.id().to_string());
    }

    #[test]
    fn test_time_is_rfc3339() {
        let event = sample();
        let parsed = DateTime::parse_from_rfc3339(&event.time_rfc3339());
        assert!(parsed.is_ok());
    }

    #[test]
    fn test_payload_defaults_fill_missing_fields() {
        let payload: EventPayload = serde_json::from_str(r#"{"path": "custom/"}"#).unwrap();
        assert_eq!(payload.path, "custom/");
        assert_eq!(payload.docker_repo, "ishankhare07");
    }

    #[test]
    fn test_clone_keeps_identity() {
        let event = sample();
        let retry = event.clone();
        assert_eq!(event.id(), retry.id());
        assert_eq!(event, retry);
    }
}
