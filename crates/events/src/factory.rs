//! Builds domain events from transition classifications.

use chrono::Utc;
use tracing::debug;

use crate::error::Result;
use crate::event::{DomainEvent, EventPayload};
use crate::types::{EventId, EventTypeMap, ResourceIdentity, TransitionKind};

/// Builds well-formed, uniquely identified domain events.
#[derive(Debug, Clone, Default)]
pub struct EventFactory {
    types: EventTypeMap,
    payload: EventPayload,
}

impl EventFactory {
    /// Create a factory with an explicit type table and payload.
    #[must_use]
    pub const fn new(types: EventTypeMap, payload: EventPayload) -> Self {
        Self { types, payload }
    }

    /// Replace the payload attached to built events.
    #[must_use]
    pub fn with_payload(mut self, payload: EventPayload) -> Self {
        self.payload = payload;
        self
    }

    /// The type table this factory resolves kinds against.
    #[must_use]
    pub const fn types(&self) -> &EventTypeMap {
        &self.types
    }

    /// Build the event for one logical notification.
    ///
    /// The id and timestamp are fresh on every call; callers retrying a send
    /// must reuse the returned value instead of building again.
    ///
    /// # Errors
    ///
    /// Returns `UnmappedTransition` if `kind` has no entry in the type table,
    /// or `Serialization` if the payload cannot be encoded.
    pub fn build(&self, kind: TransitionKind, identity: &ResourceIdentity) -> Result<DomainEvent> {
        let event_type = self.types.event_type(kind)?;
        let data = serde_json::to_value(&self.payload)?;
        let event = DomainEvent::new(EventId::new(), event_type, identity.key(), Utc::now(), data);

        debug!(
            event_id = %event.id(),
            event_type,
            source = event.source(),
            "Built domain event"
        );

        Ok(event)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::{ENVIRONMENT_CREATED_V1, ENVIRONMENT_MODIFIED_V1};

    fn identity() -> ResourceIdentity {
        ResourceIdentity::new("default", "c1").unwrap()
    }

    #[test]
    fn test_build_created_event() {
        let factory = EventFactory::default();
        let event = factory.build(TransitionKind::Created, &identity()).unwrap();

        assert_eq!(event.event_type(), ENVIRONMENT_CREATED_V1);
        assert_eq!(event.source(), "default/c1");
        assert_eq!(event.data()["path"], "workspace/source/config/");
    }

    #[test]
    fn test_build_modified_event() {
        let factory = EventFactory::default();
        let event = factory.build(TransitionKind::Modified, &identity()).unwrap();
        assert_eq!(event.event_type(), ENVIRONMENT_MODIFIED_V1);
    }

    #[test]
    fn test_each_build_gets_fresh_id() {
        let factory = EventFactory::default();
        let first = factory.build(TransitionKind::Created, &identity()).unwrap();
        let second = factory.build(TransitionKind::Created, &identity()).unwrap();
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn test_substituted_type_table() {
        let types = EventTypeMap::empty().with(TransitionKind::Created, "test.created");
        let factory = EventFactory::new(types, EventPayload::default());

        let event = factory.build(TransitionKind::Created, &identity()).unwrap();
        assert_eq!(event.event_type(), "test.created");

        let missing = factory.build(TransitionKind::Modified, &identity());
        assert_eq!(
            missing,
            Err(Error::unmapped_transition(TransitionKind::Modified))
        );
    }

    #[test]
    fn test_custom_payload() {
        let payload = EventPayload {
            path: "infra/".to_string(),
            git_source_name: "infra-git".to_string(),
            docker_repo: "acme".to_string(),
        };
        let factory = EventFactory::default().with_payload(payload);
        let event = factory.build(TransitionKind::Created, &identity()).unwrap();
        assert_eq!(event.data()["docker_repo"], "acme");
    }
}
