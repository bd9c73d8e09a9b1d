//! Transition detection.

use cdp_events::{ObservedStatus, ResourceIdentity};
use cdp_registry::IdempotencyRegistry;
use tracing::debug;

use crate::error::Result;
use crate::types::Detection;

/// Decides whether an observed status owes a creation notification.
#[derive(Debug, Clone)]
pub struct TransitionDetector {
    registry: IdempotencyRegistry,
}

impl TransitionDetector {
    /// Create a detector over a registry.
    #[must_use]
    pub const fn new(registry: IdempotencyRegistry) -> Self {
        Self { registry }
    }

    /// Classify an observation.
    ///
    /// The registry is only consulted once the resource reports
    /// `Ready=True`. A registry failure is returned, never treated as
    /// "not yet notified".
    ///
    /// # Errors
    ///
    /// Returns `Registry` if the marker lookup fails.
    pub async fn detect(
        &self,
        identity: &ResourceIdentity,
        status: &ObservedStatus,
    ) -> Result<Detection> {
        if !status.is_ready() {
            debug!(resource = %identity, "Resource not ready");
            return Ok(Detection::not_ready());
        }

        if self.registry.exists(identity).await? {
            debug!(resource = %identity, "Creation already notified");
            Ok(Detection::modified())
        } else {
            debug!(resource = %identity, "Resource ready for the first time");
            Ok(Detection::created())
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &IdempotencyRegistry {
        &self.registry
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::Error;
    use cdp_events::{ConditionStatus, TransitionKind};
    use cdp_registry::{InMemoryRecordStore, RecordRef};

    fn identity() -> ResourceIdentity {
        ResourceIdentity::new("default", "c1").unwrap()
    }

    fn setup() -> (TransitionDetector, Arc<InMemoryRecordStore>) {
        let store = InMemoryRecordStore::new_arc();
        let registry = IdempotencyRegistry::new(store.clone(), RecordRef::default());
        (TransitionDetector::new(registry), store)
    }

    #[tokio::test]
    async fn test_not_ready_skips_registry() {
        let (detector, store) = setup();
        store.set_available(false);

        for status in [
            ObservedStatus::default(),
            ObservedStatus::with_ready(ConditionStatus::False),
            ObservedStatus::with_ready(ConditionStatus::Unknown),
        ] {
            let detection = detector.detect(&identity(), &status).await.unwrap();
            assert_eq!(detection, Detection::not_ready());
        }
    }

    #[tokio::test]
    async fn test_first_ready_is_created() {
        let (detector, _) = setup();
        let detection = detector
            .detect(&identity(), &ObservedStatus::with_ready(ConditionStatus::True))
            .await
            .unwrap();

        assert_eq!(detection.kind, Some(TransitionKind::Created));
        assert!(detection.should_notify);
    }

    #[tokio::test]
    async fn test_marked_resource_is_modified() {
        let (detector, _) = setup();
        detector.registry().mark(&identity()).await.unwrap();

        let detection = detector
            .detect(&identity(), &ObservedStatus::with_ready(ConditionStatus::True))
            .await
            .unwrap();

        assert_eq!(detection, Detection::modified());
    }

    #[tokio::test]
    async fn test_registry_failure_propagates() {
        let (detector, store) = setup();
        store.set_available(false);

        let result = detector
            .detect(&identity(), &ObservedStatus::with_ready(ConditionStatus::True))
            .await;

        assert!(matches!(result, Err(Error::Registry(_))));
    }
}
