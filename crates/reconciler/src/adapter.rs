//! Reconcile adapter: the external client the operator runtime drives.

use async_trait::async_trait;
use cdp_delivery::{DeliveryClient, SinkTarget};
use cdp_events::{DomainEvent, EventFactory, ManagedResource, ResourceIdentity, TransitionKind};
use cdp_registry::IdempotencyRegistry;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::detector::TransitionDetector;
use crate::error::{Error, ObserveError, Result};
use crate::types::{ExternalCreation, ExternalObservation, ExternalUpdate, NotifyState};

/// Operations the operator runtime invokes for each managed resource.
///
/// The runtime never calls these concurrently for the same resource.
#[async_trait]
pub trait ExternalClient: Send + Sync {
    /// Observe the external resource.
    async fn observe(
        &self,
        resource: &ManagedResource,
        cancel: &CancellationToken,
    ) -> std::result::Result<ExternalObservation, ObserveError>;

    /// Create the external resource.
    async fn create(
        &self,
        resource: &ManagedResource,
        cancel: &CancellationToken,
    ) -> Result<ExternalCreation>;

    /// Update the external resource.
    async fn update(
        &self,
        resource: &ManagedResource,
        cancel: &CancellationToken,
    ) -> Result<ExternalUpdate>;

    /// Delete the external resource.
    async fn delete(&self, resource: &ManagedResource, cancel: &CancellationToken) -> Result<()>;
}

/// Everything the adapter needs, passed in explicitly.
///
/// The transition detector is not part of the bundle: the adapter derives
/// it from `registry`, so detection and marking share one store.
#[derive(Debug, Clone)]
pub struct AdapterDeps {
    registry: IdempotencyRegistry,
    factory: EventFactory,
    delivery: DeliveryClient,
    target: SinkTarget,
    notify_modified: bool,
}

impl AdapterDeps {
    /// Bundle dependencies.
    #[must_use]
    pub const fn new(
        registry: IdempotencyRegistry,
        factory: EventFactory,
        delivery: DeliveryClient,
        target: SinkTarget,
    ) -> Self {
        Self {
            registry,
            factory,
            delivery,
            target,
            notify_modified: false,
        }
    }

    /// Deliver modification events as well. Never deduplicated.
    #[must_use]
    pub const fn notify_modified(mut self, enabled: bool) -> Self {
        self.notify_modified = enabled;
        self
    }
}

/// Sends a creation event the first time a resource reports ready, and
/// records it so later observes stay silent.
#[derive(Debug, Clone)]
pub struct ReconcileAdapter {
    registry: IdempotencyRegistry,
    detector: TransitionDetector,
    factory: EventFactory,
    delivery: DeliveryClient,
    target: SinkTarget,
    notify_modified: bool,
}

impl ReconcileAdapter {
    /// Create an adapter from its dependencies.
    #[must_use]
    pub fn new(deps: AdapterDeps) -> Self {
        Self {
            detector: TransitionDetector::new(deps.registry.clone()),
            registry: deps.registry,
            factory: deps.factory,
            delivery: deps.delivery,
            target: deps.target,
            notify_modified: deps.notify_modified,
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &IdempotencyRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn target(&self) -> &SinkTarget {
        &self.target
    }

    /// Report the notification state of a resource.
    ///
    /// A recorded marker wins over the current status: once notified, a
    /// resource stays notified for the lifetime of its marker.
    pub async fn notify_state(&self, resource: &ManagedResource) -> NotifyState {
        let ready = resource.status.is_ready();
        match self.registry.exists(&resource.identity).await {
            Ok(true) => NotifyState::ReadyNotified,
            Ok(false) if ready => NotifyState::ReadyPendingNotify,
            Ok(false) => NotifyState::NotReady,
            Err(e) => {
                warn!(resource = %resource.identity, error = %e, "Notify state unknown");
                NotifyState::Unknown
            }
        }
    }

    async fn notify(&self, resource: &ManagedResource, cancel: &CancellationToken) -> Result<()> {
        let identity = &resource.identity;
        let detection = self.detector.detect(identity, &resource.status).await?;

        match detection.kind {
            Some(TransitionKind::Created) if detection.should_notify => {
                let event = self.factory.build(TransitionKind::Created, identity)?;
                self.deliver(&event, cancel).await?;
                self.registry.mark(identity).await?;
                info!(resource = %identity, event_id = %event.id(), "Creation notified");
                Ok(())
            }
            Some(TransitionKind::Modified) if self.notify_modified => {
                let event = self.factory.build(TransitionKind::Modified, identity)?;
                self.deliver(&event, cancel).await?;
                Ok(())
            }
            Some(kind) => {
                debug!(resource = %identity, kind = %kind, "Observed without notification");
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn deliver(&self, event: &DomainEvent, cancel: &CancellationToken) -> Result<()> {
        self.delivery
            .send(event, &self.target, cancel)
            .await
            .into_result(event)?;
        Ok(())
    }

    fn log_noop(operation: &str, identity: &ResourceIdentity) {
        debug!(resource = %identity, operation, "No-op on external resource");
    }
}

#[async_trait]
impl ExternalClient for ReconcileAdapter {
    async fn observe(
        &self,
        resource: &ManagedResource,
        cancel: &CancellationToken,
    ) -> std::result::Result<ExternalObservation, ObserveError> {
        let observation = ExternalObservation::up_to_date();

        match self.notify(resource, cancel).await {
            Ok(()) => Ok(observation),
            Err(source) => {
                warn!(
                    resource = %resource.identity,
                    error = %source,
                    transient = source.is_transient(),
                    "Notification failed, requeue"
                );
                Err(ObserveError::new(observation, source))
            }
        }
    }

    async fn create(
        &self,
        resource: &ManagedResource,
        _cancel: &CancellationToken,
    ) -> Result<ExternalCreation> {
        Self::log_noop("create", &resource.identity);
        Ok(ExternalCreation::default())
    }

    async fn update(
        &self,
        resource: &ManagedResource,
        _cancel: &CancellationToken,
    ) -> Result<ExternalUpdate> {
        Self::log_noop("update", &resource.identity);
        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, resource: &ManagedResource, _cancel: &CancellationToken) -> Result<()> {
        Self::log_noop("delete", &resource.identity);
        Ok(())
    }
}

/// Builder for `ReconcileAdapter`.
#[derive(Default)]
pub struct ReconcileAdapterBuilder {
    registry: Option<IdempotencyRegistry>,
    factory: EventFactory,
    delivery: Option<DeliveryClient>,
    target: Option<SinkTarget>,
    notify_modified: bool,
}

impl ReconcileAdapterBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_registry(mut self, registry: IdempotencyRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn with_factory(mut self, factory: EventFactory) -> Self {
        self.factory = factory;
        self
    }

    #[must_use]
    pub fn with_delivery(mut self, delivery: DeliveryClient) -> Self {
        self.delivery = Some(delivery);
        self
    }

    #[must_use]
    pub fn with_target(mut self, target: SinkTarget) -> Self {
        self.target = Some(target);
        self
    }

    #[must_use]
    pub const fn notify_modified(mut self, enabled: bool) -> Self {
        self.notify_modified = enabled;
        self
    }

    /// Build the adapter.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the registry, delivery client or sink
    /// target is missing.
    pub fn build(self) -> Result<ReconcileAdapter> {
        let registry = self
            .registry
            .ok_or_else(|| Error::configuration("idempotency registry is required"))?;
        let delivery = self
            .delivery
            .ok_or_else(|| Error::configuration("delivery client is required"))?;
        let target = self
            .target
            .ok_or_else(|| Error::configuration("sink target is required"))?;

        let deps = AdapterDeps::new(registry, self.factory, delivery, target)
            .notify_modified(self.notify_modified);
        Ok(ReconcileAdapter::new(deps))
    }
}
