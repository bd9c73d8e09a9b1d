//! Wiring and the one-shot observe driver.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cdp_delivery::DeliveryClient;
use cdp_events::{EventFactory, ManagedResource};
use cdp_reconciler::{
    AdapterDeps, ExternalClient, ExternalObservation, NotifyState, ReconcileAdapter,
};
use cdp_registry::IdempotencyRegistry;
use futures::future::join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ProviderConfig;
use crate::error::{Error, Result};

/// Result of observing one resource document.
#[derive(Debug, Clone, Serialize)]
pub struct ObserveReport {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation: Option<ExternalObservation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<NotifyState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ObserveReport {
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    fn unreadable(path: PathBuf, error: &Error) -> Self {
        Self {
            path,
            resource: None,
            observation: None,
            state: None,
            error: Some(error.to_string()),
        }
    }
}

/// A configured adapter plus the operations the CLI exposes.
#[derive(Debug, Clone)]
pub struct Provider {
    adapter: Arc<ReconcileAdapter>,
}

impl Provider {
    /// Validate the configuration and build every dependency.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the registry
    /// store cannot be opened.
    pub async fn from_config(config: &ProviderConfig) -> Result<Self> {
        let target = config.validate()?;
        let registry = IdempotencyRegistry::from_config(&config.registry).await?;
        let delivery = DeliveryClient::from_config(&config.delivery)?;
        let factory = EventFactory::default().with_payload(config.payload.clone());

        info!(
            sink = %target,
            record = %registry.record(),
            durable = !config.registry.ephemeral,
            data_dir = %config.registry.data_dir.display(),
            max_attempts = config.delivery.retry.max_attempts,
            notify_modified = config.notify_modified,
            "Provider configured"
        );

        let deps = AdapterDeps::new(registry, factory, delivery, target)
            .notify_modified(config.notify_modified);
        Ok(Self::new(ReconcileAdapter::new(deps)))
    }

    #[must_use]
    pub fn new(adapter: ReconcileAdapter) -> Self {
        Self {
            adapter: Arc::new(adapter),
        }
    }

    #[must_use]
    pub fn adapter(&self) -> &ReconcileAdapter {
        &self.adapter
    }

    /// Observe every resource document once.
    ///
    /// Distinct resources are observed concurrently. Documents naming the
    /// same resource are observed one after another, in the order given.
    pub async fn observe_files(
        &self,
        paths: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Vec<ObserveReport> {
        let mut reports = Vec::new();
        let mut groups: HashMap<String, Vec<(PathBuf, ManagedResource)>> = HashMap::new();
        let mut order = Vec::new();

        for path in paths {
            match load_resource(path).await {
                Ok(resource) => {
                    let key = resource.identity.key();
                    if !groups.contains_key(&key) {
                        order.push(key.clone());
                    }
                    groups.entry(key).or_default().push((path.clone(), resource));
                }
                Err(e) => reports.push(ObserveReport::unreadable(path.clone(), &e)),
            }
        }

        let runs = order
            .into_iter()
            .filter_map(|key| groups.remove(&key))
            .map(|group| self.observe_group(group, cancel));

        reports.extend(join_all(runs).await.into_iter().flatten());
        reports
    }

    async fn observe_group(
        &self,
        group: Vec<(PathBuf, ManagedResource)>,
        cancel: &CancellationToken,
    ) -> Vec<ObserveReport> {
        let mut reports = Vec::with_capacity(group.len());
        for (path, resource) in group {
            reports.push(self.observe_one(path, &resource, cancel).await);
        }
        reports
    }

    async fn observe_one(
        &self,
        path: PathBuf,
        resource: &ManagedResource,
        cancel: &CancellationToken,
    ) -> ObserveReport {
        debug!(path = %path.display(), resource = %resource.identity, "Observing");

        let (observation, error) = match self.adapter.observe(resource, cancel).await {
            Ok(observation) => (observation, None),
            Err(e) => {
                let message = e.to_string();
                (e.observation, Some(message))
            }
        };

        ObserveReport {
            path,
            resource: Some(resource.identity.key()),
            observation: Some(observation),
            state: Some(self.adapter.notify_state(resource).await),
            error,
        }
    }

    /// Markers currently recorded in the registry.
    ///
    /// # Errors
    ///
    /// Returns `Registry` if the store cannot be read.
    pub async fn markers(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.adapter.registry().entries().await?)
    }
}

/// Read a Kubernetes-shaped resource document.
///
/// # Errors
///
/// Returns `ResourceRead` or `ResourceParse`.
pub async fn load_resource(path: &Path) -> Result<ManagedResource> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| Error::ResourceRead {
            path: path.to_path_buf(),
            source,
        })?;

    serde_json::from_str(&content).map_err(|e| Error::ResourceParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
