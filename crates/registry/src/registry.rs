//! Idempotency registry.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use cdp_events::ResourceIdentity;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::sqlite_store::SqliteRecordStore;
use crate::store::{
    DEFAULT_RECORD_NAME, DEFAULT_RECORD_NAMESPACE, InMemoryRecordStore, RecordRef, RecordStore,
    TracingRecordStore,
};

/// Value stored against a resource key once its event was delivered.
pub const MARKER_VALUE: &str = "updated";

/// Default location of the durable registry database.
pub const DEFAULT_DATA_DIR: &str = "/var/lib/cdevents-provider";

/// Configuration for the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Namespace of the shared record.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Name of the shared record.
    #[serde(default = "default_name")]
    pub name: String,

    /// Read-modify-write attempts before a conflict is surfaced.
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,

    /// Directory holding the registry database.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Keep markers in memory only. They are lost when the process exits.
    #[serde(default)]
    pub ephemeral: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            name: default_name(),
            conflict_retries: default_conflict_retries(),
            data_dir: default_data_dir(),
            ephemeral: false,
        }
    }
}

impl RegistryConfig {
    /// Reference to the shared record this config points at.
    #[must_use]
    pub fn record(&self) -> RecordRef {
        RecordRef::new(&self.namespace, &self.name)
    }

    /// Set the data directory.
    #[must_use]
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Keep markers in memory instead of the data directory.
    #[must_use]
    pub const fn ephemeral(mut self, ephemeral: bool) -> Self {
        self.ephemeral = ephemeral;
        self
    }
}

fn default_namespace() -> String {
    DEFAULT_RECORD_NAMESPACE.to_string()
}

fn default_name() -> String {
    DEFAULT_RECORD_NAME.to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

const fn default_conflict_retries() -> u32 {
    5
}

/// Records which resources have already had their creation event delivered.
///
/// All markers live in one shared record. Every write is a read-modify-write
/// guarded by the record's version token, so concurrent marks for distinct
/// resources never clobber each other.
#[derive(Clone)]
pub struct IdempotencyRegistry {
    store: Arc<dyn RecordStore>,
    record: RecordRef,
    conflict_retries: u32,
}

impl IdempotencyRegistry {
    /// Create a registry over an existing store.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, record: RecordRef) -> Self {
        Self {
            store,
            record,
            conflict_retries: default_conflict_retries(),
        }
    }

    /// Set the bound on read-modify-write attempts.
    #[must_use]
    pub const fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }

    /// Create an in-memory registry with the default record.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(InMemoryRecordStore::new_arc(), RecordRef::default())
    }

    /// Build a registry from configuration.
    ///
    /// Opens the SQLite store under `data_dir` unless `ephemeral` is set.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the database cannot be opened.
    pub async fn from_config(config: &RegistryConfig) -> Result<Self> {
        let store: Arc<dyn RecordStore> = if config.ephemeral {
            warn!(record = %config.record(), "Registry is ephemeral, markers will not survive a restart");
            Arc::new(TracingRecordStore::new(InMemoryRecordStore::new()))
        } else {
            Arc::new(TracingRecordStore::new(
                SqliteRecordStore::open(&config.data_dir).await?,
            ))
        };

        Ok(Self::new(store, config.record()).with_conflict_retries(config.conflict_retries))
    }

    /// The shared record holding the markers.
    #[must_use]
    pub const fn record(&self) -> &RecordRef {
        &self.record
    }

    /// Check whether a marker exists for the resource.
    ///
    /// A missing record means nothing has been marked yet.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store cannot be read. Callers must
    /// treat this as unknown, never as absent.
    pub async fn exists(&self, identity: &ResourceIdentity) -> Result<bool> {
        let key = identity.key();
        let found = self
            .store
            .get(&self.record)
            .await?
            .is_some_and(|record| record.data.contains_key(&key));

        debug!(key = %key, found, "Checked registry");
        Ok(found)
    }

    /// Durably record the marker for the resource.
    ///
    /// Marking an already-marked resource is a no-op success.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store cannot be reached, or
    /// `StoreConflict` if every read-modify-write attempt lost a race.
    pub async fn mark(&self, identity: &ResourceIdentity) -> Result<()> {
        let key = identity.key();
        let attempts = self.conflict_retries.max(1);
        let mut last_conflict = None;

        for attempt in 1..=attempts {
            match self.try_mark(&key).await {
                Ok(()) => {
                    info!(key = %key, record = %self.record, "Marked event as delivered");
                    return Ok(());
                }
                Err(e) if e.is_conflict() => {
                    warn!(
                        key = %key,
                        attempt,
                        remaining = attempts - attempt,
                        error = %e,
                        "Registry update conflicted, re-reading"
                    );
                    last_conflict = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_conflict.unwrap_or_else(|| {
            Error::store_conflict(self.record.to_string(), "retries exhausted")
        }))
    }

    async fn try_mark(&self, key: &str) -> Result<()> {
        match self.store.get(&self.record).await? {
            Some(current) if current.data.contains_key(key) => {
                debug!(key = %key, "Marker already present");
                Ok(())
            }
            Some(current) => {
                let mut data = current.data;
                data.insert(key.to_string(), MARKER_VALUE.to_string());
                self.store
                    .update(&self.record, data, current.version)
                    .await
                    .map(|_| ())
            }
            None => {
                let mut data = BTreeMap::new();
                data.insert(key.to_string(), MARKER_VALUE.to_string());
                self.store.create(&self.record, data).await.map(|_| ())
            }
        }
    }

    /// All markers currently recorded.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store cannot be read.
    pub async fn entries(&self) -> Result<BTreeMap<String, String>> {
        Ok(self
            .store
            .get(&self.record)
            .await?
            .map(|record| record.data)
            .unwrap_or_default())
    }
}

impl std::fmt::Debug for IdempotencyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdempotencyRegistry")
            .field("record", &self.record)
            .field("conflict_retries", &self.conflict_retries)
            .finish_non_exhaustive()
    }
}
