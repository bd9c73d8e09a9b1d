//! Record store trait and implementations.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Error, Result};

/// Name of the shared record holding every marker.
pub const DEFAULT_RECORD_NAME: &str = "cdevents-provider-status-list";

/// Namespace of the shared record.
pub const DEFAULT_RECORD_NAMESPACE: &str = "crossplane-system";

/// Reference to a named record in the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    pub namespace: String,
    pub name: String,
}

impl RecordRef {
    /// Create a record reference.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl Default for RecordRef {
    fn default() -> Self {
        Self::new(DEFAULT_RECORD_NAMESPACE, DEFAULT_RECORD_NAME)
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A record's data together with its version token.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VersionedRecord {
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    pub version: u64,
}

/// Trait for the storage backing the idempotency registry.
///
/// Writes are conditional: `update` only succeeds when the caller's
/// `expected_version` matches the stored version.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read a record. `None` if it does not exist.
    async fn get(&self, record: &RecordRef) -> Result<Option<VersionedRecord>>;

    /// Create a record. Fails with `StoreConflict` if it already exists.
    async fn create(
        &self,
        record: &RecordRef,
        data: BTreeMap<String, String>,
    ) -> Result<VersionedRecord>;

    /// Replace a record's data if its version still matches.
    async fn update(
        &self,
        record: &RecordRef,
        data: BTreeMap<String, String>,
        expected_version: u64,
    ) -> Result<VersionedRecord>;
}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    async fn get(&self, record: &RecordRef) -> Result<Option<VersionedRecord>> {
        (**self).get(record).await
    }

    async fn create(
        &self,
        record: &RecordRef,
        data: BTreeMap<String, String>,
    ) -> Result<VersionedRecord> {
        (**self).create(record, data).await
    }

    async fn update(
        &self,
        record: &RecordRef,
        data: BTreeMap<String, String>,
        expected_version: u64,
    ) -> Result<VersionedRecord> {
        (**self).update(record, data, expected_version).await
    }
}

/// In-memory record store for tests and ephemeral runs.
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<RecordRef, VersionedRecord>>,
    available: AtomicBool,
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }
}

impl InMemoryRecordStore {
    /// Create a new in-memory record store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new in-memory record store wrapped in an Arc.
    #[must_use]
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Simulate the store becoming reachable or unreachable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self, operation: &str) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::store_unavailable(operation, "store is offline"))
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, record: &RecordRef) -> Result<Option<VersionedRecord>> {
        self.check_available("get")?;
        Ok(self.records.read().await.get(record).cloned())
    }

    async fn create(
        &self,
        record: &RecordRef,
        data: BTreeMap<String, String>,
    ) -> Result<VersionedRecord> {
        self.check_available("create")?;
        let mut records = self.records.write().await;

        if records.contains_key(record) {
            return Err(Error::store_conflict(record.to_string(), "already exists"));
        }

        let created = VersionedRecord { data, version: 1 };
        records.insert(record.clone(), created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        record: &RecordRef,
        data: BTreeMap<String, String>,
        expected_version: u64,
    ) -> Result<VersionedRecord> {
        self.check_available("update")?;
        let mut records = self.records.write().await;

        let current = records
            .get_mut(record)
            .ok_or_else(|| Error::store_conflict(record.to_string(), "record was deleted"))?;

        if current.version != expected_version {
            return Err(Error::store_conflict(
                record.to_string(),
                format!(
                    "expected version {expected_version}, found {}",
                    current.version
                ),
            ));
        }

        current.data = data;
        current.version = current.version.saturating_add(1);
        Ok(current.clone())
    }
}

/// A wrapper that adds tracing to a record store.
pub struct TracingRecordStore<S: RecordStore> {
    inner: S,
}

impl<S: RecordStore> TracingRecordStore<S> {
    /// Create a new tracing record store.
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for TracingRecordStore<S> {
    async fn get(&self, record: &RecordRef) -> Result<Option<VersionedRecord>> {
        tracing::debug!(record = %record, "Reading record");
        let result = self.inner.get(record).await;
        if let Ok(Some(ref found)) = result {
            tracing::trace!(version = found.version, entries = found.data.len(), "Record read");
        }
        result
    }

    async fn create(
        &self,
        record: &RecordRef,
        data: BTreeMap<String, String>,
    ) -> Result<VersionedRecord> {
        tracing::debug!(record = %record, entries = data.len(), "Creating record");
        self.inner.create(record, data).await
    }

    async fn update(
        &self,
        record: &RecordRef,
        data: BTreeMap<String, String>,
        expected_version: u64,
    ) -> Result<VersionedRecord> {
        tracing::debug!(
            record = %record,
            entries = data.len(),
            expected_version,
            "Updating record"
        );
        let result = self.inner.update(record, data, expected_version).await;
        if let Ok(ref updated) = result {
            tracing::trace!(version = updated.version, "Record updated");
        }
        result
    }
}
