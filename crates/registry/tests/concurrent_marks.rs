//! Concurrency tests for the idempotency registry.
//!
//! Tests verify that:
//! - Concurrent marks for distinct resources never lose a marker
//! - Conflicting writes are retried with fresh state, then surfaced
//! - Markers survive a restart when the SQLite store is used
//! - Registries on separate store instances sharing one database never lose
//!   an acknowledged marker

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use cdp_events::ResourceIdentity;
use cdp_registry::{
    Error, IdempotencyRegistry, InMemoryRecordStore, RecordRef, RecordStore, RegistryConfig,
    Result, SqliteRecordStore, VersionedRecord,
};
use futures::future::join_all;
use tempfile::tempdir;

/// Store that reports a conflict for the first `conflicts` writes.
struct ContendedStore {
    inner: InMemoryRecordStore,
    conflicts: AtomicU32,
    writes: AtomicU32,
}

impl ContendedStore {
    fn new(conflicts: u32) -> Self {
        Self {
            inner: InMemoryRecordStore::new(),
            conflicts: AtomicU32::new(conflicts),
            writes: AtomicU32::new(0),
        }
    }

    fn take_conflict(&self, record: &RecordRef) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let left = self.conflicts.load(Ordering::SeqCst);
        if left > 0 {
            self.conflicts.store(left - 1, Ordering::SeqCst);
            return Err(Error::store_conflict(record.to_string(), "injected"));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for ContendedStore {
    async fn get(&self, record: &RecordRef) -> Result<Option<VersionedRecord>> {
        self.inner.get(record).await
    }

    async fn create(
        &self,
        record: &RecordRef,
        data: BTreeMap<String, String>,
    ) -> Result<VersionedRecord> {
        self.take_conflict(record)?;
        self.inner.create(record, data).await
    }

    async fn update(
        &self,
        record: &RecordRef,
        data: BTreeMap<String, String>,
        expected_version: u64,
    ) -> Result<VersionedRecord> {
        self.take_conflict(record)?;
        self.inner.update(record, data, expected_version).await
    }
}

fn identities(count: usize) -> Vec<ResourceIdentity> {
    (0..count)
        .map(|i| ResourceIdentity::new("default", format!("cluster-{i}")).unwrap())
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_marks_for_distinct_resources_keep_every_marker() {
    // GIVEN: one shared record and many resources reconciled in parallel
    let registry = IdempotencyRegistry::in_memory().with_conflict_retries(64);
    let ids = identities(16);

    // WHEN: every resource is marked concurrently
    let results = join_all(ids.iter().map(|id| {
        let registry = registry.clone();
        let id = id.clone();
        tokio::spawn(async move { registry.mark(&id).await })
    }))
    .await;

    // THEN: every mark succeeded and no marker was clobbered
    for result in results {
        assert!(result.unwrap().is_ok());
    }
    let entries = registry.entries().await.unwrap();
    assert_eq!(entries.len(), ids.len());
    for id in &ids {
        assert!(registry.exists(id).await.unwrap(), "lost marker for {id}");
    }
}

#[tokio::test]
async fn conflicting_write_is_retried_with_fresh_state() {
    let store = Arc::new(ContendedStore::new(2));
    let registry = IdempotencyRegistry::new(store.clone(), RecordRef::default());
    let id = ResourceIdentity::new("default", "c1").unwrap();

    registry.mark(&id).await.unwrap();

    assert!(registry.exists(&id).await.unwrap());
    assert_eq!(store.writes.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn conflict_is_surfaced_after_bounded_retries() {
    let store = Arc::new(ContendedStore::new(u32::MAX));
    let registry =
        IdempotencyRegistry::new(store.clone(), RecordRef::default()).with_conflict_retries(3);
    let id = ResourceIdentity::new("default", "c1").unwrap();

    let result = registry.mark(&id).await;

    assert!(matches!(result, Err(Error::StoreConflict { .. })));
    assert_eq!(store.writes.load(Ordering::SeqCst), 3);
    assert!(!registry.exists(&id).await.unwrap());
}

#[tokio::test]
async fn markers_survive_restart_with_sqlite_store() {
    let dir = tempdir().unwrap();
    let config = RegistryConfig::default().data_dir(dir.path());
    let id = ResourceIdentity::new("default", "c1").unwrap();

    {
        let registry = IdempotencyRegistry::from_config(&config).await.unwrap();
        registry.mark(&id).await.unwrap();
    }

    // Simulated process restart: fresh registry over the same directory
    let registry = IdempotencyRegistry::from_config(&config).await.unwrap();
    assert!(registry.exists(&id).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_marks_on_sqlite_store_keep_every_marker() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SqliteRecordStore::open(dir.path()).await.unwrap());
    let registry =
        IdempotencyRegistry::new(store, RecordRef::default()).with_conflict_retries(64);
    let ids = identities(8);

    let results = join_all(ids.iter().map(|id| {
        let registry = registry.clone();
        let id = id.clone();
        tokio::spawn(async move { registry.mark(&id).await })
    }))
    .await;

    for result in results {
        assert!(result.unwrap().is_ok());
    }
    assert_eq!(registry.entries().await.unwrap().len(), ids.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn registries_sharing_a_database_never_lose_acknowledged_marks() {
    // GIVEN: two independently opened stores on one data directory, as with
    // two provider processes
    let dir = tempdir().unwrap();
    let first = IdempotencyRegistry::new(
        Arc::new(SqliteRecordStore::open(dir.path()).await.unwrap()),
        RecordRef::default(),
    );
    let second = IdempotencyRegistry::new(
        Arc::new(SqliteRecordStore::open(dir.path()).await.unwrap()),
        RecordRef::default(),
    );
    let ids = identities(40);

    // WHEN: marks alternate between the two registries concurrently
    let handles = ids.iter().enumerate().map(|(i, id)| {
        let registry = if i % 2 == 0 { first.clone() } else { second.clone() };
        let id = id.clone();
        tokio::spawn(async move { registry.mark(&id).await.map(|()| id) })
    });
    let marked: Vec<ResourceIdentity> = join_all(handles)
        .await
        .into_iter()
        .filter_map(|joined| joined.unwrap().ok())
        .collect();

    // THEN: every mark that returned Ok is stored, and nothing else is
    assert!(!marked.is_empty());
    let entries = first.entries().await.unwrap();
    assert_eq!(entries.len(), marked.len());
    for id in &marked {
        assert!(entries.contains_key(&id.key()), "lost marker for {id}");
        assert!(second.exists(id).await.unwrap());
    }
}
