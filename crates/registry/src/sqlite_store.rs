//! Durable record store on SQLite.
//!
//! Every record is one row of `records`, keyed by namespace and name, with
//! its version token alongside the JSON data. Conditional writes are
//! checked by SQLite itself, so the compare-and-swap holds for every
//! connection to the database file, including other processes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{Connection, ErrorCode, OptionalExtension, TransactionBehavior, params};
use tracing::debug;

use crate::error::{Error, Result};
use crate::store::{RecordRef, RecordStore, VersionedRecord};

/// File name of the database inside the data directory.
pub const DATABASE_FILE: &str = "registry.db";

/// How long a write waits for another connection's lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed record store that survives process restarts.
pub struct SqliteRecordStore {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Open (or create) the database under `dir`.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the directory or database cannot be
    /// opened, or the schema cannot be created.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let path = dir.join(DATABASE_FILE);
        let db_path = path.clone();

        let conn = tokio::task::spawn_blocking(move || open_connection(&dir, &db_path))
            .await
            .map_err(|e| Error::store_unavailable("open", e.to_string()))??;

        debug!(path = %path.display(), "Opened SQLite record store");

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Location of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a blocking closure against the connection off the async runtime.
    async fn with_conn<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| Error::store_unavailable(operation, format!("lock error: {e}")))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| Error::store_unavailable(operation, e.to_string()))?
    }
}

fn open_connection(dir: &Path, path: &Path) -> Result<Connection> {
    std::fs::create_dir_all(dir)
        .map_err(|e| Error::store_unavailable("open", format!("{}: {e}", dir.display())))?;

    let conn = Connection::open(path).map_err(|e| unavailable("open", &e))?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(|e| unavailable("open", &e))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS records (
            namespace TEXT NOT NULL,
            name TEXT NOT NULL,
            version INTEGER NOT NULL,
            data TEXT NOT NULL,
            PRIMARY KEY (namespace, name)
        )",
        [],
    )
    .map_err(|e| unavailable("open", &e))?;

    Ok(conn)
}

fn unavailable(operation: &str, err: &rusqlite::Error) -> Error {
    Error::store_unavailable(operation, err.to_string())
}

fn stored_version(
    conn: &Connection,
    record: &RecordRef,
    operation: &str,
) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT version FROM records WHERE namespace = ?1 AND name = ?2",
        params![record.namespace, record.name],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| unavailable(operation, &e))
}

fn decode(version: i64, data: &str) -> Result<VersionedRecord> {
    let version = u64::try_from(version)
        .map_err(|_| Error::serialization(format!("negative record version {version}")))?;
    Ok(VersionedRecord {
        data: serde_json::from_str(data)?,
        version,
    })
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn get(&self, record: &RecordRef) -> Result<Option<VersionedRecord>> {
        let record = record.clone();
        self.with_conn("get", move |conn| {
            let row = conn
                .query_row(
                    "SELECT version, data FROM records WHERE namespace = ?1 AND name = ?2",
                    params![record.namespace, record.name],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()
                .map_err(|e| unavailable("get", &e))?;

            row.map(|(version, data)| decode(version, &data)).transpose()
        })
        .await
    }

    async fn create(
        &self,
        record: &RecordRef,
        data: BTreeMap<String, String>,
    ) -> Result<VersionedRecord> {
        let record = record.clone();
        let json = serde_json::to_string(&data)?;

        self.with_conn("create", move |conn| {
            let inserted = conn.execute(
                "INSERT INTO records (namespace, name, version, data) VALUES (?1, ?2, 1, ?3)",
                params![record.namespace, record.name, json],
            );

            match inserted {
                Ok(_) => Ok(VersionedRecord { data, version: 1 }),
                Err(e) if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
                    Err(Error::store_conflict(record.to_string(), "already exists"))
                }
                Err(e) => Err(unavailable("create", &e)),
            }
        })
        .await
    }

    async fn update(
        &self,
        record: &RecordRef,
        data: BTreeMap<String, String>,
        expected_version: u64,
    ) -> Result<VersionedRecord> {
        let record = record.clone();
        let json = serde_json::to_string(&data)?;
        let expected = i64::try_from(expected_version).map_err(|_| {
            Error::store_conflict(
                record.to_string(),
                format!("version {expected_version} out of range"),
            )
        })?;

        self.with_conn("update", move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| unavailable("update", &e))?;

            let changed = tx
                .execute(
                    "UPDATE records SET data = ?1, version = version + 1
                     WHERE namespace = ?2 AND name = ?3 AND version = ?4",
                    params![json, record.namespace, record.name, expected],
                )
                .map_err(|e| unavailable("update", &e))?;

            if changed == 0 {
                let reason = match stored_version(&tx, &record, "update")? {
                    Some(found) => format!("expected version {expected_version}, found {found}"),
                    None => "record was deleted".to_string(),
                };
                return Err(Error::store_conflict(record.to_string(), reason));
            }

            tx.commit().map_err(|e| unavailable("update", &e))?;

            Ok(VersionedRecord {
                data,
                version: expected_version.saturating_add(1),
            })
        })
        .await
    }
}
