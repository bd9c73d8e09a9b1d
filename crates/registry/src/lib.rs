//! Durable idempotency registry.
//!
//! Records which resource identities have already had their creation event
//! delivered, so repeated reconcile invocations never notify twice.
//!
//! - **Record store**: a single shared record keyed by a well-known name,
//!   updated with compare-and-swap on a version token
//! - **Backends**: in-memory for tests, SQLite for durability across
//!   restarts and processes
//! - **Registry**: `exists` / `mark` over the shared record, retrying
//!   conflicting writes with fresh state

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod error;
pub mod registry;
pub mod sqlite_store;
pub mod store;

pub use error::{Error, Result};
pub use registry::{DEFAULT_DATA_DIR, IdempotencyRegistry, MARKER_VALUE, RegistryConfig};
pub use sqlite_store::{DATABASE_FILE, SqliteRecordStore};
pub use store::{
    DEFAULT_RECORD_NAME, DEFAULT_RECORD_NAMESPACE, InMemoryRecordStore, RecordRef, RecordStore,
    TracingRecordStore, VersionedRecord,
};
