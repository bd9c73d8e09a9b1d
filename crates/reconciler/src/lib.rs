//! Observe-time notification for managed resources.
//!
//! The operator runtime calls `observe` on every reconcile. The first time a
//! resource reports `Ready=True`, one creation event is sent to the sink and
//! a marker is recorded; every later observe stays silent.
//!
//! # Flow
//!
//! 1. `TransitionDetector` checks readiness, then the idempotency registry
//! 2. `EventFactory` builds the event (once per notification, not per retry)
//! 3. `DeliveryClient` sends it with bounded backoff
//! 4. Only an acknowledged send is marked in the registry
//!
//! A failure at any step leaves the registry untouched and is returned to the
//! runtime, which requeues the resource.
//!
//! # Example
//!
//! ```ignore
//! use cdp_reconciler::{ExternalClient, ReconcileAdapterBuilder};
//! use tokio_util::sync::CancellationToken;
//!
//! let adapter = ReconcileAdapterBuilder::new()
//!     .with_registry(registry)
//!     .with_delivery(delivery)
//!     .with_target(target)
//!     .build()?;
//!
//! let observation = adapter.observe(&resource, &CancellationToken::new()).await?;
//! assert!(observation.resource_up_to_date);
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod adapter;
pub mod detector;
pub mod error;
pub mod types;

pub use adapter::{AdapterDeps, ExternalClient, ReconcileAdapter, ReconcileAdapterBuilder};
pub use detector::TransitionDetector;
pub use error::{Error, ObserveError, Result};
pub use types::{
    ConnectionDetails, Detection, ExternalCreation, ExternalObservation, ExternalUpdate,
    NotifyState,
};
