//! Resource identity, transition kinds and domain event construction.
//!
//! - **Identity**: `ResourceIdentity` keys both the idempotency registry and
//!   the event source (`"<namespace>/<name>"`)
//! - **Status**: `ObservedStatus` carries the conditions reported by the
//!   operator runtime; only `Ready` is consumed
//! - **Events**: `EventFactory` turns a `TransitionKind` into a `DomainEvent`
//!   using an explicit `EventTypeMap`
//!
//! # Example
//!
//! ```ignore
//! use cdp_events::{EventFactory, ResourceIdentity, TransitionKind};
//!
//! let identity = ResourceIdentity::new("default", "c1")?;
//! let event = EventFactory::default().build(TransitionKind::Created, &identity)?;
//! assert_eq!(event.source(), "default/c1");
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod error;
pub mod event;
pub mod factory;
pub mod types;

pub use error::{Error, Result};
pub use event::{DomainEvent, EventPayload, JSON_CONTENT_TYPE, SPEC_VERSION};
pub use factory::EventFactory;
pub use types::{
    Condition, ConditionStatus, ENVIRONMENT_CREATED_V1, ENVIRONMENT_MODIFIED_V1, EventId,
    EventTypeMap, ManagedResource, ObservedStatus, READY_CONDITION, ResourceIdentity,
    TransitionKind,
};
