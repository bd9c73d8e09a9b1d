//! CloudEvents delivery to an HTTP sink.
//!
//! - **Transport**: `SinkTransport` sends one event once and classifies the
//!   outcome as acknowledged, transient or permanent
//! - **Retry**: `RetryPolicy` is a bounded, deterministic exponential backoff
//! - **Client**: `DeliveryClient::send` drives the retries, honours caller
//!   cancellation and returns a terminal `DeliveryResult`
//!
//! Events go out in CloudEvents HTTP binary content mode: attributes as
//! `ce-*` headers, the payload as the JSON body.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod client;
pub mod config;
pub mod error;
pub mod retry;
pub mod transport;

pub use client::{CANCELLED_REASON, DeliveryClient, DeliveryResult};
pub use config::{DEFAULT_SINK_URL, DeliveryConfig, SinkTarget};
pub use error::{Error, Result, TransportError};
pub use retry::{DEFAULT_INITIAL_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY, RetryPolicy};
pub use transport::{HttpTransport, RecordingTransport, SinkTransport, classify_status, headers};
