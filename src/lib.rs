#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # cdevents-provider
//!
//! Sends exactly one CDEvent per managed resource the first time it reports
//! `Ready=True`, and remembers that it did across restarts.
//!
//! This library wires the workspace crates together for the binary.

pub mod cli;
pub mod config;
pub mod error;
pub mod provider;

pub use cdp_delivery;
pub use cdp_events;
pub use cdp_reconciler;
pub use cdp_registry;

pub use config::ProviderConfig;
pub use error::{Error, Result};
pub use provider::{ObserveReport, Provider, load_resource};
