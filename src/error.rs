//! Error types for the provider binary.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Provider errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The config file could not be read.
    #[error("failed to read config {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML/JSON for `ProviderConfig`.
    #[error("failed to parse config {}: {reason}", .path.display())]
    ConfigParse { path: PathBuf, reason: String },

    /// An environment override could not be parsed.
    #[error("invalid value for {var}: {reason}")]
    InvalidEnv { var: String, reason: String },

    /// The merged configuration is unusable.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A resource document could not be read.
    #[error("failed to read resource {}: {source}", .path.display())]
    ResourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A resource document is malformed.
    #[error("invalid resource document {}: {reason}", .path.display())]
    ResourceParse { path: PathBuf, reason: String },

    #[error(transparent)]
    Registry(#[from] cdp_registry::Error),

    #[error(transparent)]
    Delivery(#[from] cdp_delivery::Error),
}

impl Error {
    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid environment override error.
    pub fn invalid_env(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEnv {
            var: var.into(),
            reason: reason.into(),
        }
    }
}
