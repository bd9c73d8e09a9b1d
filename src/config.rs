//! Provider configuration: file, environment overrides, validation.

use std::path::Path;

use cdp_delivery::{DeliveryConfig, SinkTarget};
use cdp_events::EventPayload;
use cdp_registry::RegistryConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Overrides `delivery.sink_url`.
pub const ENV_SINK_URL: &str = "CDP_SINK_URL";
/// Overrides `registry.data_dir`.
pub const ENV_REGISTRY_DIR: &str = "CDP_REGISTRY_DIR";
/// Overrides `registry.ephemeral`.
pub const ENV_REGISTRY_EPHEMERAL: &str = "CDP_REGISTRY_EPHEMERAL";
/// Overrides `notify_modified`.
pub const ENV_NOTIFY_MODIFIED: &str = "CDP_NOTIFY_MODIFIED";
/// Overrides `delivery.retry.max_attempts`.
pub const ENV_MAX_ATTEMPTS: &str = "CDP_MAX_ATTEMPTS";

/// Top-level configuration.
///
/// ```toml
/// notify_modified = false
///
/// [delivery]
/// sink_url = "http://broker-ingress.knative-eventing.svc.cluster.local/default/default"
/// request_timeout_ms = 5000
///
/// [delivery.retry]
/// max_attempts = 10
/// initial_delay_ms = 10
///
/// [registry]
/// namespace = "crossplane-system"
/// name = "cdevents-provider-status-list"
/// data_dir = "/var/lib/cdevents-provider"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub delivery: DeliveryConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    /// Informational fields carried in every event's data.
    #[serde(default)]
    pub payload: EventPayload,

    /// Also deliver modification events. Off by default.
    #[serde(default)]
    pub notify_modified: bool,
}

impl ProviderConfig {
    /// Load configuration from a file.
    ///
    /// `.json` files are parsed as JSON, everything else as TOML.
    ///
    /// # Errors
    ///
    /// Returns `ConfigRead` or `ConfigParse`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        let parsed = if path.extension().is_some_and(|e| e == "json") {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        } else {
            toml::from_str(&content).map_err(|e| e.to_string())
        };

        parsed.map_err(|reason| Error::ConfigParse {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Load from an optional file, then apply process environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or an override is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.with_env_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an environment lookup.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEnv` if a value cannot be parsed.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_SINK_URL) {
            self.delivery.sink_url = url;
        }

        if let Some(dir) = lookup(ENV_REGISTRY_DIR) {
            if dir.trim().is_empty() {
                return Err(Error::invalid_env(ENV_REGISTRY_DIR, "must not be empty"));
            }
            self.registry.data_dir = dir.into();
        }

        if let Some(raw) = lookup(ENV_REGISTRY_EPHEMERAL) {
            self.registry.ephemeral = parse_bool(&raw).ok_or_else(|| {
                Error::invalid_env(ENV_REGISTRY_EPHEMERAL, format!("'{raw}' is not a boolean"))
            })?;
        }

        if let Some(raw) = lookup(ENV_NOTIFY_MODIFIED) {
            self.notify_modified = parse_bool(&raw)
                .ok_or_else(|| Error::invalid_env(ENV_NOTIFY_MODIFIED, format!("'{raw}' is not a boolean")))?;
        }

        if let Some(raw) = lookup(ENV_MAX_ATTEMPTS) {
            self.delivery.retry.max_attempts = raw
                .trim()
                .parse()
                .map_err(|e| Error::invalid_env(ENV_MAX_ATTEMPTS, format!("'{raw}': {e}")))?;
        }

        Ok(self)
    }

    /// Check the configuration and resolve the sink target.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` on a missing or malformed sink, a zero attempt
    /// cap, an empty registry record name, or a durable registry without a
    /// data directory.
    pub fn validate(&self) -> Result<SinkTarget> {
        if self.registry.namespace.trim().is_empty() || self.registry.name.trim().is_empty() {
            return Err(Error::invalid_config(
                "registry.namespace and registry.name must not be empty",
            ));
        }

        if !self.registry.ephemeral && self.registry.data_dir.as_os_str().is_empty() {
            return Err(Error::invalid_config(
                "registry.data_dir must be set unless registry.ephemeral is true",
            ));
        }

        self.delivery
            .validate()
            .map_err(|e| Error::invalid_config(e.to_string()))
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;
    use std::path::PathBuf;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults_validate() {
        let config = ProviderConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.notify_modified);
        assert_eq!(config.registry.namespace, "crossplane-system");
        assert_eq!(config.payload.git_source_name, "cluster-git");
    }

    #[test]
    fn test_default_registry_is_durable() {
        let config = ProviderConfig::default();
        assert!(!config.registry.ephemeral);
        assert_eq!(
            config.registry.data_dir,
            PathBuf::from("/var/lib/cdevents-provider")
        );
    }

    #[test]
    fn test_empty_data_dir_requires_ephemeral() {
        let mut config = ProviderConfig::default();
        config.registry.data_dir = PathBuf::new();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig { .. })));

        config.registry.ephemeral = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
notify_modified = true

[delivery]
sink_url = "https://sink.example.com/events"

[delivery.retry]
max_attempts = 3
initial_delay_ms = 100

[registry]
data_dir = "/tmp/markers"

[payload]
docker_repo = "example"
"#
        )
        .unwrap();

        let config = ProviderConfig::from_file(file.path()).unwrap();
        assert!(config.notify_modified);
        assert_eq!(config.delivery.retry.max_attempts, 3);
        assert_eq!(config.registry.data_dir, PathBuf::from("/tmp/markers"));
        assert_eq!(config.payload.docker_repo, "example");
        assert_eq!(config.payload.path, "workspace/source/config/");
    }

    #[test]
    fn test_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"delivery": {{"sink_url": "http://sink.local/"}}}}"#).unwrap();

        let config = ProviderConfig::from_file(file.path()).unwrap();
        assert_eq!(config.delivery.sink_url, "http://sink.local/");
    }

    #[test]
    fn test_unparseable_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(file, "delivery = [").unwrap();

        assert!(matches!(
            ProviderConfig::from_file(file.path()),
            Err(Error::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ProviderConfig::from_file(Path::new("/nonexistent/cdp.toml")),
            Err(Error::ConfigRead { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let config = ProviderConfig::default()
            .with_env_overrides(env(&[
                (ENV_SINK_URL, "http://override.local/"),
                (ENV_REGISTRY_DIR, "/data"),
                (ENV_REGISTRY_EPHEMERAL, "true"),
                (ENV_NOTIFY_MODIFIED, "yes"),
                (ENV_MAX_ATTEMPTS, "4"),
            ]))
            .unwrap();

        assert_eq!(config.delivery.sink_url, "http://override.local/");
        assert_eq!(config.registry.data_dir, PathBuf::from("/data"));
        assert!(config.registry.ephemeral);
        assert!(config.notify_modified);
        assert_eq!(config.delivery.retry.max_attempts, 4);
    }

    #[test]
    fn test_invalid_env_override() {
        let result = ProviderConfig::default().with_env_overrides(env(&[(ENV_MAX_ATTEMPTS, "many")]));
        assert!(matches!(result, Err(Error::InvalidEnv { .. })));

        let result =
            ProviderConfig::default().with_env_overrides(env(&[(ENV_NOTIFY_MODIFIED, "maybe")]));
        assert!(matches!(result, Err(Error::InvalidEnv { .. })));

        let result = ProviderConfig::default().with_env_overrides(env(&[(ENV_REGISTRY_DIR, " ")]));
        assert!(matches!(result, Err(Error::InvalidEnv { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_sink_and_zero_attempts() {
        let config = ProviderConfig::default()
            .with_env_overrides(env(&[(ENV_SINK_URL, "")]))
            .unwrap();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig { .. })));

        let config = ProviderConfig::default()
            .with_env_overrides(env(&[(ENV_MAX_ATTEMPTS, "0")]))
            .unwrap();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig { .. })));
    }
}
