//! Configuration for the delivery client.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// In-cluster Knative broker used when no sink is configured.
pub const DEFAULT_SINK_URL: &str =
    "http://broker-ingress.knative-eventing.svc.cluster.local/default/default";

/// A validated sink endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkTarget(Url);

impl SinkTarget {
    /// Parse and validate a sink URL.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the URL is empty, malformed, or not
    /// http/https.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::configuration("sink target is missing"));
        }

        let url = Url::parse(raw)
            .map_err(|e| Error::configuration(format!("invalid sink target '{raw}': {e}")))?;

        match url.scheme() {
            "http" | "https" => Ok(Self(url)),
            other => Err(Error::configuration(format!(
                "unsupported sink scheme '{other}', expected http or https"
            ))),
        }
    }

    #[must_use]
    pub const fn as_url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for SinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration for event delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Sink endpoint receiving the events.
    #[serde(default = "default_sink_url")]
    pub sink_url: String,

    /// Timeout for a single HTTP attempt.
    #[serde(
        rename = "request_timeout_ms",
        with = "duration_ms",
        default = "default_request_timeout"
    )]
    pub request_timeout: Duration,

    /// Backoff for transient failures.
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            sink_url: default_sink_url(),
            request_timeout: default_request_timeout(),
            retry: RetryPolicy::default(),
        }
    }
}

impl DeliveryConfig {
    /// Create a config pointing at the given sink.
    pub fn with_sink(sink_url: impl Into<String>) -> Self {
        Self {
            sink_url: sink_url.into(),
            ..Default::default()
        }
    }

    /// Set the retry policy.
    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the per-attempt timeout.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Validate the config and resolve the sink target.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` on a bad sink URL or a zero attempt cap.
    pub fn validate(&self) -> Result<SinkTarget> {
        if self.retry.max_attempts == 0 {
            return Err(Error::configuration("retry.max_attempts must be at least 1"));
        }
        SinkTarget::parse(&self.sink_url)
    }
}

fn default_sink_url() -> String {
    DEFAULT_SINK_URL.to_string()
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Serialization helper for Duration as milliseconds.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
