//! Sink transports.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use cdp_events::DomainEvent;
use reqwest::StatusCode;
use tracing::debug;

use crate::config::SinkTarget;
use crate::error::{Error, Result, TransportError};

/// CloudEvents HTTP binary-mode header names.
pub mod headers {
    pub const SPEC_VERSION: &str = "ce-specversion";
    pub const ID: &str = "ce-id";
    pub const SOURCE: &str = "ce-source";
    pub const TYPE: &str = "ce-type";
    pub const TIME: &str = "ce-time";
}

/// Trait for transmitting one event to a sink, once.
///
/// Implementations classify failures; retrying is the delivery client's job.
#[async_trait]
pub trait SinkTransport: Send + Sync {
    /// Transmit the event. `Ok` means the sink acknowledged it.
    async fn transmit(
        &self,
        event: &DomainEvent,
        target: &SinkTarget,
    ) -> std::result::Result<(), TransportError>;
}

/// Map an HTTP response status to an acknowledgement or failure class.
#[must_use]
pub fn classify_status(status: StatusCode) -> Option<TransportError> {
    if status.is_success() {
        return None;
    }

    let code = status.as_u16();
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        return Some(TransportError::transient(format!("sink returned {status}")));
    }

    Some(TransportError::permanent(
        Some(code),
        format!("sink returned {status}"),
    ))
}

/// Sends events over HTTP in CloudEvents binary content mode.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport whose attempts time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl SinkTransport for HttpTransport {
    async fn transmit(
        &self,
        event: &DomainEvent,
        target: &SinkTarget,
    ) -> std::result::Result<(), TransportError> {
        let body = serde_json::to_vec(event.data())
            .map_err(|e| TransportError::permanent(None, format!("unencodable payload: {e}")))?;

        let response = self
            .http_client
            .post(target.as_url().clone())
            .header(headers::SPEC_VERSION, event.spec_version())
            .header(headers::ID, event.id().to_string())
            .header(headers::SOURCE, event.source())
            .header(headers::TYPE, event.event_type())
            .header(headers::TIME, event.time_rfc3339())
            .header(reqwest::header::CONTENT_TYPE, event.data_content_type())
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    TransportError::permanent(None, format!("invalid request: {e}"))
                } else {
                    TransportError::transient(format!("send failed: {e}"))
                }
            })?;

        let status = response.status();
        debug!(event_id = %event.id(), status = %status, "Sink responded");

        classify_status(status).map_or(Ok(()), Err)
    }
}

/// Transport that records every transmission and replays scripted outcomes.
///
/// Once the script is exhausted every attempt is acknowledged.
#[derive(Default)]
pub struct RecordingTransport {
    script: Mutex<VecDeque<std::result::Result<(), TransportError>>>,
    fallback: Option<TransportError>,
    sent: Mutex<Vec<DomainEvent>>,
}

impl RecordingTransport {
    /// Acknowledge every attempt.
    #[must_use]
    pub fn acknowledging() -> Self {
        Self::default()
    }

    /// Fail every attempt with the given error.
    #[must_use]
    pub fn failing(error: TransportError) -> Self {
        Self {
            fallback: Some(error),
            ..Self::default()
        }
    }

    /// Replay `outcomes` in order, then acknowledge.
    #[must_use]
    pub fn scripted(outcomes: Vec<std::result::Result<(), TransportError>>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            ..Self::default()
        }
    }

    /// Every event passed to `transmit`, one entry per attempt.
    #[must_use]
    pub fn attempts(&self) -> Vec<DomainEvent> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Number of transmission attempts.
    #[must_use]
    pub fn attempt_count(&self) -> usize {
        self.sent.lock().map(|sent| sent.len()).unwrap_or_default()
    }
}

#[async_trait]
impl SinkTransport for RecordingTransport {
    async fn transmit(
        &self,
        event: &DomainEvent,
        _target: &SinkTarget,
    ) -> std::result::Result<(), TransportError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(event.clone());
        }

        let scripted = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front());

        match (scripted, &self.fallback) {
            (Some(outcome), _) => outcome,
            (None, Some(error)) => Err(error.clone()),
            (None, None) => Ok(()),
        }
    }
}
