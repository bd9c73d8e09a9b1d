//! Delivery client with bounded exponential backoff.

use std::sync::Arc;

use cdp_events::DomainEvent;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{DeliveryConfig, SinkTarget};
use crate::error::{Error, Result, TransportError};
use crate::retry::RetryPolicy;
use crate::transport::{HttpTransport, SinkTransport};

/// Reason recorded when the caller cancels before an acknowledgement.
pub const CANCELLED_REASON: &str = "delivery cancelled by caller";

/// Terminal outcome of a send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    /// The sink accepted the event.
    Acknowledged { attempts: u32 },
    /// The sink permanently refused the event. Not retried.
    Rejected {
        attempts: u32,
        status: Option<u16>,
        reason: String,
    },
    /// Retries exhausted, or the call was cancelled, without acknowledgement.
    Undelivered { attempts: u32, reason: String },
}

impl DeliveryResult {
    /// Number of transmission attempts made.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Acknowledged { attempts }
            | Self::Rejected { attempts, .. }
            | Self::Undelivered { attempts, .. } => *attempts,
        }
    }

    /// Only an acknowledged send permits marking the event as handled.
    #[must_use]
    pub const fn is_acknowledged(&self) -> bool {
        matches!(self, Self::Acknowledged { .. })
    }

    /// Convert to a Result, turning failures into delivery errors.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryRejected` or `DeliveryUndelivered`.
    pub fn into_result(self, event: &DomainEvent) -> Result<u32> {
        match self {
            Self::Acknowledged { attempts } => Ok(attempts),
            Self::Rejected { status, reason, .. } => Err(Error::DeliveryRejected {
                event_id: event.id().to_string(),
                status,
                reason,
            }),
            Self::Undelivered { attempts, reason } => Err(Error::DeliveryUndelivered {
                event_id: event.id().to_string(),
                attempts,
                reason,
            }),
        }
    }
}

/// Sends events to a sink, retrying transient failures.
///
/// Retries block the calling task; nothing is queued or spawned. The same
/// event value, and therefore the same id, is used for every attempt.
#[derive(Clone)]
pub struct DeliveryClient {
    transport: Arc<dyn SinkTransport>,
    policy: RetryPolicy,
}

impl DeliveryClient {
    /// Create a client over an explicit transport.
    #[must_use]
    pub fn new(transport: Arc<dyn SinkTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Create an HTTP client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the HTTP client cannot be built.
    pub fn from_config(config: &DeliveryConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.request_timeout)?;
        Ok(Self::new(Arc::new(transport), config.retry.clone()))
    }

    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send an event, retrying transient failures with backoff.
    ///
    /// Cancelling `cancel` aborts the pending backoff or in-flight attempt
    /// and yields `Undelivered`.
    pub async fn send(
        &self,
        event: &DomainEvent,
        target: &SinkTarget,
        cancel: &CancellationToken,
    ) -> DeliveryResult {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_reason = String::from("no attempt made");

        for attempt in 1..=max_attempts {
            let made = attempt.saturating_sub(1);

            let delay = self.policy.delay_before(attempt);
            if !delay.is_zero() {
                debug!(event_id = %event.id(), attempt, delay_ms = delay.as_millis(), "Backing off");
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return cancelled(event, made),
                    () = tokio::time::sleep(delay) => {}
                }
            }

            if cancel.is_cancelled() {
                return cancelled(event, made);
            }

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return cancelled(event, attempt),
                outcome = self.transport.transmit(event, target) => outcome,
            };

            match outcome {
                Ok(()) => {
                    info!(
                        event_id = %event.id(),
                        event_type = event.event_type(),
                        source = event.source(),
                        attempt,
                        "Event acknowledged by sink"
                    );
                    return DeliveryResult::Acknowledged { attempts: attempt };
                }
                Err(TransportError::Permanent { status, reason }) => {
                    warn!(
                        event_id = %event.id(),
                        attempt,
                        status = ?status,
                        reason = %reason,
                        "Event rejected by sink"
                    );
                    return DeliveryResult::Rejected {
                        attempts: attempt,
                        status,
                        reason,
                    };
                }
                Err(TransportError::Transient { reason }) => {
                    warn!(
                        event_id = %event.id(),
                        attempt,
                        remaining = max_attempts - attempt,
                        reason = %reason,
                        "Delivery attempt failed"
                    );
                    last_reason = reason;
                }
            }
        }

        warn!(event_id = %event.id(), attempts = max_attempts, "Event undelivered, retries exhausted");
        DeliveryResult::Undelivered {
            attempts: max_attempts,
            reason: last_reason,
        }
    }
}

fn cancelled(event: &DomainEvent, attempts: u32) -> DeliveryResult {
    warn!(event_id = %event.id(), attempts, "Delivery cancelled");
    DeliveryResult::Undelivered {
        attempts,
        reason: CANCELLED_REASON.to_string(),
    }
}

impl std::fmt::Debug for DeliveryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryClient")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::transport::RecordingTransport;
    use cdp_events::{EventFactory, ResourceIdentity, TransitionKind};

    fn event() -> DomainEvent {
        let identity = ResourceIdentity::new("default", "c1").unwrap();
        EventFactory::default()
            .build(TransitionKind::Created, &identity)
            .unwrap()
    }

    fn target() -> SinkTarget {
        SinkTarget::parse("http://sink.local/").unwrap()
    }

    fn client(transport: Arc<RecordingTransport>, attempts: u32) -> DeliveryClient {
        DeliveryClient::new(
            transport,
            RetryPolicy::new(attempts, Duration::from_millis(10)),
        )
    }

    #[tokio::test]
    async fn test_acknowledged_on_first_attempt() {
        let transport = Arc::new(RecordingTransport::acknowledging());
        let result = client(transport.clone(), 10)
            .send(&event(), &target(), &CancellationToken::new())
            .await;

        assert_eq!(result, DeliveryResult::Acknowledged { attempts: 1 });
        assert_eq!(transport.attempt_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_then_acknowledged() {
        let transport = Arc::new(RecordingTransport::scripted(vec![
            Err(TransportError::transient("connection reset")),
            Err(TransportError::transient("503")),
        ]));
        let result = client(transport.clone(), 10)
            .send(&event(), &target(), &CancellationToken::new())
            .await;

        assert_eq!(result, DeliveryResult::Acknowledged { attempts: 3 });
        assert_eq!(transport.attempt_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_attempt_reuses_event_id() {
        let transport = Arc::new(RecordingTransport::failing(TransportError::transient(
            "timeout",
        )));
        let sent = event();
        client(transport.clone(), 4)
            .send(&sent, &target(), &CancellationToken::new())
            .await;

        let attempts = transport.attempts();
        assert_eq!(attempts.len(), 4);
        assert!(attempts.iter().all(|e| e.id() == sent.id()));
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let transport = Arc::new(RecordingTransport::failing(TransportError::permanent(
            Some(400),
            "bad request",
        )));
        let result = client(transport.clone(), 10)
            .send(&event(), &target(), &CancellationToken::new())
            .await;

        assert!(matches!(
            result,
            DeliveryResult::Rejected {
                attempts: 1,
                status: Some(400),
                ..
            }
        ));
        assert_eq!(transport.attempt_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let transport = Arc::new(RecordingTransport::acknowledging());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = client(transport.clone(), 10)
            .send(&event(), &target(), &cancel)
            .await;

        assert_eq!(
            result,
            DeliveryResult::Undelivered {
                attempts: 0,
                reason: CANCELLED_REASON.to_string()
            }
        );
        assert_eq!(transport.attempt_count(), 0);
    }

    #[test]
    fn test_into_result_maps_failures() {
        let sent = event();

        assert_eq!(
            DeliveryResult::Acknowledged { attempts: 2 }.into_result(&sent),
            Ok(2)
        );

        let rejected = DeliveryResult::Rejected {
            attempts: 1,
            status: Some(400),
            reason: "bad".to_string(),
        }
        .into_result(&sent);
        assert!(matches!(rejected, Err(Error::DeliveryRejected { .. })));

        let undelivered = DeliveryResult::Undelivered {
            attempts: 10,
            reason: "timeout".to_string(),
        }
        .into_result(&sent);
        assert!(matches!(
            undelivered,
            Err(Error::DeliveryUndelivered { attempts: 10, .. })
        ));
    }
}
