use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, error};

use crate::domain::{
    events::{LendingEvent, RoutingKey},
    ports::MessageTransport,
};

use super::{PublishError, PublishMetrics};

/// Default bound on a single transport send.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// +----------------------------------------------------------+
/// | STRUCTS | TRAITS | ENUMS | FUNCTIONS                     |
/// +----------+-------+-------+------------------------------+
/// | Structs:                                                 |
/// |   - EventPublisher                                       |
/// +----------------------------------------------------------+

/// Publishes events to the topic exchange behind a [`MessageTransport`].
///
/// Every call moves exactly one counter of its routing key: `published` on
/// success, `errors` on serialization, transport or timeout failure.
pub struct EventPublisher {
    transport: Arc<dyn MessageTransport>,
    metrics: Arc<PublishMetrics>,
    timeout: Duration,
}

impl EventPublisher {
    pub fn new(transport: Arc<dyn MessageTransport>, timeout: Duration) -> Self {
        Self {
            transport,
            metrics: Arc::new(PublishMetrics::new()),
            timeout,
        }
    }

    pub fn metrics(&self) -> Arc<PublishMetrics> {
        Arc::clone(&self.metrics)
    }

    pub async fn publish_event(&self, event: &LendingEvent) -> Result<(), PublishError> {
        self.publish(event.routing_key(), event).await
    }

    /// Serializes `payload` to JSON and sends it under `routing_key`.
    ///
    /// # Errors
    /// * `PublishError::Serialization` - the payload is not representable as JSON
    /// * `PublishError::Transport` - the transport refused the message
    /// * `PublishError::Timeout` - the transport did not answer within the bound
    pub async fn publish<P>(&self, routing_key: RoutingKey, payload: &P) -> Result<(), PublishError>
    where
        P: Serialize + ?Sized,
    {
        let key = routing_key.as_str();
        let result = self.try_publish(key, payload).await;

        match &result {
            Ok(()) => self.metrics.record_published(key),
            Err(err) => {
                self.metrics.record_error(key);
                error!("Error publishing event: {}", err);
            }
        }

        result
    }

    async fn try_publish<P>(&self, routing_key: &'static str, payload: &P) -> Result<(), PublishError>
    where
        P: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(payload).map_err(|source| PublishError::Serialization {
            routing_key,
            source,
        })?;
        let size = body.len();

        timeout(self.timeout, self.transport.send(routing_key, body))
            .await
            .map_err(|_| PublishError::Timeout {
                routing_key,
                after: self.timeout,
            })?
            .map_err(|source| PublishError::Transport {
                routing_key,
                source,
            })?;

        debug!("published {} ({} bytes)", routing_key, size);
        Ok(())
    }
}
