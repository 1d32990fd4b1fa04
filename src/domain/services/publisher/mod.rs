//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Serializes domain events and hands them to the message transport under their routing key,
// with a bounded timeout and per-routing-key success/error counters.
//--------------------------------------------------------------------------------------------------

pub mod event_publisher;
pub mod metrics;

use std::time::Duration;

use thiserror::Error;

use crate::domain::ports::TransportError;

pub use event_publisher::EventPublisher;
pub use metrics::{PublishCounters, PublishMetrics};

/// Errors surfaced by a single publish call. The publisher never retries.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to serialize {routing_key} payload: {source}")]
    Serialization {
        routing_key: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to publish {routing_key}: {source}")]
    Transport {
        routing_key: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("publishing {routing_key} timed out after {after:?}")]
    Timeout {
        routing_key: &'static str,
        after: Duration,
    },
}

impl PublishError {
    pub fn routing_key(&self) -> &'static str {
        match self {
            Self::Serialization { routing_key, .. }
            | Self::Transport { routing_key, .. }
            | Self::Timeout { routing_key, .. } => routing_key,
        }
    }
}
