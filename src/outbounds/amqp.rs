//! Adapters from the domain ports to the `rabbitmq` crate.

use async_trait::async_trait;
use rabbitmq::{Message, PublisherContext, PublisherDispatcher, RabbitMQError, Subscription};
use tracing::warn;
use uuid::Uuid;

use crate::domain::ports::{Delivery, DeliverySource, MessageTransport, TransportError};

const JSON_CONTENT_TYPE: &str = "application/json";

/// Publishes event payloads on the topic exchange behind a `Publisher`.
///
/// Every message is persistent, typed as JSON and carries a fresh
/// `message_id` and `request_id`.
#[derive(Clone)]
pub struct AmqpTransport {
    dispatcher: PublisherDispatcher,
}

impl AmqpTransport {
    pub fn new(dispatcher: PublisherDispatcher) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl MessageTransport for AmqpTransport {
    async fn send(&self, routing_key: &str, body: Vec<u8>) -> Result<(), TransportError> {
        let message = Message::content(body)
            .with_topic(routing_key)
            .with_content_type(JSON_CONTENT_TYPE);
        let ctx = PublisherContext::new(
            &Uuid::new_v4().to_string(),
            Some(Uuid::new_v4().to_string()),
        );

        self.dispatcher
            .publish(message, ctx)
            .await
            .map_err(transport_error)
    }
}

/// Manual-ack deliveries of the notifications queue.
pub struct AmqpDeliverySource {
    subscription: Subscription,
}

impl AmqpDeliverySource {
    pub fn new(subscription: Subscription) -> Self {
        Self { subscription }
    }

    /// Closes the consuming channel, and the connection when the subscription owns it.
    pub async fn close(self) -> Result<(), RabbitMQError> {
        self.subscription.close().await
    }
}

#[async_trait]
impl DeliverySource for AmqpDeliverySource {
    async fn next_delivery(&mut self) -> Option<Delivery> {
        loop {
            let message = self.subscription.receive().await?;

            let Some(deliver) = message.deliver else {
                warn!(
                    "message without delivery frame on {}, skipping",
                    self.subscription.queue_name()
                );
                continue;
            };

            return Some(Delivery {
                delivery_tag: deliver.delivery_tag(),
                routing_key: deliver.routing_key().to_string(),
                body: message.content.unwrap_or_default(),
                redelivered: deliver.redelivered(),
            });
        }
    }

    async fn ack(&mut self, delivery_tag: u64) -> Result<(), TransportError> {
        self.subscription
            .ack_tag(delivery_tag)
            .await
            .map_err(transport_error)
    }

    async fn nack(&mut self, delivery_tag: u64, requeue: bool) -> Result<(), TransportError> {
        self.subscription
            .nack_tag(delivery_tag, requeue)
            .await
            .map_err(transport_error)
    }
}

fn transport_error(err: RabbitMQError) -> TransportError {
    TransportError(err.to_string())
}
