use amqprs::{
    channel::{BasicAckArguments, BasicNackArguments, Channel, ConsumerMessage},
    connection::Connection,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use crate::RabbitMQError;

/// Manual-ack consumer of a single queue
///
/// Messages are pulled with `receive()`. Every received message must be
/// settled with either `ack()` or `nack()`; with a prefetch window of one the
/// broker will not push the next message until the current one is settled.
///
/// IMPORTANT: `close()` MUST be called for a graceful shutdown. Unsettled
/// messages are returned to the queue by the broker when the channel closes.
pub struct Subscription {
    queue_name: String,
    consumer_tag: String,
    consumer: UnboundedReceiver<ConsumerMessage>,
    channel: Channel,
    connection: Connection,
    owns_connection: bool,
}

impl Subscription {
    pub(crate) fn new(
        queue_name: &str,
        consumer_tag: String,
        consumer: UnboundedReceiver<ConsumerMessage>,
        connection: Connection,
        channel: Channel,
        owns_connection: bool,
    ) -> Self {
        Self {
            queue_name: queue_name.to_owned(),
            consumer_tag,
            consumer,
            channel,
            connection,
            owns_connection,
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn consumer_tag(&self) -> &str {
        &self.consumer_tag
    }

    /// Receives the next message
    ///
    /// # Returns
    /// The next message or None if the channel is closed
    pub async fn receive(&mut self) -> Option<ConsumerMessage> {
        self.consumer.recv().await
    }

    /// Acknowledges a message as processed
    ///
    /// # Errors
    /// Returns an error if the message lacks delivery information or if the acknowledgment fails
    pub async fn ack(&self, message: &ConsumerMessage) -> Result<(), RabbitMQError> {
        let deliver_info = message.deliver.as_ref().ok_or(RabbitMQError::NotDeliveryTag)?;
        self.ack_tag(deliver_info.delivery_tag()).await
    }

    /// Rejects a message, either back onto the queue or to the dead-letter route
    ///
    /// # Errors
    /// Returns an error if the message lacks delivery information or if the nack fails
    pub async fn nack(&self, message: &ConsumerMessage, requeue: bool) -> Result<(), RabbitMQError> {
        let deliver_info = message.deliver.as_ref().ok_or(RabbitMQError::NotDeliveryTag)?;
        self.nack_tag(deliver_info.delivery_tag(), requeue).await
    }

    pub async fn ack_tag(&self, delivery_tag: u64) -> Result<(), RabbitMQError> {
        self.channel
            .basic_ack(BasicAckArguments::new(delivery_tag, false))
            .await
            .map_err(|err| RabbitMQError::AckMessageError(err.to_string()))
    }

    pub async fn nack_tag(&self, delivery_tag: u64, requeue: bool) -> Result<(), RabbitMQError> {
        debug!(
            "nack delivery {} on {} (requeue: {})",
            delivery_tag, self.queue_name, requeue
        );
        self.channel
            .basic_nack(BasicNackArguments::new(delivery_tag, false, requeue))
            .await
            .map_err(|err| RabbitMQError::NackMessageError(err.to_string()))
    }

    /// Closes the channel, plus the connection when the subscription owns it
    ///
    /// # Errors
    /// Returns an error if closing fails
    pub async fn close(self) -> Result<(), RabbitMQError> {
        self.channel
            .close()
            .await
            .map_err(|err| RabbitMQError::CloseChannelError(err.to_string()))?;

        if self.owns_connection {
            self.connection
                .close()
                .await
                .map_err(|err| RabbitMQError::CloseChannelError(err.to_string()))?;
        }

        Ok(())
    }
}
