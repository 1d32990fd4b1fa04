/// Error types for RabbitMQ operations
#[derive(Debug, thiserror::Error)]
pub enum RabbitMQError {
    /// Error in the provided URI
    #[error("Provided URI Error: {0}")]
    UriError(String),
    /// Error establishing connection
    #[error("Connection error: {0}")]
    ConnectionError(String),
    /// Error opening a channel
    #[error("Error while opening a rabbitmq channel: {0}")]
    OpenChannelError(String),
    /// Error declaring a queue
    #[error("Error while declaring a queue: {0}")]
    QueueDeclarationError(String),
    /// Error declaring an exchange
    #[error("Error while declaring a exchange: {0}")]
    ExchangeDeclarationError(String),
    /// Error binding a queue to an exchange
    #[error("Error while binding a queue to exchange: {0}")]
    QueueBindingError(String),
    /// A queue argument could not be encoded as an AMQP field
    #[error("Invalid queue argument {name}: {reason}")]
    InvalidArgument { name: String, reason: String },
    /// Error while setting the channel prefetch window
    #[error("Error while setting qos: {0}")]
    QosError(String),
    /// Error starting to consume from a subscription
    #[error("Error while starting to consume from a subscription: {0}")]
    SubscriptionError(String),
    /// Error closing a channel
    #[error("Error while closing a channel: {0}")]
    CloseChannelError(String),
    /// The background publishing task is gone
    #[error("Error while publishing a message - channel was dropped or closed")]
    PublishError,
    /// The broker rejected the publish
    #[error("Broker refused the message: {0}")]
    BasicPublishError(String),
    /// Error while acknowledging a message failed
    #[error("Error while acknowledging a message: {0}")]
    AckMessageError(String),
    /// Error while negatively acknowledging a message
    #[error("Error while rejecting a message: {0}")]
    NackMessageError(String),
    /// Message does not contain delivery tag
    #[error("Unexpected error: message does not contain delivery tag")]
    NotDeliveryTag,
    /// Missing topic when publishing to a topic exchange
    ///
    /// Use `Message::with_topic()` to add a routing key to the message.
    #[error("Topic Publisher MUST have a topic")]
    MissingTopic,
}
