use amqprs::{
    BasicProperties, FieldTable, ShortStr,
    channel::{BasicPublishArguments, Channel},
    connection::Connection,
};
use tokio::{
    select,
    sync::{
        mpsc::{UnboundedSender, unbounded_channel},
        oneshot,
    },
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::RabbitMQError;

/// Unit of work handed to the channel task, with the slot its outcome is reported to
struct PublishRequest {
    content: Vec<u8>,
    props: BasicProperties,
    args: BasicPublishArguments,
    reply: oneshot::Sender<Result<(), RabbitMQError>>,
}

/// Publisher to a durable topic exchange
///
/// ## Architecture
///
/// A background tokio task owns the publishing side of the AMQP channel and
/// drains an mpsc queue of requests. Each request carries a oneshot sender so
/// `publish()` resolves with the broker outcome of that particular message.
/// A CancellationToken stops the task on `close()`.
///
/// ## Cleanup
///
/// IMPORTANT: `close()` MUST be called for a graceful shutdown. Dropping the
/// Publisher leaves the background task running until the runtime stops.
pub struct Publisher {
    exchange: String,
    channel: Channel,
    connection: Connection,
    owns_connection: bool,
    dispatcher: PublisherDispatcher,
    handler: (JoinHandle<()>, CancellationToken),
}

impl Publisher {
    pub(crate) fn new(
        exchange: &str,
        app_id: &str,
        connection: Connection,
        channel: Channel,
        owns_connection: bool,
    ) -> Self {
        let (tx, mut rx) = unbounded_channel::<PublishRequest>();

        let task_channel = channel.clone();
        let task_exchange = exchange.to_owned();
        let cancel_token = CancellationToken::new();
        let cloned_token = cancel_token.clone();

        let handler = tokio::spawn(async move {
            loop {
                select! {
                    _ = cloned_token.cancelled() => {
                        debug!("publisher to {} was closed", task_exchange);
                        return
                    },
                    request = rx.recv() => {
                        let Some(request) = request else {
                            debug!("all dispatchers for {} dropped", task_exchange);
                            return
                        };

                        let result = task_channel
                            .basic_publish(request.props, request.content, request.args)
                            .await
                            .map_err(|err| RabbitMQError::BasicPublishError(err.to_string()));

                        if let Err(err) = &result {
                            error!("error while publishing to {}: {}", task_exchange, err);
                        }

                        // The caller may have given up waiting
                        let _ = request.reply.send(result);
                    }
                }
            }
        });

        let msg_common_props = BasicProperties::default()
            .with_app_id(app_id)
            .with_delivery_mode(2)
            .finish();

        Self {
            exchange: exchange.to_owned(),
            channel,
            connection,
            owns_connection,
            dispatcher: PublisherDispatcher {
                sender: tx,
                pub_args: BasicPublishArguments::new(exchange, ""),
                msg_common_props,
            },
            handler: (handler, cancel_token),
        }
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Publishes a message and waits for the channel to accept it
    ///
    /// # Errors
    /// Returns `RabbitMQError::MissingTopic` if the message has no routing key,
    /// `RabbitMQError::PublishError` if the background task is gone and
    /// `RabbitMQError::BasicPublishError` if the broker side failed
    pub async fn publish(&self, message: Message, ctx: PublisherContext) -> Result<(), RabbitMQError> {
        self.dispatcher.publish(message, ctx).await
    }

    /// Returns a cloneable handle publishing through the same background task
    ///
    /// Dispatchers stop working once the Publisher is closed.
    pub fn get_dispatcher(&self) -> PublisherDispatcher {
        self.dispatcher.clone()
    }

    /// Stops the background task and closes the channel, plus the connection
    /// when the publisher was built on its own
    ///
    /// # Errors
    /// Returns an error if closing the channel fails
    pub async fn close(self) -> Result<(), RabbitMQError> {
        self.handler.1.cancel();
        if let Err(err) = self.handler.0.await {
            error!("publisher task for {} ended abnormally: {}", self.exchange, err);
        }

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

/// Lightweight cloneable handle to a [`Publisher`], shareable between tasks
#[derive(Debug, Clone)]
pub struct PublisherDispatcher {
    sender: UnboundedSender<PublishRequest>,
    pub_args: BasicPublishArguments,
    msg_common_props: BasicProperties,
}

impl PublisherDispatcher {
    /// Same contract as [`Publisher::publish`]
    pub async fn publish(&self, message: Message, ctx: PublisherContext) -> Result<(), RabbitMQError> {
        let args = build_publish_arguments(&self.pub_args, message.topic)?;
        let mut props = ctx.into_basic_props(&self.msg_common_props)?;
        if let Some(content_type) = &message.content_type {
            props.with_content_type(content_type);
        }

        let (reply, outcome) = oneshot::channel();
        self.sender
            .send(PublishRequest {
                content: message.content,
                props,
                args,
                reply,
            })
            .map_err(|_| RabbitMQError::PublishError)?;

        outcome.await.map_err(|_| RabbitMQError::PublishError)?
    }
}

/// Sets the routing key on the exchange-level publish arguments
///
/// # Errors
/// Returns `RabbitMQError::MissingTopic` if no topic is provided
fn build_publish_arguments(
    publisher_arguments: &BasicPublishArguments,
    topic: Option<String>,
) -> Result<BasicPublishArguments, RabbitMQError> {
    let topic = topic.ok_or(RabbitMQError::MissingTopic)?;
    Ok(publisher_arguments.clone().routing_key(topic).finish())
}

/// Message to be published to RabbitMQ
///
/// The routing key must be set with `with_topic()` before publishing.
#[derive(Debug, Clone)]
pub struct Message {
    content: Vec<u8>,
    topic: Option<String>,
    content_type: Option<String>,
}

impl<T: AsRef<[u8]>> From<T> for Message {
    fn from(value: T) -> Self {
        Message::content(value.as_ref().to_vec())
    }
}

impl Message {
    pub fn content(content: Vec<u8>) -> Self {
        Self {
            content,
            topic: None,
            content_type: None,
        }
    }

    /// Adds the routing key (topic) of the message
    pub fn with_topic(self, topic: &str) -> Self {
        Self {
            topic: Some(topic.to_owned()),
            ..self
        }
    }

    pub fn with_content_type(self, content_type: &str) -> Self {
        Self {
            content_type: Some(content_type.to_owned()),
            ..self
        }
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }
}

/// Per-message metadata used for tracing and correlation
pub struct PublisherContext {
    request_id: String,
    message_id: Option<String>,
}

impl PublisherContext {
    /// # Arguments
    /// * `req_id` - Request identifier, sent as the `request_id` header
    /// * `message_id` - Optional unique message identifier
    pub fn new(req_id: &str, message_id: Option<String>) -> Self {
        Self {
            request_id: req_id.to_owned(),
            message_id,
        }
    }

    fn into_basic_props(
        self,
        current_basic_props: &BasicProperties,
    ) -> Result<BasicProperties, RabbitMQError> {
        let mut new_basic_props = current_basic_props.clone();
        if let Some(msg_id) = self.message_id {
            new_basic_props.with_message_id(&msg_id);
        }

        let header = ShortStr::try_from("request_id").map_err(|err| {
            RabbitMQError::InvalidArgument {
                name: "request_id".to_owned(),
                reason: err.to_string(),
            }
        })?;
        let mut headers = FieldTable::new();
        headers.insert(header, self.request_id.into());
        new_basic_props.with_headers(headers);

        Ok(new_basic_props)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_topic_is_rejected() {
        let args = BasicPublishArguments::new("uade.events", "");
        let err = build_publish_arguments(&args, None).unwrap_err();
        assert!(matches!(err, RabbitMQError::MissingTopic));
    }

    #[test]
    fn topic_becomes_routing_key() {
        let args = BasicPublishArguments::new("uade.events", "");
        let args = build_publish_arguments(&args, Some("payment.overdue".to_owned())).unwrap();
        assert_eq!(args.routing_key, "payment.overdue");
        assert_eq!(args.exchange, "uade.events");
    }

    #[test]
    fn context_sets_message_id_and_keeps_common_props() {
        let common = BasicProperties::default()
            .with_app_id("lending-notifications")
            .with_delivery_mode(2)
            .finish();
        let props = PublisherContext::new("req-1", Some("msg-1".to_owned()))
            .into_basic_props(&common)
            .unwrap();

        assert_eq!(props.message_id().map(String::as_str), Some("msg-1"));
        assert_eq!(props.delivery_mode(), Some(2));
        assert!(props.headers().is_some());
    }

    #[test]
    fn message_builders_compose() {
        let msg = Message::from("{}")
            .with_topic("agreement.created")
            .with_content_type("application/json");
        assert_eq!(msg.topic(), Some("agreement.created"));
        assert_eq!(msg.content_type.as_deref(), Some("application/json"));
    }
}
