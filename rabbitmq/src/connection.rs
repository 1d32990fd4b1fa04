use amqprs::{
    Ack, BasicProperties, Cancel, Close, Nack, Return,
    callbacks::{ChannelCallback, ConnectionCallback},
    channel::Channel,
    connection::{Connection, OpenConnectionArguments},
};
use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::RabbitMQError;

/// Opens a connection and registers the logging callback on it.
pub(crate) async fn open_rabbit_connection(
    connection_string: &str,
) -> Result<Connection, RabbitMQError> {
    let open_conn_args = OpenConnectionArguments::try_from(connection_string).map_err(|err| {
        error!("Failed to parse connection string: {}", err);
        RabbitMQError::UriError(err.to_string())
    })?;

    let conn = Connection::open(&open_conn_args).await.map_err(|err| {
        error!("Failed to connect to RabbitMQ: {}", err);
        RabbitMQError::ConnectionError(err.to_string())
    })?;

    conn.register_callback(RabbitConnectionCallback)
        .await
        .map_err(|err| {
            error!("Failed to register connection callback: {}", err);
            RabbitMQError::ConnectionError(err.to_string())
        })?;

    info!("RabbitMQ connection established ({})", conn.connection_name());
    Ok(conn)
}

pub(crate) async fn open_rabbit_channel(conn: &Connection) -> Result<Channel, RabbitMQError> {
    let rabbit_channel = conn.open_channel(None).await.map_err(|err| {
        error!("Failed to open channel: {}", err);
        RabbitMQError::OpenChannelError(err.to_string())
    })?;

    rabbit_channel
        .register_callback(RabbitChannelCallback)
        .await
        .map_err(|err| {
            error!("Failed to register channel callback: {}", err);
            RabbitMQError::OpenChannelError(err.to_string())
        })?;

    debug!("RabbitMQ channel {} opened", rabbit_channel.channel_id());
    Ok(rabbit_channel)
}

struct RabbitConnectionCallback;

#[async_trait]
impl ConnectionCallback for RabbitConnectionCallback {
    async fn close(
        &mut self,
        _connection: &Connection,
        close: Close,
    ) -> Result<(), amqprs::error::Error> {
        warn!("connection closed by server {:?}", close);
        Ok(())
    }

    async fn blocked(&mut self, _connection: &Connection, reason: String) {
        warn!("connection blocked {:?}", reason);
    }

    async fn unblocked(&mut self, _connection: &Connection) {
        info!("connection unblocked");
    }

    async fn secret_updated(&mut self, _connection: &Connection) {
        debug!("connection secret updated");
    }
}

struct RabbitChannelCallback;

#[async_trait]
impl ChannelCallback for RabbitChannelCallback {
    async fn close(
        &mut self,
        channel: &Channel,
        close: amqprs::CloseChannel,
    ) -> Result<(), amqprs::error::Error> {
        warn!("channel {} closed by server {:?}", channel.channel_id(), close);
        Ok(())
    }

    async fn cancel(&mut self, channel: &Channel, cancel: Cancel) -> Result<(), amqprs::error::Error> {
        warn!("consumer on channel {} cancelled {:?}", channel.channel_id(), cancel);
        Ok(())
    }

    async fn flow(&mut self, _channel: &Channel, active: bool) -> Result<bool, amqprs::error::Error> {
        debug!("channel flow {}", active);
        Ok(true)
    }

    async fn publish_ack(&mut self, _channel: &Channel, _ack: Ack) {}

    async fn publish_nack(&mut self, _channel: &Channel, nack: Nack) {
        warn!("broker nacked publish {:?}", nack);
    }

    async fn publish_return(
        &mut self,
        _channel: &Channel,
        ret: Return,
        _props: BasicProperties,
        _content: Vec<u8>,
    ) {
        warn!("unroutable message returned {:?}", ret);
    }
}
