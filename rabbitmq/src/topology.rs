use std::time::Duration;

use amqprs::{
    FieldTable, FieldValue, ShortStr,
    channel::{
        BasicQosArguments, Channel, ExchangeDeclareArguments, QueueBindArguments,
        QueueDeclareArguments,
    },
};
use tracing::info;

use crate::RabbitMQError;

/// Dead-lettered messages are dropped after one day unless configured otherwise
const DEFAULT_DEAD_LETTER_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Value of an `x-*` queue argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Str(String),
    Int(i32),
}

/// Declarative layout of a consumer queue on a topic exchange
///
/// Declaring a topology creates, in order:
/// 1. the durable topic exchange
/// 2. the durable dead-letter queue, with a message TTL
/// 3. the durable main queue, dead-lettering through the default exchange into (2)
/// 4. one binding per routing key from the exchange to the main queue
///
/// Every declaration is idempotent, so publishers and consumers may both
/// declare the same topology at startup in any order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueTopology {
    exchange: String,
    queue: String,
    dead_letter_queue: String,
    dead_letter_ttl: Duration,
    routing_keys: Vec<String>,
    prefetch_count: u16,
    delivery_limit: Option<u32>,
}

impl QueueTopology {
    /// # Arguments
    /// * `exchange` - Topic exchange the queue is bound to
    /// * `queue` - Main queue name
    /// * `dead_letter_queue` - Queue receiving rejected or expired messages
    pub fn new(exchange: &str, queue: &str, dead_letter_queue: &str) -> Self {
        Self {
            exchange: exchange.to_owned(),
            queue: queue.to_owned(),
            dead_letter_queue: dead_letter_queue.to_owned(),
            dead_letter_ttl: DEFAULT_DEAD_LETTER_TTL,
            routing_keys: Vec::new(),
            prefetch_count: 1,
            delivery_limit: None,
        }
    }

    /// Binds the main queue to the exchange with the given routing keys
    pub fn bind<I, S>(mut self, routing_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.routing_keys
            .extend(routing_keys.into_iter().map(Into::into));
        self
    }

    pub fn dead_letter_ttl(mut self, ttl: Duration) -> Self {
        self.dead_letter_ttl = ttl;
        self
    }

    pub fn prefetch(mut self, prefetch_count: u16) -> Self {
        self.prefetch_count = prefetch_count;
        self
    }

    /// Caps redeliveries of a poison message.
    ///
    /// Setting a limit declares the main queue as a quorum queue, the only
    /// queue type where the broker tracks delivery counts. Once the limit is
    /// exceeded the message is dead-lettered instead of requeued.
    pub fn delivery_limit(mut self, limit: Option<u32>) -> Self {
        self.delivery_limit = limit;
        self
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn dead_letter_queue(&self) -> &str {
        &self.dead_letter_queue
    }

    pub fn routing_keys(&self) -> &[String] {
        &self.routing_keys
    }

    pub fn prefetch_count(&self) -> u16 {
        self.prefetch_count
    }

    /// Arguments for the dead-letter queue declaration
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the TTL does not fit a signed 32 bit milliseconds value
    pub fn dead_letter_queue_arguments(&self) -> Result<Vec<(&'static str, ArgValue)>, RabbitMQError> {
        let ttl_ms = i32::try_from(self.dead_letter_ttl.as_millis()).map_err(|_| {
            RabbitMQError::InvalidArgument {
                name: "x-message-ttl".to_owned(),
                reason: format!("{:?} overflows i32 milliseconds", self.dead_letter_ttl),
            }
        })?;

        Ok(vec![("x-message-ttl", ArgValue::Int(ttl_ms))])
    }

    /// Arguments for the main queue declaration
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the delivery limit does not fit an i32
    pub fn main_queue_arguments(&self) -> Result<Vec<(&'static str, ArgValue)>, RabbitMQError> {
        let mut args = vec![
            ("x-dead-letter-exchange", ArgValue::Str(String::new())),
            (
                "x-dead-letter-routing-key",
                ArgValue::Str(self.dead_letter_queue.clone()),
            ),
        ];

        if let Some(limit) = self.delivery_limit {
            let limit = i32::try_from(limit).map_err(|_| RabbitMQError::InvalidArgument {
                name: "x-delivery-limit".to_owned(),
                reason: format!("{limit} overflows i32"),
            })?;
            args.push(("x-queue-type", ArgValue::Str("quorum".to_owned())));
            args.push(("x-delivery-limit", ArgValue::Int(limit)));
        }

        Ok(args)
    }

    /// Declares exchange, queues and bindings, then applies the prefetch window
    pub(crate) async fn declare(&self, channel: &Channel) -> Result<(), RabbitMQError> {
        declare_topic_exchange(channel, &self.exchange).await?;

        let dlq_args = QueueDeclareArguments::new(&self.dead_letter_queue)
            .durable(true)
            .arguments(field_table(self.dead_letter_queue_arguments()?)?)
            .finish();
        channel
            .queue_declare(dlq_args)
            .await
            .map_err(|err| RabbitMQError::QueueDeclarationError(err.to_string()))?;

        let queue_args = QueueDeclareArguments::new(&self.queue)
            .durable(true)
            .arguments(field_table(self.main_queue_arguments()?)?)
            .finish();
        channel
            .queue_declare(queue_args)
            .await
            .map_err(|err| RabbitMQError::QueueDeclarationError(err.to_string()))?;

        for routing_key in &self.routing_keys {
            channel
                .queue_bind(QueueBindArguments::new(&self.queue, &self.exchange, routing_key))
                .await
                .map_err(|err| RabbitMQError::QueueBindingError(err.to_string()))?;
        }

        channel
            .basic_qos(BasicQosArguments::new(0, self.prefetch_count, false))
            .await
            .map_err(|err| RabbitMQError::QosError(err.to_string()))?;

        info!(
            "declared queue {} on exchange {} ({} bindings, dlq {})",
            self.queue,
            self.exchange,
            self.routing_keys.len(),
            self.dead_letter_queue
        );

        Ok(())
    }
}

pub(crate) async fn declare_topic_exchange(
    channel: &Channel,
    exchange: &str,
) -> Result<(), RabbitMQError> {
    let args = ExchangeDeclareArguments::new(exchange, "topic")
        .durable(true)
        .finish();
    channel
        .exchange_declare(args)
        .await
        .map_err(|err| RabbitMQError::ExchangeDeclarationError(err.to_string()))
}

fn field_table(args: Vec<(&'static str, ArgValue)>) -> Result<FieldTable, RabbitMQError> {
    let mut table = FieldTable::new();
    for (name, value) in args {
        let key = ShortStr::try_from(name).map_err(|err| RabbitMQError::InvalidArgument {
            name: name.to_owned(),
            reason: err.to_string(),
        })?;
        let value = match value {
            ArgValue::Str(s) => s.into(),
            ArgValue::Int(i) => FieldValue::I(i),
        };
        table.insert(key, value);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology() -> QueueTopology {
        QueueTopology::new("uade.events", "notifications.queue", "notifications.dlq")
            .bind(["agreement.created", "agreement.accepted"])
    }

    #[test]
    fn dead_letter_queue_keeps_messages_for_a_day() {
        let args = topology().dead_letter_queue_arguments().unwrap();
        assert_eq!(args, vec![("x-message-ttl", ArgValue::Int(86_400_000))]);
    }

    #[test]
    fn main_queue_dead_letters_through_default_exchange() {
        let args = topology().main_queue_arguments().unwrap();
        assert_eq!(
            args,
            vec![
                ("x-dead-letter-exchange", ArgValue::Str(String::new())),
                (
                    "x-dead-letter-routing-key",
                    ArgValue::Str("notifications.dlq".to_owned())
                ),
            ]
        );
    }

    #[test]
    fn delivery_limit_switches_to_quorum_queue() {
        let args = topology()
            .delivery_limit(Some(5))
            .main_queue_arguments()
            .unwrap();
        assert!(args.contains(&("x-queue-type", ArgValue::Str("quorum".to_owned()))));
        assert!(args.contains(&("x-delivery-limit", ArgValue::Int(5))));
    }

    #[test]
    fn ttl_overflow_is_rejected() {
        let err = topology()
            .dead_letter_ttl(Duration::from_secs(u64::MAX / 1000))
            .dead_letter_queue_arguments()
            .unwrap_err();
        assert!(matches!(err, RabbitMQError::InvalidArgument { .. }));
    }

    #[test]
    fn defaults_to_single_prefetch() {
        let topology = topology();
        assert_eq!(topology.prefetch_count(), 1);
        assert_eq!(topology.routing_keys().len(), 2);
    }

    #[test]
    fn arguments_encode_into_field_table() {
        let args = topology()
            .delivery_limit(Some(3))
            .main_queue_arguments()
            .unwrap();
        assert!(field_table(args).is_ok());
    }
}
