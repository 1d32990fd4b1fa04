//! Thin RabbitMQ layer on top of `amqprs`.
//!
//! The crate exposes a type-state [`RabbitMQBuilder`] that produces a topic
//! [`Publisher`], a [`Subscription`] to a durable dead-lettered queue, or both
//! sharing one connection. Queue layout is described with [`QueueTopology`].

mod builder;
mod connection;
mod error;
mod publisher;
mod subscription;
mod topology;

pub use amqprs::channel::ConsumerMessage;
pub use builder::{BothStage, InitStage, OnlyPublisherStage, OnlySubscriberStage, RabbitMQBuilder};
pub use error::RabbitMQError;
pub use publisher::{Message, Publisher, PublisherContext, PublisherDispatcher};
pub use subscription::Subscription;
pub use topology::{ArgValue, QueueTopology};
