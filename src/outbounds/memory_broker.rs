//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// A single-queue broker living in the process. The queue is bound to the five lending routing
// keys like the AMQP topology, so a message on any other key is dropped at publish time;
// `catch_all` binds it to `#` instead. Deliveries stay unacknowledged until settled, a nack with requeue puts the message back at
// the head, and a message that has used up its delivery budget (or is nacked without requeue)
// moves to the dead-letter list. Used by the end-to-end tests and the demo binary.
//--------------------------------------------------------------------------------------------------

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use crate::domain::{
    events::RoutingKey,
    ports::{Delivery, DeliverySource, MessageTransport, TransportError},
};

/// A message the queue gave up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub routing_key: String,
    pub body: Vec<u8>,
    pub deliveries: u32,
}

#[derive(Debug, Clone)]
struct Queued {
    routing_key: String,
    body: Vec<u8>,
    deliveries: u32,
}

#[derive(Default)]
struct BrokerState {
    ready: VecDeque<Queued>,
    unacked: HashMap<u64, Queued>,
    dead_letters: Vec<DeadLetter>,
    last_tag: u64,
    closed: bool,
    rejecting_sends: bool,
}

#[derive(Clone)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    ready_signal: Arc<Notify>,
    max_deliveries: Option<u32>,
    /// `None` routes every key
    bindings: Option<Arc<HashSet<String>>>,
}

impl InMemoryBroker {
    /// # Arguments
    /// * `max_deliveries` - deliveries a message gets before it is dead-lettered,
    ///   unbounded if `None`
    pub fn new(max_deliveries: Option<u32>) -> Self {
        let bindings = RoutingKey::ALL
            .iter()
            .map(|key| key.as_str().to_owned())
            .collect();
        Self {
            bindings: Some(Arc::new(bindings)),
            ..Self::catch_all(max_deliveries)
        }
    }

    /// A queue bound with `#`, receiving messages on any routing key.
    pub fn catch_all(max_deliveries: Option<u32>) -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState::default())),
            ready_signal: Arc::new(Notify::new()),
            max_deliveries,
            bindings: None,
        }
    }

    fn is_bound(&self, routing_key: &str) -> bool {
        self.bindings
            .as_ref()
            .is_none_or(|keys| keys.contains(routing_key))
    }

    /// Delivery side of the queue. All consumers share the same queue.
    pub fn consumer(&self) -> InMemoryDeliveries {
        InMemoryDeliveries {
            broker: self.clone(),
        }
    }

    /// Makes every following `send` fail, as an unreachable exchange would.
    pub fn reject_sends(&self, rejecting: bool) {
        self.state.lock().rejecting_sends = rejecting;
    }

    /// Ends the delivery stream once the ready messages are drained.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.ready_signal.notify_one();
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().dead_letters.clone()
    }

    pub fn ready_count(&self) -> usize {
        self.state.lock().ready.len()
    }

    pub fn unacked_count(&self) -> usize {
        self.state.lock().unacked.len()
    }

    fn settle(&self, delivery_tag: u64, requeue: bool) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        let message = state
            .unacked
            .remove(&delivery_tag)
            .ok_or_else(|| TransportError(format!("unknown delivery tag {delivery_tag}")))?;

        let budget_left = self.max_deliveries.is_none_or(|max| message.deliveries < max);
        if requeue && budget_left {
            state.ready.push_front(message);
            drop(state);
            self.ready_signal.notify_one();
        } else {
            debug!(
                "dead-lettering message on {} after {} deliveries",
                message.routing_key, message.deliveries
            );
            state.dead_letters.push(DeadLetter {
                routing_key: message.routing_key,
                body: message.body,
                deliveries: message.deliveries,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MessageTransport for InMemoryBroker {
    async fn send(&self, routing_key: &str, body: Vec<u8>) -> Result<(), TransportError> {
        {
            let mut state = self.state.lock();
            if state.rejecting_sends {
                return Err(TransportError("exchange unreachable".to_owned()));
            }
            if !self.is_bound(routing_key) {
                debug!("no binding for {}, message dropped", routing_key);
                return Ok(());
            }
            state.ready.push_back(Queued {
                routing_key: routing_key.to_owned(),
                body,
                deliveries: 0,
            });
        }
        self.ready_signal.notify_one();
        Ok(())
    }
}

pub struct InMemoryDeliveries {
    broker: InMemoryBroker,
}

#[async_trait]
impl DeliverySource for InMemoryDeliveries {
    async fn next_delivery(&mut self) -> Option<Delivery> {
        loop {
            {
                let mut state = self.broker.state.lock();
                if let Some(mut message) = state.ready.pop_front() {
                    message.deliveries += 1;
                    state.last_tag += 1;
                    let delivery_tag = state.last_tag;
                    let delivery = Delivery {
                        delivery_tag,
                        routing_key: message.routing_key.clone(),
                        body: message.body.clone(),
                        redelivered: message.deliveries > 1,
                    };
                    state.unacked.insert(delivery_tag, message);
                    return Some(delivery);
                }
                if state.closed {
                    return None;
                }
            }
            self.broker.ready_signal.notified().await;
        }
    }

    async fn ack(&mut self, delivery_tag: u64) -> Result<(), TransportError> {
        self.broker
            .state
            .lock()
            .unacked
            .remove(&delivery_tag)
            .map(|_| ())
            .ok_or_else(|| TransportError(format!("unknown delivery tag {delivery_tag}")))
    }

    async fn nack(&mut self, delivery_tag: u64, requeue: bool) -> Result<(), TransportError> {
        self.broker.settle(delivery_tag, requeue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn requeued_message_is_redelivered_then_dead_lettered() {
        let broker = InMemoryBroker::new(Some(2));
        let mut deliveries = broker.consumer();
        broker.send("agreement.created", b"{}".to_vec()).await.unwrap();

        let first = deliveries.next_delivery().await.unwrap();
        assert!(!first.redelivered);
        deliveries.nack(first.delivery_tag, true).await.unwrap();

        let second = deliveries.next_delivery().await.unwrap();
        assert!(second.redelivered);
        assert_ne!(second.delivery_tag, first.delivery_tag);
        deliveries.nack(second.delivery_tag, true).await.unwrap();

        assert_eq!(broker.ready_count(), 0);
        assert_eq!(
            broker.dead_letters(),
            vec![DeadLetter {
                routing_key: "agreement.created".to_owned(),
                body: b"{}".to_vec(),
                deliveries: 2,
            }]
        );
    }

    #[tokio::test]
    async fn ack_removes_and_rejects_unknown_tags() {
        let broker = InMemoryBroker::new(None);
        let mut deliveries = broker.consumer();
        broker.send("agreement.accepted", b"{}".to_vec()).await.unwrap();

        let delivery = deliveries.next_delivery().await.unwrap();
        assert_eq!(broker.unacked_count(), 1);
        deliveries.ack(delivery.delivery_tag).await.unwrap();
        assert_eq!(broker.unacked_count(), 0);
        assert!(deliveries.ack(delivery.delivery_tag).await.is_err());
    }

    #[tokio::test]
    async fn unbound_routing_key_is_dropped_unless_catch_all() {
        let broker = InMemoryBroker::new(None);
        broker.send("agreement.renegotiated", b"{}".to_vec()).await.unwrap();
        broker.send("notification.overdue_alert", b"{}".to_vec()).await.unwrap();
        assert_eq!(broker.ready_count(), 1);

        let catch_all = InMemoryBroker::catch_all(None);
        catch_all.send("agreement.renegotiated", b"{}".to_vec()).await.unwrap();
        assert_eq!(catch_all.ready_count(), 1);
    }

    #[tokio::test]
    async fn closed_broker_ends_stream_and_rejecting_fails_sends() {
        let broker = InMemoryBroker::new(None);
        broker.reject_sends(true);
        assert!(broker.send("agreement.created", vec![]).await.is_err());

        broker.close();
        assert!(broker.consumer().next_delivery().await.is_none());
    }
}
