//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// The notifications consumer loop. One delivery at a time: materialize, then ack on success or
// nack with requeue on any failure (unknown routing key and malformed payload included). How
// often a poison message is requeued before it reaches the dead-letter queue is the broker's
// call. Cancellation is only observed between deliveries.
//--------------------------------------------------------------------------------------------------

use thiserror::Error;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{
    ports::{Delivery, DeliverySource, TransportError},
    services::materializer::NotificationMaterializer,
};

/// Settlement counts of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub acked: u64,
    pub nacked: u64,
}

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("delivery stream closed")]
    StreamClosed,

    #[error("failed to settle delivery {delivery_tag}: {source}")]
    Settle {
        delivery_tag: u64,
        #[source]
        source: TransportError,
    },
}

pub struct NotificationConsumer<S> {
    source: S,
    materializer: NotificationMaterializer,
    stats: ConsumerStats,
}

impl<S: DeliverySource> NotificationConsumer<S> {
    pub fn new(source: S, materializer: NotificationMaterializer) -> Self {
        Self {
            source,
            materializer,
            stats: ConsumerStats::default(),
        }
    }

    /// Consumes until `cancel` fires or the delivery stream ends.
    ///
    /// # Returns
    /// * `Ok(stats)` - cancelled; every delivery taken so far was settled
    /// * `Err(ConsumerError::StreamClosed)` - the source closed underneath the loop
    /// * `Err(ConsumerError::Settle)` - an ack or nack could not be sent
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<ConsumerStats, ConsumerError> {
        info!("notifications consumer started");

        loop {
            let next = select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(
                        "notifications consumer stopped: {} acked, {} nacked",
                        self.stats.acked, self.stats.nacked
                    );
                    return Ok(self.stats);
                }
                delivery = self.source.next_delivery() => delivery,
            };

            let Some(delivery) = next else {
                warn!("delivery stream closed");
                return Err(ConsumerError::StreamClosed);
            };

            self.process(delivery).await?;
        }
    }

    pub fn stats(&self) -> ConsumerStats {
        self.stats
    }

    /// Gives the delivery source back, e.g. to close the underlying channel.
    pub fn into_source(self) -> S {
        self.source
    }

    async fn process(&mut self, delivery: Delivery) -> Result<(), ConsumerError> {
        let Delivery {
            delivery_tag,
            routing_key,
            body,
            redelivered,
        } = delivery;

        info!(
            "delivery {} on {} (redelivered: {}, {} bytes)",
            delivery_tag,
            routing_key,
            redelivered,
            body.len()
        );

        match self.materializer.handle_delivery(&routing_key, &body).await {
            Ok(created) => {
                self.source
                    .ack(delivery_tag)
                    .await
                    .map_err(|source| ConsumerError::Settle { delivery_tag, source })?;
                self.stats.acked += 1;
                debug!("acked delivery {} ({} notification(s))", delivery_tag, created);
            }
            Err(err) => {
                warn!("handler failed for delivery {} on {}: {}", delivery_tag, routing_key, err);
                self.source
                    .nack(delivery_tag, true)
                    .await
                    .map_err(|source| ConsumerError::Settle { delivery_tag, source })?;
                self.stats.nacked += 1;
                debug!("nacked delivery {} with requeue", delivery_tag);
            }
        }

        Ok(())
    }
}
