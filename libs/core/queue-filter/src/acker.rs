//! Batched acknowledgment.
//!
//! Workers submit delivery tags here instead of acking directly; the buffer
//! flushes once it reaches the batch threshold and once more at drain. One
//! mutex owns the buffer, so submits are serialized and a flush is mutually
//! exclusive with them.
//!
//! Ack strategy: one `basic_ack` per tag, never a cumulative multi-ack. The
//! channel is shared across workers, and a cumulative ack up to the highest
//! tag could acknowledge another worker's in-flight delivery.

use crate::broker::QueueBroker;
use crate::error::FilterError;
use crate::metrics;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

#[derive(Debug, Default)]
struct AckBatch {
    tags: VecDeque<u64>,
    /// Set when a flush failed. Unconfirmed tags stay buffered, and no later
    /// flush may touch the broker again: the broker will redeliver them.
    poisoned: bool,
}

/// Accumulates delivery tags and acknowledges them in batches.
pub struct BatchAcker {
    broker: Arc<dyn QueueBroker>,
    batch_size: usize,
    pending: Mutex<AckBatch>,
}

impl BatchAcker {
    /// Create an acker flushing every `batch_size` tags.
    pub fn new(broker: Arc<dyn QueueBroker>, batch_size: usize) -> Self {
        Self {
            broker,
            batch_size,
            pending: Mutex::new(AckBatch::default()),
        }
    }

    /// Append one tag; flushes synchronously when the threshold is reached.
    pub async fn submit(&self, delivery_tag: u64) -> Result<(), FilterError> {
        let mut batch = self.pending.lock().await;
        batch.tags.push_back(delivery_tag);
        if batch.tags.len() >= self.batch_size {
            self.flush_batch(&mut batch).await?;
        }
        Ok(())
    }

    /// Flush whatever is buffered right now.
    pub async fn flush(&self) -> Result<(), FilterError> {
        let mut batch = self.pending.lock().await;
        self.flush_batch(&mut batch).await
    }

    /// Final flush at shutdown, called exactly once after all workers have
    /// stopped producing. A no-op when the buffer is already empty; after a
    /// failed flush it leaves the remaining tags unacknowledged so none can
    /// be acked twice.
    pub async fn drain_and_flush(&self) -> Result<(), FilterError> {
        let mut batch = self.pending.lock().await;
        if batch.poisoned {
            warn!(
                pending = batch.tags.len(),
                "Skipping final flush after a failed acknowledgment; buffered tags will be redelivered"
            );
            return Ok(());
        }
        self.flush_batch(&mut batch).await
    }

    /// Number of tags currently buffered.
    pub async fn pending(&self) -> usize {
        self.pending.lock().await.tags.len()
    }

    async fn flush_batch(&self, batch: &mut AckBatch) -> Result<(), FilterError> {
        if batch.tags.is_empty() {
            return Ok(());
        }
        let size = batch.tags.len();
        // Tags leave the buffer one by one, each only after the broker
        // confirmed its ack; a failure keeps every unconfirmed tag.
        while let Some(&tag) = batch.tags.front() {
            if let Err(e) = self.broker.ack(tag).await {
                batch.poisoned = true;
                error!(
                    delivery_tag = tag,
                    pending = batch.tags.len(),
                    error = %e,
                    "Acknowledgment flush failed, keeping unconfirmed tags"
                );
                return Err(e);
            }
            batch.tags.pop_front();
        }
        metrics::record_ack_flush(size);
        debug!(size, "Flushed acknowledgment batch");
        Ok(())
    }
}
