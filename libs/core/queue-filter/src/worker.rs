//! The worker loop: fetch, decide, dispose.
//!
//! Each worker owns one message at a time. The per-message ordering is
//! fetch → decide → republish → submit-for-ack, never reordered: a tag is
//! only handed to the acknowledger after its republish (if any) was
//! confirmed, so a crash between the two steps loses no message.

use crate::acker::BatchAcker;
use crate::broker::{Fetch, InboundMessage, QueueBroker};
use crate::config::FilterConfig;
use crate::counters::RunCounters;
use crate::error::FilterError;
use crate::matcher::Matcher;
use crate::metrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// What happens to a fetched message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Matched the rules: acknowledged away.
    Drop,
    /// Did not match and republishing is on: put back, then acknowledged.
    Republish,
    /// Did not match and republishing is off: acknowledged away too; the
    /// rules act purely as a removal filter.
    PassThrough,
}

impl Disposition {
    fn label(self) -> &'static str {
        match self {
            Disposition::Drop => "drop",
            Disposition::Republish => "republish",
            Disposition::PassThrough => "pass_through",
        }
    }
}

/// Why a worker's loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The queue reported end-of-stream.
    Drained,
    /// Cancellation was observed at a fetch boundary.
    Cancelled,
    /// The message budget ran out; the over-limit fetch was requeued.
    LimitReached,
}

fn decide(matched: bool, republish: bool) -> Disposition {
    if matched {
        Disposition::Drop
    } else if republish {
        Disposition::Republish
    } else {
        Disposition::PassThrough
    }
}

/// One unit of concurrent consumption.
pub struct Worker {
    id: usize,
    broker: Arc<dyn QueueBroker>,
    matcher: Arc<Matcher>,
    acker: Arc<BatchAcker>,
    counters: Arc<RunCounters>,
    republish: bool,
    fetch_timeout: Duration,
}

impl Worker {
    pub fn new(
        id: usize,
        broker: Arc<dyn QueueBroker>,
        matcher: Arc<Matcher>,
        acker: Arc<BatchAcker>,
        counters: Arc<RunCounters>,
        config: &FilterConfig,
    ) -> Self {
        Self {
            id,
            broker,
            matcher,
            acker,
            counters,
            republish: config.republish,
            fetch_timeout: config.fetch_timeout,
        }
    }

    /// Loop until cancelled, the queue drains, or the budget runs out.
    ///
    /// Fatal broker errors propagate to the coordinator; republish failures
    /// are isolated to their message (nack with requeue, keep going).
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<WorkerExit, FilterError> {
        debug!(worker = self.id, "Worker started");
        loop {
            if *shutdown.borrow() {
                debug!(worker = self.id, "Cancellation observed, stopping");
                return Ok(WorkerExit::Cancelled);
            }

            match self.broker.fetch(self.fetch_timeout).await? {
                // A timed-out wait is a normal wake-up to re-check cancellation.
                Fetch::TimedOut => continue,
                Fetch::Empty => {
                    debug!(worker = self.id, "Queue empty, stopping");
                    return Ok(WorkerExit::Drained);
                }
                Fetch::Delivery(message) => {
                    if !self.counters.try_claim() {
                        // Fetched past the limit: hand it back untouched
                        // rather than silently dropping it.
                        self.broker.nack(message.delivery_tag, true).await?;
                        info!(
                            worker = self.id,
                            delivery_tag = message.delivery_tag,
                            "Message limit reached, requeued over-limit fetch"
                        );
                        return Ok(WorkerExit::LimitReached);
                    }
                    self.process(message).await?;
                }
            }
        }
    }

    async fn process(&self, message: InboundMessage) -> Result<(), FilterError> {
        let matched = self.matcher.matches(&message.body_text());
        let disposition = decide(matched, self.republish);
        debug!(
            worker = self.id,
            delivery_tag = message.delivery_tag,
            redelivered = message.redelivered,
            matched,
            disposition = disposition.label(),
            "Processing message"
        );

        match disposition {
            Disposition::Drop => self.counters.record_matched(),
            Disposition::PassThrough => {}
            Disposition::Republish => {
                match self.broker.republish(&message).await {
                    Ok(()) => self.counters.record_republished(),
                    Err(FilterError::Republish(reason)) => {
                        warn!(
                            worker = self.id,
                            delivery_tag = message.delivery_tag,
                            error = %reason,
                            "Republish failed, giving the message back for redelivery"
                        );
                        self.broker.nack(message.delivery_tag, true).await?;
                        self.counters.record_requeued();
                        metrics::record_requeue();
                        return Ok(());
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        metrics::record_disposition(disposition.label());
        // Only now, with any republish confirmed, may the tag be acknowledged.
        self.acker.submit(message.delivery_tag).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matched_messages_always_drop() {
        assert_eq!(decide(true, false), Disposition::Drop);
        assert_eq!(decide(true, true), Disposition::Drop);
    }

    #[test]
    fn test_republish_flag_decides_unmatched_fate() {
        assert_eq!(decide(false, true), Disposition::Republish);
        assert_eq!(decide(false, false), Disposition::PassThrough);
    }

    #[test]
    fn test_disposition_labels() {
        assert_eq!(Disposition::Drop.label(), "drop");
        assert_eq!(Disposition::Republish.label(), "republish");
        assert_eq!(Disposition::PassThrough.label(), "pass_through");
    }
}
