//! Counters emitted through the `metrics` facade.
//!
//! The library only emits; whether a recorder is installed (and which) is the
//! embedding application's choice. Without one these calls are no-ops.

use metrics::{counter, histogram};

/// Record one message leaving the pipeline with its disposition.
pub(crate) fn record_disposition(disposition: &'static str) {
    counter!("queue_filter_messages_total", "disposition" => disposition).increment(1);
}

/// Record a message handed back to the broker for redelivery.
pub(crate) fn record_requeue() {
    counter!("queue_filter_requeues_total").increment(1);
}

/// Record one successful acknowledgment flush.
pub(crate) fn record_ack_flush(size: usize) {
    counter!("queue_filter_ack_flushes_total").increment(1);
    histogram!("queue_filter_ack_flush_size").record(size as f64);
}
