//! Filter error types
//!
//! Errors are split by the broker surface they came from, because the run
//! treats them differently:
//! - **Connection / Fetch / Ack**: fatal, the run drains and exits non-zero
//! - **Republish**: isolated to one message, which is nacked back for redelivery
//! - **Config**: rejected before any broker interaction

use thiserror::Error;

/// Errors surfaced while filtering a queue.
#[derive(Error, Debug)]
pub enum FilterError {
    /// Could not establish the broker connection or channel.
    #[error("failed to connect to broker: {0}")]
    Connection(String),

    /// A fetch call failed at the broker level (a fetch that merely timed
    /// out is not an error, see [`Fetch::TimedOut`](crate::Fetch)).
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// An acknowledgment (or negative acknowledgment) was rejected by the
    /// broker. Fatal for the affected batch; unconfirmed tags stay buffered.
    #[error("acknowledgment failed: {0}")]
    Ack(String),

    /// Republishing a message failed. Per-message: the message is nacked
    /// with requeue and the worker moves on.
    #[error("republish failed: {0}")]
    Republish(String),

    /// Invalid configuration, rejected before any broker interaction.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Internal error (worker task failure and similar).
    #[error("internal error: {0}")]
    Internal(String),
}

impl FilterError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        FilterError::Config(message.into())
    }

    /// Whether this error terminates the run (as opposed to a single message).
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FilterError::Republish(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality() {
        assert!(FilterError::Connection("refused".into()).is_fatal());
        assert!(FilterError::Ack("channel closed".into()).is_fatal());
        assert!(FilterError::Config("zero workers".into()).is_fatal());
        assert!(!FilterError::Republish("unroutable".into()).is_fatal());
    }

    #[test]
    fn test_display() {
        let err = FilterError::Ack("channel closed".into());
        assert_eq!(err.to_string(), "acknowledgment failed: channel closed");
    }
}
