//! Broker capability and its AMQP implementation.
//!
//! Workers talk to the queue only through [`QueueBroker`], which keeps the
//! control loop testable against an in-memory double. [`AmqpQueue`] is the
//! real implementation: one connection, one channel, shared by every worker
//! (lapin channels are safe for concurrent use; each call is its own RPC).

use crate::config::AmqpConfig;
use crate::error::FilterError;
use async_trait::async_trait;
use lapin::options::{
    BasicAckOptions, BasicGetOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    ConfirmSelectOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use std::borrow::Cow;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// One delivered message, owned by the fetching worker until disposed.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Broker handle correlating this delivery to its ack/nack.
    pub delivery_tag: u64,

    /// Opaque payload bytes.
    pub body: Vec<u8>,

    /// Whether the broker has delivered this message before.
    pub redelivered: bool,

    /// Original message properties, carried through on republish.
    pub properties: BasicProperties,
}

impl InboundMessage {
    /// Body as text for matching; invalid UTF-8 is replaced, not rejected.
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Outcome of a single bounded-wait fetch.
#[derive(Debug)]
pub enum Fetch {
    /// A message was delivered.
    Delivery(InboundMessage),

    /// The queue is empty: end-of-stream for this run.
    Empty,

    /// The wait bound elapsed. Not an error; the caller re-checks
    /// cancellation and fetches again.
    TimedOut,
}

/// The broker operations the control loop needs.
#[async_trait]
pub trait QueueBroker: Send + Sync {
    /// Fetch the next message, waiting at most `timeout`.
    async fn fetch(&self, timeout: Duration) -> Result<Fetch, FilterError>;

    /// Acknowledge one delivery.
    async fn ack(&self, delivery_tag: u64) -> Result<(), FilterError>;

    /// Reject one delivery, optionally giving it back for redelivery.
    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), FilterError>;

    /// Publish the message back onto the source queue, returning once the
    /// broker has confirmed it.
    async fn republish(&self, message: &InboundMessage) -> Result<(), FilterError>;
}

/// AMQP-backed [`QueueBroker`] over a single confirmed-mode channel.
///
/// Republishing targets the default exchange with the queue name as routing
/// key, so messages land back on the queue they came from.
pub struct AmqpQueue {
    connection: Connection,
    channel: Channel,
    queue: String,
}

impl AmqpQueue {
    /// Connect, open the channel, enable publisher confirms, and apply the
    /// prefetch window.
    pub async fn connect(
        amqp: &AmqpConfig,
        queue: impl Into<String>,
        prefetch: u16,
    ) -> Result<Self, FilterError> {
        let queue = queue.into();
        let connection_name = format!("queue-pruner-{}", Uuid::new_v4());
        let properties = ConnectionProperties::default().with_connection_name(connection_name.into());

        let connection = Connection::connect(&amqp.uri(), properties)
            .await
            .map_err(|e| FilterError::Connection(e.to_string()))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| FilterError::Connection(e.to_string()))?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| FilterError::Connection(e.to_string()))?;
        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| FilterError::Connection(e.to_string()))?;

        info!(
            host = %amqp.host,
            port = amqp.port,
            vhost = %amqp.vhost,
            queue = %queue,
            "Connected to broker"
        );

        Ok(Self {
            connection,
            channel,
            queue,
        })
    }

    /// Close the connection. Errors here are worth logging but nothing more;
    /// the run is already over.
    pub async fn close(&self) -> Result<(), FilterError> {
        self.connection
            .close(200, "shutting down")
            .await
            .map_err(|e| FilterError::Connection(e.to_string()))
    }
}

#[async_trait]
impl QueueBroker for AmqpQueue {
    async fn fetch(&self, timeout: Duration) -> Result<Fetch, FilterError> {
        let get = self.channel.basic_get(&self.queue, BasicGetOptions::default());
        match tokio::time::timeout(timeout, get).await {
            Err(_elapsed) => Ok(Fetch::TimedOut),
            Ok(Err(e)) => Err(FilterError::Fetch(e.to_string())),
            Ok(Ok(None)) => Ok(Fetch::Empty),
            Ok(Ok(Some(message))) => {
                let lapin::message::Delivery {
                    delivery_tag,
                    redelivered,
                    properties,
                    data,
                    ..
                } = message.delivery;
                debug!(delivery_tag, redelivered, "Fetched message");
                Ok(Fetch::Delivery(InboundMessage {
                    delivery_tag,
                    body: data,
                    redelivered,
                    properties,
                }))
            }
        }
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), FilterError> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| FilterError::Ack(e.to_string()))
    }

    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), FilterError> {
        self.channel
            .basic_nack(
                delivery_tag,
                BasicNackOptions {
                    requeue,
                    ..BasicNackOptions::default()
                },
            )
            .await
            .map_err(|e| FilterError::Ack(e.to_string()))
    }

    async fn republish(&self, message: &InboundMessage) -> Result<(), FilterError> {
        let confirmation = self
            .channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                &message.body,
                message.properties.clone(),
            )
            .await
            .map_err(|e| FilterError::Republish(e.to_string()))?
            .await
            .map_err(|e| FilterError::Republish(e.to_string()))?;

        match confirmation {
            Confirmation::Nack(_) => Err(FilterError::Republish(
                "broker refused the republished message".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_text_replaces_invalid_utf8() {
        let message = InboundMessage {
            delivery_tag: 1,
            body: vec![0x66, 0x6f, 0x6f, 0xff],
            redelivered: false,
            properties: BasicProperties::default(),
        };
        assert_eq!(message.body_text(), "foo\u{fffd}");
    }

    #[test]
    fn test_body_text_passes_utf8_through() {
        let message = InboundMessage {
            delivery_tag: 2,
            body: "привет".as_bytes().to_vec(),
            redelivered: true,
            properties: BasicProperties::default(),
        };
        assert_eq!(message.body_text(), "привет");
    }
}
