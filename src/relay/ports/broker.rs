//! Message broker port.
//!
//! The contract follows AMQP 0-9-1 semantics: named exchanges route
//! published payloads into bound queues, consumers receive deliveries that
//! stay unacknowledged until acked or rejected, and deliveries a consumer
//! never settled become available again (flagged as redelivered) once that
//! consumer goes away.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Exchange routing behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
    /// Copies every message to every bound queue, ignoring routing keys.
    Fanout,
}

/// A message broker.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Declares an exchange. Redeclaring with the same settings is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::PreconditionFailed`] if the exchange exists
    /// with different settings, or another [`BrokerError`] on failure.
    async fn declare_exchange(
        &self,
        name: &str,
        kind: ExchangeKind,
        durable: bool,
    ) -> BrokerResult<()>;

    /// Declares a queue. Redeclaring with the same settings is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::PreconditionFailed`] if the queue exists with
    /// different settings, or another [`BrokerError`] on failure.
    async fn declare_queue(&self, name: &str, durable: bool) -> BrokerResult<()>;

    /// Binds a queue to an exchange.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::UnknownQueue`] or
    /// [`BrokerError::UnknownExchange`] when either side is missing.
    async fn bind_queue(&self, queue: &str, exchange: &str, routing_key: &str)
    -> BrokerResult<()>;

    /// Publishes a payload to an exchange.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::UnknownExchange`] when the exchange does not
    /// exist, or another [`BrokerError`] on failure.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: Vec<u8>,
        persistent: bool,
    ) -> BrokerResult<()>;

    /// Starts consuming a queue with manual acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::UnknownQueue`] when the queue does not exist.
    async fn consume(&self, queue: &str) -> BrokerResult<Box<dyn DeliveryStream>>;

    /// Deletes a queue; its consumers' streams end.
    ///
    /// # Errors
    ///
    /// Returns a [`BrokerError`] on failure.
    async fn delete_queue(&self, name: &str) -> BrokerResult<()>;

    /// Deletes an exchange and its bindings.
    ///
    /// # Errors
    ///
    /// Returns a [`BrokerError`] on failure.
    async fn delete_exchange(&self, name: &str) -> BrokerResult<()>;

    /// Releases the broker connection. Later operations fail with
    /// [`BrokerError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns a [`BrokerError`] if the connection cannot be closed cleanly.
    async fn close(&self) -> BrokerResult<()>;
}

/// Stream of deliveries from one consumer.
#[async_trait]
pub trait DeliveryStream: Send {
    /// Waits for the next delivery.
    ///
    /// Returns `None` once the queue has been deleted.
    async fn next(&mut self) -> Option<BrokerResult<Delivery>>;
}

/// Settles deliveries on behalf of a consumer.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// Acknowledges the delivery with `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::UnknownDelivery`] if the delivery is no
    /// longer outstanding.
    async fn ack(&self, tag: u64) -> BrokerResult<()>;

    /// Rejects the delivery with `tag`, optionally putting it back in the
    /// queue.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::UnknownDelivery`] if the delivery is no
    /// longer outstanding.
    async fn reject(&self, tag: u64, requeue: bool) -> BrokerResult<()>;
}

/// A message handed to a consumer and awaiting settlement.
pub struct Delivery {
    tag: u64,
    payload: Vec<u8>,
    redelivered: bool,
    acker: Arc<dyn Acknowledger>,
}

impl Delivery {
    /// Creates a delivery settled through `acker`.
    #[must_use]
    pub fn new(
        tag: u64,
        payload: Vec<u8>,
        redelivered: bool,
        acker: Arc<dyn Acknowledger>,
    ) -> Self {
        Self {
            tag,
            payload,
            redelivered,
            acker,
        }
    }

    /// Returns the consumer-scoped delivery tag.
    #[must_use]
    pub const fn tag(&self) -> u64 {
        self.tag
    }

    /// Returns the message body.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns `true` if the message was handed out before and not settled.
    #[must_use]
    pub const fn redelivered(&self) -> bool {
        self.redelivered
    }

    /// Acknowledges the delivery, removing it from the queue.
    ///
    /// # Errors
    ///
    /// See [`Acknowledger::ack`].
    pub async fn ack(self) -> BrokerResult<()> {
        self.acker.ack(self.tag).await
    }

    /// Rejects the delivery.
    ///
    /// # Errors
    ///
    /// See [`Acknowledger::reject`].
    pub async fn reject(self, requeue: bool) -> BrokerResult<()> {
        self.acker.reject(self.tag, requeue).await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("tag", &self.tag)
            .field("bytes", &self.payload.len())
            .field("redelivered", &self.redelivered)
            .finish_non_exhaustive()
    }
}

/// Errors raised by broker operations.
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    /// The named exchange does not exist.
    #[error("exchange '{0}' does not exist")]
    UnknownExchange(String),

    /// The named queue does not exist.
    #[error("queue '{0}' does not exist")]
    UnknownQueue(String),

    /// A resource exists with incompatible settings.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// The delivery tag is not outstanding on this consumer.
    #[error("delivery {0} is not outstanding")]
    UnknownDelivery(u64),

    /// The broker connection has been closed.
    #[error("broker connection is closed")]
    Closed,

    /// The broker connection failed.
    #[error("broker connection failed: {0}")]
    Connection(Arc<dyn std::error::Error + Send + Sync>),
}

impl BrokerError {
    /// Wraps a connection-level failure.
    pub fn connection(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Connection(Arc::new(err))
    }
}
