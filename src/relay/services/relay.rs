//! Mailbox publishing and consumption.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::{
    domain::ConnectionId,
    outbox::{Outbox, OutboxError},
    ports::Membership,
};
use crate::message::{
    codec,
    domain::{Message, ParticipantId},
};
use crate::relay::{
    mailbox::Mailbox,
    ports::broker::{Broker, BrokerError, ExchangeKind},
};

/// Routing key used for every mailbox binding and publish.
const ROUTING_KEY: &str = "";

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

/// Errors raised by relay operations.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The broker rejected an operation.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// The message could not be encoded.
    #[error("message encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// Group addresses have no mailbox.
    #[error("cannot relay to group address '{0}'")]
    GroupAddress(String),
}

/// Why a consume loop ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsumeOutcome {
    /// The cancellation token fired.
    Cancelled,
    /// The mailbox queue was deleted.
    MailboxDeleted,
    /// The sink refused a delivery, which stays unacknowledged.
    DeliveryRefused,
}

/// Failure to hand a delivered message to its recipient.
#[derive(Debug, Clone, Error)]
pub enum DeliverError {
    /// The recipient's outbound queue is not accepting items.
    #[error(transparent)]
    Outbox(#[from] OutboxError),

    /// The recipient refused the message.
    #[error("delivery refused: {0}")]
    Refused(String),
}

/// Destination of the messages consumed from a mailbox.
#[async_trait]
pub trait MessageSink: Send {
    /// Hands one message to the recipient.
    ///
    /// # Errors
    ///
    /// Returns [`DeliverError`] when the recipient cannot take the message;
    /// the consume loop then stops without acknowledging it.
    async fn deliver(&mut self, message: Message) -> Result<(), DeliverError>;
}

#[async_trait]
impl MessageSink for Outbox {
    async fn deliver(&mut self, message: Message) -> Result<(), DeliverError> {
        Ok(self.send(message).await?)
    }
}

/// Publishes into and consumes from participants' mailboxes.
pub struct RelayService<B>
where
    B: Broker,
{
    broker: Arc<B>,
}

impl<B> Clone for RelayService<B>
where
    B: Broker,
{
    fn clone(&self) -> Self {
        Self {
            broker: Arc::clone(&self.broker),
        }
    }
}

impl<B> RelayService<B>
where
    B: Broker,
{
    /// Creates a relay service over `broker`.
    #[must_use]
    pub const fn new(broker: Arc<B>) -> Self {
        Self { broker }
    }

    /// Returns the underlying broker.
    #[must_use]
    pub const fn broker(&self) -> &Arc<B> {
        &self.broker
    }

    /// Declares the participant's exchange, queue and binding.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Broker`] when a declaration fails.
    pub async fn ensure_mailbox(&self, participant: &ParticipantId) -> RelayResult<Mailbox> {
        let mailbox = Mailbox::for_participant(participant);
        self.broker
            .declare_exchange(mailbox.exchange(), ExchangeKind::Fanout, true)
            .await?;
        self.broker.declare_queue(mailbox.queue(), true).await?;
        self.broker
            .bind_queue(mailbox.queue(), mailbox.exchange(), ROUTING_KEY)
            .await?;
        Ok(mailbox)
    }

    /// Publishes a message into its addressee's mailbox.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::GroupAddress`] for group recipients, and the
    /// errors of [`RelayService::publish_to`] otherwise.
    pub async fn publish(&self, message: &Message) -> RelayResult<()> {
        let recipient = message
            .to()
            .participant_id()
            .ok_or_else(|| RelayError::GroupAddress(message.to().to_string()))?;
        self.publish_to(message, recipient).await
    }

    /// Publishes a message into `participant`'s mailbox, declaring the
    /// mailbox first so participants who never connected still receive it.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Encode`] or [`RelayError::Broker`].
    pub async fn publish_to(
        &self,
        message: &Message,
        participant: &ParticipantId,
    ) -> RelayResult<()> {
        let mailbox = self.ensure_mailbox(participant).await?;
        let payload = codec::encode_message(message)?;
        self.broker
            .publish(mailbox.exchange(), ROUTING_KEY, payload, true)
            .await?;
        debug!(id = %message.id(), %participant, "message published");
        Ok(())
    }

    /// Consumes `participant`'s mailbox into `sink` until cancelled, until
    /// the mailbox is deleted or until the sink refuses a message.
    ///
    /// Each delivery is acknowledged only after `sink` accepted it.
    /// Undecodable deliveries are rejected without requeue.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Broker`] when the broker fails.
    pub async fn consume<S>(
        &self,
        participant: &ParticipantId,
        cancel: &CancellationToken,
        sink: &mut S,
    ) -> RelayResult<ConsumeOutcome>
    where
        S: MessageSink + ?Sized,
    {
        let mailbox = Mailbox::for_participant(participant);
        let mut deliveries = self.broker.consume(mailbox.queue()).await?;
        info!(%participant, queue = mailbox.queue(), "consuming mailbox");

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(ConsumeOutcome::Cancelled),
                next = deliveries.next() => next,
            };
            let Some(received) = next else {
                info!(%participant, "mailbox deleted");
                return Ok(ConsumeOutcome::MailboxDeleted);
            };
            let delivery = received?;

            let message = match codec::decode_message(delivery.payload()) {
                Ok(message) => message,
                Err(err) => {
                    warn!(
                        %participant,
                        error = %err,
                        tag = delivery.tag(),
                        "rejecting undecodable delivery"
                    );
                    if let Err(reject_err) = delivery.reject(false).await {
                        warn!(%participant, error = %reject_err, "reject failed");
                    }
                    continue;
                }
            };

            let id = message.id();
            let delivered = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(ConsumeOutcome::Cancelled),
                delivered = sink.deliver(message) => delivered,
            };
            if let Err(err) = delivered {
                debug!(%participant, %id, error = %err, "delivery refused, leaving unacknowledged");
                return Ok(ConsumeOutcome::DeliveryRefused);
            }
            if let Err(err) = delivery.ack().await {
                warn!(%participant, %id, error = %err, "acknowledgement failed");
            }
        }
    }

    /// Deletes the participant's queue and exchange.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Broker`] when a deletion fails.
    pub async fn delete_mailbox(&self, participant: &ParticipantId) -> RelayResult<()> {
        let mailbox = Mailbox::for_participant(participant);
        self.broker.delete_queue(mailbox.queue()).await?;
        self.broker.delete_exchange(mailbox.exchange()).await?;
        info!(%participant, "mailbox deleted");
        Ok(())
    }

    /// Binds a connection's outbound queue to `participant`'s mailbox.
    ///
    /// The returned attachment is the connection's membership; releasing it
    /// closes the queue.
    #[must_use]
    pub fn attach(&self, participant: ParticipantId, outbox: Outbox) -> MailboxAttachment {
        MailboxAttachment {
            participant,
            outbox,
        }
    }
}

/// A connection's binding to its participant's mailbox.
#[derive(Debug, Clone)]
pub struct MailboxAttachment {
    participant: ParticipantId,
    outbox: Outbox,
}

impl MailboxAttachment {
    /// Returns the attached participant.
    #[must_use]
    pub const fn participant(&self) -> &ParticipantId {
        &self.participant
    }
}

#[async_trait]
impl Membership for MailboxAttachment {
    async fn release(&self, connection: ConnectionId) {
        if self.outbox.close() {
            info!(%connection, participant = %self.participant, "detached from mailbox");
        }
    }
}
