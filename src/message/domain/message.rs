//! The chat message exchanged between participants.

use super::{Address, MessageContent, MessageId, ParticipantId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// A chat message.
///
/// Messages are the immutable unit moved by the hub and the relay. Delivery
/// state (queued, acknowledged, redelivered) lives with the transport that
/// carries a message, never on the message itself.
///
/// # Invariants
///
/// - `content` is normalised (see [`MessageContent`])
/// - Messages cannot be modified after creation
///
/// # Examples
///
/// ```
/// use chat_relay::message::domain::{
///     Address, Message, MessageContent, MessageId, ParticipantId,
/// };
/// use mockable::DefaultClock;
///
/// let from = ParticipantId::new("alice").expect("valid identity");
/// let to = Address::group("lobby").expect("valid group");
/// let message = Message::new(
///     MessageId::new(1),
///     from,
///     to,
///     MessageContent::new("hello"),
///     &DefaultClock,
/// );
///
/// assert_eq!(message.content().as_str(), "hello");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier, also the idempotency key for consumers.
    id: MessageId,

    /// When the message entered the server.
    #[serde(alias = "time")]
    created_at: DateTime<Utc>,

    /// Sending participant.
    from: ParticipantId,

    /// Destination address.
    to: Address,

    /// Normalised text payload.
    content: MessageContent,
}

impl Message {
    /// Creates a message stamped with the clock's current time.
    #[must_use]
    pub fn new(
        id: MessageId,
        from: ParticipantId,
        to: Address,
        content: MessageContent,
        clock: &impl Clock,
    ) -> Self {
        Self::from_persisted(id, clock.utc(), from, to, content)
    }

    /// Reconstructs a message with an existing timestamp, for example when
    /// loading history from a store.
    #[must_use]
    pub const fn from_persisted(
        id: MessageId,
        created_at: DateTime<Utc>,
        from: ParticipantId,
        to: Address,
        content: MessageContent,
    ) -> Self {
        Self {
            id,
            created_at,
            from,
            to,
            content,
        }
    }

    /// Returns the message identifier.
    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.id
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the sender.
    #[must_use]
    pub const fn from(&self) -> &ParticipantId {
        &self.from
    }

    /// Returns the destination address.
    #[must_use]
    pub const fn to(&self) -> &Address {
        &self.to
    }

    /// Returns the text payload.
    #[must_use]
    pub const fn content(&self) -> &MessageContent {
        &self.content
    }

    /// Returns `true` when the participant sent the message or is its
    /// individual recipient.
    #[must_use]
    pub fn involves(&self, participant: &ParticipantId) -> bool {
        &self.from == participant || self.to.participant_id() == Some(participant)
    }
}
