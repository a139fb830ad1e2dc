//! Mailbox resource naming.

use crate::message::domain::ParticipantId;

/// Suffix of a mailbox's exchange name.
pub const EXCHANGE_SUFFIX: &str = "_exchange";

/// Suffix of a mailbox's queue name.
pub const QUEUE_SUFFIX: &str = "_queue";

/// Broker resource names making up one participant's mailbox.
///
/// # Examples
///
/// ```
/// use chat_relay::message::domain::ParticipantId;
/// use chat_relay::relay::mailbox::Mailbox;
///
/// let id = ParticipantId::new("42").expect("valid identity");
/// let mailbox = Mailbox::for_participant(&id);
/// assert_eq!(mailbox.exchange(), "42_exchange");
/// assert_eq!(mailbox.queue(), "42_queue");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mailbox {
    exchange: String,
    queue: String,
}

impl Mailbox {
    /// Returns the mailbox names for `participant`.
    #[must_use]
    pub fn for_participant(participant: &ParticipantId) -> Self {
        Self {
            exchange: format!("{participant}{EXCHANGE_SUFFIX}"),
            queue: format!("{participant}{QUEUE_SUFFIX}"),
        }
    }

    /// Returns the exchange name.
    #[must_use]
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Returns the queue name.
    #[must_use]
    pub fn queue(&self) -> &str {
        &self.queue
    }
}
