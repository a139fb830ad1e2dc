//! Transport frames and outbound queue items.

use crate::message::domain::Message;

/// Reason carried by the close frame a write pump sends after draining.
pub const CLOSE_REASON: &str = "bye bye";

/// A single frame on a bidirectional transport channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text payload.
    Text(String),
    /// Liveness probe.
    Ping(Vec<u8>),
    /// Answer to a probe.
    Pong(Vec<u8>),
    /// Orderly shutdown with an optional reason.
    Close(Option<String>),
}

impl Frame {
    /// Returns the text payload for text frames.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// An item waiting in a connection's outbound queue.
///
/// Everything the write pump emits passes through the queue, heartbeat
/// probes included, so the write pump remains the sole writer of the
/// transport. Pings from the peer are answered by the transport itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundItem {
    /// A chat message, rendered in the connection's wire format.
    Message(Message),
    /// A heartbeat probe (sent as a ping frame).
    Probe,
}

impl From<Message> for OutboundItem {
    fn from(message: Message) -> Self {
        Self::Message(message)
    }
}
