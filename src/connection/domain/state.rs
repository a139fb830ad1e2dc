//! Connection lifecycle state.

use std::fmt;

/// Lifecycle state of a connection.
///
/// Transitions only move forward: `Active` to `Closing` when teardown first
/// runs, `Closing` to `Closed` once every task of the connection has ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// Pumps are running and the connection holds its membership.
    Active = 0,
    /// Teardown has started; membership has been or is being released.
    Closing = 1,
    /// All tasks have finished.
    Closed = 2,
}

impl ConnectionState {
    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Active,
            1 => Self::Closing,
            _ => Self::Closed,
        }
    }

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The trigger that first started a connection's teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCause {
    /// The peer sent a close frame or ended the stream.
    PeerClosed,
    /// Reading from the transport failed.
    TransportError,
    /// Writing to the transport failed.
    WriteFailed,
    /// The outbound queue was closed by the membership owner.
    QueueClosed,
    /// No pong arrived before the heartbeat deadline.
    HeartbeatTimeout,
    /// The inbound handler reported a fatal error.
    InboundFailed,
    /// The participant's mailbox consumer ended.
    MailboxEnded,
    /// The server is shutting down.
    Shutdown,
}

impl CloseCause {
    /// Returns a short label for logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PeerClosed => "peer_closed",
            Self::TransportError => "transport_error",
            Self::WriteFailed => "write_failed",
            Self::QueueClosed => "queue_closed",
            Self::HeartbeatTimeout => "heartbeat_timeout",
            Self::InboundFailed => "inbound_failed",
            Self::MailboxEnded => "mailbox_ended",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for CloseCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
