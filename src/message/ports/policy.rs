//! Content policy port.
//!
//! A single decision point gates every inbound message before it reaches
//! the hub or the relay. Rejected messages are dropped silently: they are not
//! delivered, not persisted and not reported back to the sender.

use crate::message::domain::MessageContent;

/// Decides whether inbound content may enter the system.
///
/// Implementations must be pure and cheap; they run on the read pump for
/// every frame.
pub trait ContentPolicy: Send + Sync {
    /// Returns `true` when the content is accepted.
    fn accept(&self, content: &MessageContent) -> bool;
}
