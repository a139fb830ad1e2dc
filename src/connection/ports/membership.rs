//! Membership release port.

use async_trait::async_trait;

use crate::connection::domain::ConnectionId;

/// The membership a connection holds for its active lifetime.
///
/// In the hub topology this is registration with the hub; in the relay
/// topology it is the binding to the participant's mailbox. Releasing it
/// closes the connection's outbound queue. Implementations must tolerate
/// repeated calls.
#[async_trait]
pub trait Membership: Send + Sync {
    /// Releases the membership of `connection`.
    async fn release(&self, connection: ConnectionId);
}

/// Membership that holds nothing to release.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMembership;

#[async_trait]
impl Membership for NoMembership {
    async fn release(&self, _connection: ConnectionId) {}
}
