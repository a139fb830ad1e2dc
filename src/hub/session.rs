//! Hub sessions: binding a client connection to the broadcast hub.
//!
//! The first accepted text frame is taken as the participant's display name
//! and announced to the hub; every later accepted frame is broadcast with
//! that name as the sender. Frames are rendered as `<from>:<content>`.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use tracing::{info, warn};

use super::{HubHandle, HubMembership};
use crate::connection::{
    domain::CloseCause,
    outbox::DEFAULT_OUTBOX_CAPACITY,
    ports::{FrameChannel, InboundError, InboundHandler},
    services::{Connection, ConnectionOptions, HeartbeatConfig},
};
use crate::message::{
    codec::WireFormat,
    domain::{
        Address, DisplayName, Message, MessageContent, MessageIdGenerator, ParticipantId,
    },
    ports::ContentPolicy,
};

/// Content of the message announcing a newly named participant.
pub const JOIN_ANNOUNCEMENT: &str = "joined the chat";

/// Shared collaborators for every hub session.
pub struct HubSessionContext<C>
where
    C: Clock + Send + Sync,
{
    hub: HubHandle,
    address: Address,
    policy: Arc<dyn ContentPolicy>,
    ids: Arc<MessageIdGenerator>,
    clock: Arc<C>,
    outbox_capacity: usize,
    heartbeat: Option<HeartbeatConfig>,
}

impl<C> HubSessionContext<C>
where
    C: Clock + Send + Sync,
{
    /// Creates a context broadcasting through `hub` to the group `address`.
    #[must_use]
    pub fn new(
        hub: HubHandle,
        address: Address,
        policy: Arc<dyn ContentPolicy>,
        ids: Arc<MessageIdGenerator>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            hub,
            address,
            policy,
            ids,
            clock,
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            heartbeat: Some(HeartbeatConfig::default()),
        }
    }

    /// Sets the capacity of each connection's outbound queue.
    #[must_use]
    pub const fn with_outbox_capacity(mut self, capacity: usize) -> Self {
        self.outbox_capacity = capacity;
        self
    }

    /// Sets or disables heartbeat supervision.
    #[must_use]
    pub const fn with_heartbeat(mut self, heartbeat: Option<HeartbeatConfig>) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Returns the hub handle.
    #[must_use]
    pub const fn hub(&self) -> &HubHandle {
        &self.hub
    }
}

impl<C> Clone for HubSessionContext<C>
where
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            hub: self.hub.clone(),
            address: self.address.clone(),
            policy: Arc::clone(&self.policy),
            ids: Arc::clone(&self.ids),
            clock: Arc::clone(&self.clock),
            outbox_capacity: self.outbox_capacity,
            heartbeat: self.heartbeat,
        }
    }
}

/// Inbound handler of one hub connection.
pub struct HubSession<C>
where
    C: Clock + Send + Sync,
{
    context: HubSessionContext<C>,
    name: Option<DisplayName>,
}

impl<C> HubSession<C>
where
    C: Clock + Send + Sync,
{
    /// Creates a session whose participant has not named itself yet.
    #[must_use]
    pub const fn new(context: HubSessionContext<C>) -> Self {
        Self {
            context,
            name: None,
        }
    }

    /// Returns the participant's display name once chosen.
    #[must_use]
    pub const fn name(&self) -> Option<&DisplayName> {
        self.name.as_ref()
    }

    fn stamp(&self, from: DisplayName, content: MessageContent) -> Message {
        let clock = &*self.context.clock;
        let id = self.context.ids.next_id(clock.utc());
        let sender = ParticipantId::from(from);
        Message::new(id, sender, self.context.address.clone(), content, clock)
    }
}

#[async_trait]
impl<C> InboundHandler for HubSession<C>
where
    C: Clock + Send + Sync,
{
    async fn on_text(&mut self, text: String) -> Result<(), InboundError> {
        let content = MessageContent::new(text);
        if !self.context.policy.accept(&content) {
            return Err(InboundError::Rejected);
        }

        let message = match &self.name {
            Some(name) => self.stamp(name.clone(), content),
            None => {
                let name = DisplayName::new(content.as_str())?;
                info!(participant = %name, "participant joined hub");
                self.name = Some(name.clone());
                self.stamp(name, MessageContent::new(JOIN_ANNOUNCEMENT))
            }
        };

        self.context
            .hub
            .broadcast(message)
            .await
            .map_err(InboundError::forward)
    }
}

/// Runs one client connection as a hub member until it closes.
///
/// Returns the recorded close cause, or `None` when the hub refused the
/// registration.
pub async fn serve<Ch, C>(channel: Ch, context: HubSessionContext<C>) -> Option<CloseCause>
where
    Ch: FrameChannel,
    C: Clock + Send + Sync + 'static,
{
    let connection = Connection::new(channel, context.outbox_capacity);
    let hub = context.hub.clone();
    if let Err(err) = hub
        .register(connection.id(), connection.outbox().clone())
        .await
    {
        warn!(
            connection = %connection.id(),
            peer = connection.peer(),
            error = %err,
            "hub registration failed"
        );
        return None;
    }

    let mut options = ConnectionOptions::new().with_format(WireFormat::Delimited);
    if let Some(heartbeat) = context.heartbeat {
        options = options.with_heartbeat(heartbeat);
    }
    let running = connection.start(
        HubSession::new(context),
        Arc::new(HubMembership::new(hub)),
        options,
    );
    running.join().await
}
