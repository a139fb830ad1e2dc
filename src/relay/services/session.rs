//! Relay sessions: binding a client connection to the participant's mailbox.
//!
//! On connect the session makes sure the mailbox exists, replays recent
//! history from the store (oldest first) and only then starts consuming the
//! mailbox, so history always precedes live traffic. Inbound frames are
//! JSON envelopes `{"to": ..., "content": ...}`; `to` may be omitted when
//! the connection was opened with a default target. Accepted messages are
//! published first and stored in the background, so a slow store never
//! holds up delivery.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{ConsumeOutcome, DeliverError, MessageSink, RelayService};
use crate::connection::{
    domain::CloseCause,
    outbox::{DEFAULT_OUTBOX_CAPACITY, Outbox},
    ports::{FrameChannel, InboundError, InboundHandler},
    services::{Connection, ConnectionOptions, HeartbeatConfig},
};
use crate::message::{
    codec::{self, WireFormat},
    domain::{Address, Message, MessageContent, MessageId, MessageIdGenerator, ParticipantId},
    ports::{ContentPolicy, MessageStore},
};
use crate::relay::ports::Broker;

/// Default number of history messages replayed on connect.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Default number of recently delivered message ids a session remembers.
pub const DEFAULT_DEDUPE_WINDOW: usize = 1024;

/// Per-session behaviour of the relay topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Capacity of each connection's outbound queue.
    pub outbox_capacity: usize,
    /// Heartbeat timing; `None` disables the heartbeat.
    pub heartbeat: Option<HeartbeatConfig>,
    /// Maximum number of history messages replayed on connect; `None`
    /// replays everything.
    pub history_limit: Option<usize>,
    /// Whether a sender's own messages are also published to their mailbox.
    pub echo_to_sender: bool,
    /// Number of delivered message ids remembered for duplicate suppression.
    pub dedupe_window: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            heartbeat: Some(HeartbeatConfig::default()),
            history_limit: Some(DEFAULT_HISTORY_LIMIT),
            echo_to_sender: true,
            dedupe_window: DEFAULT_DEDUPE_WINDOW,
        }
    }
}

/// Shared collaborators for every relay session.
pub struct RelaySessionContext<B, C>
where
    B: Broker,
    C: Clock + Send + Sync,
{
    relay: RelayService<B>,
    store: Arc<dyn MessageStore>,
    policy: Arc<dyn ContentPolicy>,
    ids: Arc<MessageIdGenerator>,
    clock: Arc<C>,
    settings: RelaySettings,
}

impl<B, C> RelaySessionContext<B, C>
where
    B: Broker,
    C: Clock + Send + Sync,
{
    /// Creates a context with default settings.
    #[must_use]
    pub fn new(
        relay: RelayService<B>,
        store: Arc<dyn MessageStore>,
        policy: Arc<dyn ContentPolicy>,
        ids: Arc<MessageIdGenerator>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            relay,
            store,
            policy,
            ids,
            clock,
            settings: RelaySettings::default(),
        }
    }

    /// Replaces the session settings.
    #[must_use]
    pub const fn with_settings(mut self, settings: RelaySettings) -> Self {
        self.settings = settings;
        self
    }

    /// Returns the relay service.
    #[must_use]
    pub const fn relay(&self) -> &RelayService<B> {
        &self.relay
    }

    /// Returns the session settings.
    #[must_use]
    pub const fn settings(&self) -> &RelaySettings {
        &self.settings
    }
}

impl<B, C> Clone for RelaySessionContext<B, C>
where
    B: Broker,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            relay: self.relay.clone(),
            store: Arc::clone(&self.store),
            policy: Arc::clone(&self.policy),
            ids: Arc::clone(&self.ids),
            clock: Arc::clone(&self.clock),
            settings: self.settings,
        }
    }
}

/// Bounded set of recently delivered message ids.
///
/// # Examples
///
/// ```
/// use chat_relay::message::domain::MessageId;
/// use chat_relay::relay::services::session::RecentIds;
///
/// let mut seen = RecentIds::new(2);
/// assert!(seen.insert(MessageId::new(1)));
/// assert!(!seen.insert(MessageId::new(1)));
/// assert!(seen.insert(MessageId::new(2)));
/// assert!(seen.insert(MessageId::new(3)));
/// assert!(seen.insert(MessageId::new(1)));
/// ```
#[derive(Debug, Clone)]
pub struct RecentIds {
    capacity: usize,
    order: VecDeque<MessageId>,
    members: HashSet<MessageId>,
}

impl RecentIds {
    /// Creates a set remembering up to `capacity` ids.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            members: HashSet::new(),
        }
    }

    /// Records `id`, returning `false` if it was already present.
    pub fn insert(&mut self, id: MessageId) -> bool {
        if !self.members.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }
        true
    }

    /// Returns `true` if `id` is remembered.
    #[must_use]
    pub fn contains(&self, id: MessageId) -> bool {
        self.members.contains(&id)
    }
}

/// Forwards consumed messages into a connection, skipping duplicates.
///
/// When history was replayed before consuming, mailbox messages at or
/// below the oldest replayed id are skipped too: they predate what the
/// client has already been shown and would arrive out of order.
#[derive(Debug)]
pub struct MailboxForwarder {
    outbox: Outbox,
    seen: RecentIds,
    floor: Option<MessageId>,
}

impl MailboxForwarder {
    /// Creates a forwarder that already knows the ids in `seen`.
    #[must_use]
    pub const fn new(outbox: Outbox, seen: RecentIds) -> Self {
        Self {
            outbox,
            seen,
            floor: None,
        }
    }

    /// Skips every message whose id is at or below `floor`.
    #[must_use]
    pub const fn with_floor(mut self, floor: Option<MessageId>) -> Self {
        self.floor = floor;
        self
    }

    fn already_shown(&self, id: MessageId) -> bool {
        self.floor.is_some_and(|floor| id <= floor) || self.seen.contains(id)
    }
}

#[async_trait]
impl MessageSink for MailboxForwarder {
    async fn deliver(&mut self, message: Message) -> Result<(), DeliverError> {
        if self.already_shown(message.id()) {
            debug!(id = %message.id(), "skipping already delivered message");
            return Ok(());
        }
        let id = message.id();
        self.outbox.send(message).await?;
        self.seen.insert(id);
        Ok(())
    }
}

/// Inbound handler of one relay connection.
pub struct RelaySession<B, C>
where
    B: Broker,
    C: Clock + Send + Sync,
{
    context: RelaySessionContext<B, C>,
    participant: ParticipantId,
    default_target: Option<Address>,
}

impl<B, C> RelaySession<B, C>
where
    B: Broker,
    C: Clock + Send + Sync,
{
    /// Creates the handler for `participant`.
    #[must_use]
    pub const fn new(
        context: RelaySessionContext<B, C>,
        participant: ParticipantId,
        default_target: Option<Address>,
    ) -> Self {
        Self {
            context,
            participant,
            default_target,
        }
    }

    fn stamp(&self, to: Address, content: MessageContent) -> Message {
        let clock = &*self.context.clock;
        let id = self.context.ids.next_id(clock.utc());
        Message::new(id, self.participant.clone(), to, content, clock)
    }
}

#[async_trait]
impl<B, C> InboundHandler for RelaySession<B, C>
where
    B: Broker,
    C: Clock + Send + Sync,
{
    async fn on_text(&mut self, text: String) -> Result<(), InboundError> {
        let envelope = codec::decode_inbound(&text)?;
        let to = envelope.recipient_or(self.default_target.as_ref())?;
        let content = MessageContent::new(envelope.content);
        if !self.context.policy.accept(&content) {
            return Err(InboundError::Rejected);
        }

        let message = self.stamp(to, content);
        if let Err(err) = self.context.relay.publish(&message).await {
            warn!(
                id = %message.id(),
                to = %message.to(),
                error = %err,
                "publishing message failed"
            );
        }
        let sent_to_self = message.to().participant_id() == Some(&self.participant);
        if self.context.settings.echo_to_sender && !sent_to_self {
            if let Err(err) = self
                .context
                .relay
                .publish_to(&message, &self.participant)
                .await
            {
                warn!(id = %message.id(), error = %err, "echo to sender failed");
            }
        }

        let store = Arc::clone(&self.context.store);
        tokio::spawn(async move {
            if let Err(err) = store.append(&message).await {
                warn!(id = %message.id(), error = %err, "storing message failed");
            }
        });
        Ok(())
    }
}

/// Runs one client connection bound to `participant`'s mailbox until it
/// closes.
///
/// Returns the recorded close cause, or `None` when the mailbox could not
/// be prepared.
pub async fn serve<Ch, B, C>(
    channel: Ch,
    participant: ParticipantId,
    default_target: Option<Address>,
    context: RelaySessionContext<B, C>,
) -> Option<CloseCause>
where
    Ch: FrameChannel,
    B: Broker + 'static,
    C: Clock + Send + Sync + 'static,
{
    let relay = context.relay.clone();
    let store = Arc::clone(&context.store);
    let settings = context.settings;

    if let Err(err) = relay.ensure_mailbox(&participant).await {
        warn!(%participant, error = %err, "mailbox unavailable");
        return None;
    }

    let connection =
        Connection::new(channel, settings.outbox_capacity).with_owner(participant.clone());
    let outbox = connection.outbox().clone();
    let attachment = relay.attach(participant.clone(), outbox.clone());
    let mut options = ConnectionOptions::new().with_format(WireFormat::Json);
    if let Some(heartbeat) = settings.heartbeat {
        options = options.with_heartbeat(heartbeat);
    }
    let mut running = connection.start(
        RelaySession::new(context, participant.clone(), default_target),
        Arc::new(attachment),
        options,
    );

    let mut seen = RecentIds::new(settings.dedupe_window);
    let mut floor = None;
    match store
        .find_by_participant(&participant, settings.history_limit)
        .await
    {
        Ok(history) => {
            debug!(%participant, count = history.len(), "replaying history");
            floor = history.iter().map(Message::id).min();
            for message in history.into_iter().rev() {
                seen.insert(message.id());
                if outbox.send(message).await.is_err() {
                    break;
                }
            }
        }
        Err(err) => warn!(%participant, error = %err, "history unavailable"),
    }

    let teardown = running.teardown();
    running.spawn(async move {
        let mut forwarder = MailboxForwarder::new(outbox, seen).with_floor(floor);
        match relay
            .consume(&participant, teardown.token(), &mut forwarder)
            .await
        {
            Ok(ConsumeOutcome::Cancelled) => return,
            Ok(outcome) => info!(%participant, ?outcome, "mailbox consumer ended"),
            Err(err) => warn!(%participant, error = %err, "mailbox consumer failed"),
        }
        teardown.run(CloseCause::MailboxEnded).await;
    });

    running.join().await
}
