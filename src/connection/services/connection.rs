//! Connection lifecycle.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::{HeartbeatConfig, HeartbeatSupervisor, Teardown, read_pump, write_pump};
use crate::connection::{
    domain::{CloseCause, ConnectionId},
    outbox::{Outbox, OutboxReceiver},
    ports::{FrameChannel, FrameSink, FrameSource, InboundHandler, Membership},
};
use crate::message::{codec::WireFormat, domain::ParticipantId};

/// Per-connection runtime options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionOptions {
    format: WireFormat,
    heartbeat: Option<HeartbeatConfig>,
}

impl ConnectionOptions {
    /// Creates options with JSON frames and no heartbeat.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            format: WireFormat::Json,
            heartbeat: None,
        }
    }

    /// Sets the rendering used for outbound messages.
    #[must_use]
    pub const fn with_format(mut self, format: WireFormat) -> Self {
        self.format = format;
        self
    }

    /// Enables the heartbeat supervisor.
    #[must_use]
    pub const fn with_heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    /// Returns the outbound wire format.
    #[must_use]
    pub const fn format(&self) -> WireFormat {
        self.format
    }

    /// Returns the heartbeat timing, if enabled.
    #[must_use]
    pub const fn heartbeat(&self) -> Option<HeartbeatConfig> {
        self.heartbeat
    }
}

/// A client connection that has not started its pumps yet.
///
/// The outbound queue exists from construction, so items may be enqueued
/// (for example a history replay) before or after [`Connection::start`].
pub struct Connection {
    id: ConnectionId,
    peer: String,
    owner: Option<ParticipantId>,
    outbox: Outbox,
    receiver: OutboxReceiver,
    sink: Box<dyn FrameSink>,
    source: Box<dyn FrameSource>,
}

impl Connection {
    /// Wraps a transport channel with an outbound queue of `capacity` items.
    #[must_use]
    pub fn new<C>(channel: C, capacity: usize) -> Self
    where
        C: FrameChannel,
    {
        let peer = channel.peer();
        let (sink, source) = channel.split();
        let (outbox, receiver) = Outbox::new(capacity);
        Self {
            id: ConnectionId::new(),
            peer,
            owner: None,
            outbox,
            receiver,
            sink,
            source,
        }
    }

    /// Returns the connection identifier.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the peer's remote identity.
    #[must_use]
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Binds the connection to the participant whose mailbox it serves.
    #[must_use]
    pub fn with_owner(mut self, owner: ParticipantId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Returns the participant the connection serves, if bound to one.
    #[must_use]
    pub const fn owner(&self) -> Option<&ParticipantId> {
        self.owner.as_ref()
    }

    /// Returns the producer handle of the outbound queue.
    #[must_use]
    pub const fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Spawns the read pump, the write pump and, when configured, the
    /// heartbeat.
    ///
    /// `membership` is released by the first teardown trigger.
    pub fn start<H>(
        self,
        handler: H,
        membership: Arc<dyn Membership>,
        options: ConnectionOptions,
    ) -> RunningConnection
    where
        H: InboundHandler + 'static,
    {
        let Self {
            id,
            peer,
            owner,
            outbox,
            receiver,
            sink,
            source,
        } = self;

        info!(connection = %id, %peer, ?owner, "connection started");
        let teardown = Teardown::new(id, membership);
        let (pong_tx, pong_rx) = watch::channel(0_u64);
        let mut tasks = JoinSet::new();

        tasks.spawn(write_pump(sink, receiver, options.format(), teardown.clone()));
        tasks.spawn(read_pump(source, handler, pong_tx, teardown.clone()));
        if let Some(config) = options.heartbeat() {
            let supervisor = HeartbeatSupervisor::new(config);
            let heartbeat = supervisor.run(outbox, pong_rx, teardown.clone());
            tasks.spawn(async move {
                let state = heartbeat.await;
                debug!(connection = %id, ?state, "heartbeat stopped");
            });
        }

        RunningConnection {
            id,
            teardown,
            tasks,
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// A connection whose tasks are running.
#[derive(Debug)]
pub struct RunningConnection {
    id: ConnectionId,
    teardown: Teardown,
    tasks: JoinSet<()>,
}

impl RunningConnection {
    /// Returns the connection identifier.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns a handle to the connection's teardown trigger.
    #[must_use]
    pub fn teardown(&self) -> Teardown {
        self.teardown.clone()
    }

    /// Runs an additional task for the lifetime of the connection.
    ///
    /// The task should race its work against the teardown token; the
    /// connection is only closed once every task has finished.
    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    /// Triggers teardown with `cause` (a no-op if it already ran).
    pub async fn shutdown(&self, cause: CloseCause) -> bool {
        self.teardown.run(cause).await
    }

    /// Waits for every task to finish and returns the recorded close cause.
    pub async fn join(mut self) -> Option<CloseCause> {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(err) = joined {
                error!(connection = %self.id, error = %err, "connection task failed");
                self.teardown.run(CloseCause::Shutdown).await;
            }
        }
        self.teardown.mark_closed();
        let cause = self.teardown.cause();
        info!(connection = %self.id, cause = ?cause, "connection finished");
        cause
    }
}
