//! Hub owner task and its request handle.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::connection::{
    domain::{ConnectionId, OutboundItem},
    outbox::{Outbox, OutboxError},
    ports::Membership,
};
use crate::message::domain::Message;

/// Default number of pending requests before callers wait for the owner.
pub const DEFAULT_REQUEST_CAPACITY: usize = 64;

/// Result type for hub requests.
pub type HubResult<T> = Result<T, HubError>;

/// Errors returned by hub requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HubError {
    /// The owner task has stopped or was never started.
    #[error("hub is not running")]
    Stopped,
}

/// Hub settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Capacity of the request queue feeding the owner task.
    pub request_capacity: usize,
    /// Longest time a broadcast waits on one member's full queue before the
    /// member is forcibly unregistered. `None` waits indefinitely.
    pub enqueue_timeout: Option<Duration>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            request_capacity: DEFAULT_REQUEST_CAPACITY,
            enqueue_timeout: None,
        }
    }
}

#[derive(Debug)]
enum HubRequest {
    Register {
        id: ConnectionId,
        outbox: Outbox,
        ack: oneshot::Sender<()>,
    },
    Unregister {
        id: ConnectionId,
        ack: oneshot::Sender<bool>,
    },
    Broadcast(Message),
    Members(oneshot::Sender<Vec<ConnectionId>>),
}

/// The hub: owns the request queue and starts the owner task.
///
/// The owner task keeps running while the hub or any [`HubHandle`] is alive.
/// Once all of them are dropped it stops and closes every remaining
/// member's queue.
///
/// # Examples
///
/// ```
/// use chat_relay::hub::{Hub, HubConfig};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let hub = Hub::new(HubConfig::default());
/// assert!(hub.start().is_some());
/// assert!(hub.start().is_none());
/// # }
/// ```
#[derive(Debug)]
pub struct Hub {
    config: HubConfig,
    handle: HubHandle,
    requests: Mutex<Option<mpsc::Receiver<HubRequest>>>,
}

impl Hub {
    /// Creates a hub whose owner task is not yet running.
    #[must_use]
    pub fn new(config: HubConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.request_capacity.max(1));
        Self {
            config,
            handle: HubHandle { tx },
            requests: Mutex::new(Some(rx)),
        }
    }

    /// Returns a handle for sending requests to the owner task.
    #[must_use]
    pub fn handle(&self) -> HubHandle {
        self.handle.clone()
    }

    /// Spawns the owner task.
    ///
    /// Only the first call starts it; later calls return `None`.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        let requests = self
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        info!("hub started");
        Some(tokio::spawn(run_owner(requests, self.config.enqueue_timeout)))
    }
}

/// Cloneable request handle for a running hub.
#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubRequest>,
}

impl HubHandle {
    /// Adds a member and waits until the owner has recorded it.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Stopped`] when the owner task is not running.
    pub async fn register(&self, id: ConnectionId, outbox: Outbox) -> HubResult<()> {
        let (ack, done) = oneshot::channel();
        self.request(HubRequest::Register { id, outbox, ack }).await?;
        done.await.map_err(|_| HubError::Stopped)
    }

    /// Removes a member, closing its queue, and waits until the owner has
    /// processed the request.
    ///
    /// Returns `false` when the connection was not a member.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Stopped`] when the owner task is not running.
    pub async fn unregister(&self, id: ConnectionId) -> HubResult<bool> {
        let (ack, done) = oneshot::channel();
        self.request(HubRequest::Unregister { id, ack }).await?;
        done.await.map_err(|_| HubError::Stopped)
    }

    /// Queues a message for delivery to every member.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Stopped`] when the owner task is not running.
    pub async fn broadcast(&self, message: Message) -> HubResult<()> {
        self.request(HubRequest::Broadcast(message)).await
    }

    /// Returns a snapshot of the current members.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Stopped`] when the owner task is not running.
    pub async fn members(&self) -> HubResult<Vec<ConnectionId>> {
        let (reply, snapshot) = oneshot::channel();
        self.request(HubRequest::Members(reply)).await?;
        snapshot.await.map_err(|_| HubError::Stopped)
    }

    async fn request(&self, request: HubRequest) -> HubResult<()> {
        self.tx.send(request).await.map_err(|_| HubError::Stopped)
    }
}

/// Hub membership of one connection; releasing it unregisters the
/// connection.
#[derive(Debug, Clone)]
pub struct HubMembership {
    hub: HubHandle,
}

impl HubMembership {
    /// Wraps a hub handle.
    #[must_use]
    pub const fn new(hub: HubHandle) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl Membership for HubMembership {
    async fn release(&self, connection: ConnectionId) {
        match self.hub.unregister(connection).await {
            Ok(removed) => debug!(%connection, removed, "hub membership released"),
            // A stopped owner has already closed every member queue.
            Err(err) => debug!(%connection, error = %err, "hub already stopped"),
        }
    }
}

async fn run_owner(mut requests: mpsc::Receiver<HubRequest>, enqueue_timeout: Option<Duration>) {
    let mut members: HashMap<ConnectionId, Outbox> = HashMap::new();

    while let Some(request) = requests.recv().await {
        match request {
            HubRequest::Register { id, outbox, ack } => {
                members.insert(id, outbox);
                info!(connection = %id, members = members.len(), "member registered");
                if ack.send(()).is_err() {
                    debug!(connection = %id, "register caller went away");
                }
            }
            HubRequest::Unregister { id, ack } => {
                let removed = remove_member(&mut members, id);
                if ack.send(removed).is_err() {
                    debug!(connection = %id, "unregister caller went away");
                }
            }
            HubRequest::Broadcast(message) => {
                broadcast(&mut members, &message, enqueue_timeout).await;
            }
            HubRequest::Members(reply) => {
                if reply.send(members.keys().copied().collect()).is_err() {
                    debug!("members caller went away");
                }
            }
        }
    }

    for (id, outbox) in members.drain() {
        outbox.close();
        debug!(connection = %id, "member closed on hub shutdown");
    }
    info!("hub stopped");
}

fn remove_member(members: &mut HashMap<ConnectionId, Outbox>, id: ConnectionId) -> bool {
    let Some(outbox) = members.remove(&id) else {
        return false;
    };
    outbox.close();
    info!(connection = %id, members = members.len(), "member unregistered");
    true
}

async fn broadcast(
    members: &mut HashMap<ConnectionId, Outbox>,
    message: &Message,
    enqueue_timeout: Option<Duration>,
) {
    let mut stalled = Vec::new();

    for (id, outbox) in members.iter() {
        let item = OutboundItem::Message(message.clone());
        let sent = match enqueue_timeout {
            Some(wait) => outbox.send_timeout(item, wait).await,
            None => outbox.send(item).await,
        };
        match sent {
            Ok(()) => {}
            Err(OutboxError::Timeout(wait)) => {
                warn!(connection = %id, ?wait, "member queue stayed full, unregistering");
                stalled.push(*id);
            }
            Err(err) => debug!(connection = %id, error = %err, "member not accepting messages"),
        }
    }

    for id in stalled {
        remove_member(members, id);
    }
}
