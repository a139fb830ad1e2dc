//! Bounded outbound queue of a connection.
//!
//! An [`Outbox`] is the producer side held by the hub, the relay consumer
//! and the connection's own pumps; the [`OutboxReceiver`] is owned by the
//! write pump. Closing is explicit and happens at most once: after
//! [`Outbox::close`] producers fail fast (blocked producers are woken), and
//! the receiver yields the items still queued before reporting the end of
//! the queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::domain::OutboundItem;

/// Default number of items an outbound queue holds before producers block.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// Errors returned when enqueueing into an outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OutboxError {
    /// The queue has been closed by its owner.
    #[error("outbound queue is closed")]
    Closed,
    /// The write pump has gone away.
    #[error("outbound queue receiver has been dropped")]
    Disconnected,
    /// The queue stayed full for longer than the allowed wait.
    #[error("outbound queue stayed full for {0:?}")]
    Timeout(Duration),
}

/// Producer handle of a connection's outbound queue.
///
/// Clones share the same queue and the same closed flag.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::Sender<OutboundItem>,
    closed: CancellationToken,
    shut: Arc<AtomicBool>,
}

/// Consumer side of an outbound queue, owned by the write pump.
#[derive(Debug)]
pub struct OutboxReceiver {
    rx: mpsc::Receiver<OutboundItem>,
    closed: CancellationToken,
}

impl Outbox {
    /// Creates a queue holding up to `capacity` items (at least one).
    ///
    /// # Examples
    ///
    /// ```
    /// use chat_relay::connection::outbox::Outbox;
    ///
    /// let (outbox, _receiver) = Outbox::new(8);
    /// assert!(outbox.close());
    /// assert!(!outbox.close());
    /// ```
    #[must_use]
    pub fn new(capacity: usize) -> (Self, OutboxReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let closed = CancellationToken::new();
        (
            Self {
                tx,
                closed: closed.clone(),
                shut: Arc::new(AtomicBool::new(false)),
            },
            OutboxReceiver { rx, closed },
        )
    }

    /// Enqueues an item, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`OutboxError::Closed`] if the queue is or becomes closed while
    /// waiting, and [`OutboxError::Disconnected`] if the receiver is gone.
    pub async fn send(&self, item: impl Into<OutboundItem>) -> Result<(), OutboxError> {
        if self.is_closed() {
            return Err(OutboxError::Closed);
        }
        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(OutboxError::Closed),
            sent = self.tx.send(item.into()) => sent.map_err(|_| OutboxError::Disconnected),
        }
    }

    /// Enqueues an item, giving up once the queue has stayed full for `wait`.
    ///
    /// # Errors
    ///
    /// Returns [`OutboxError::Timeout`] when the wait elapses, otherwise the
    /// same errors as [`Outbox::send`].
    pub async fn send_timeout(
        &self,
        item: impl Into<OutboundItem>,
        wait: Duration,
    ) -> Result<(), OutboxError> {
        tokio::time::timeout(wait, self.send(item))
            .await
            .map_err(|_| OutboxError::Timeout(wait))?
    }

    /// Closes the queue.
    ///
    /// Returns `true` only for the call that actually closed it.
    pub fn close(&self) -> bool {
        if self.shut.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.closed.cancel();
        true
    }

    /// Returns `true` once the queue has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shut.load(Ordering::Acquire)
    }

    /// Returns `true` if both handles refer to the same queue.
    #[must_use]
    pub fn same_queue(&self, other: &Self) -> bool {
        self.tx.same_channel(&other.tx)
    }
}

impl OutboxReceiver {
    /// Receives the next item.
    ///
    /// Returns `None` once the queue is closed and drained, or when every
    /// producer has been dropped.
    pub async fn recv(&mut self) -> Option<OutboundItem> {
        tokio::select! {
            biased;
            item = self.rx.recv() => item,
            () = self.closed.cancelled() => self.rx.try_recv().ok(),
        }
    }

    /// Returns `true` once the producer side has closed the queue.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}
