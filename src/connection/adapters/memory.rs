//! In-memory implementation of the transport port.
//!
//! [`duplex`] returns the server side of a channel, which a
//! [`Connection`](crate::connection::services::Connection) runs over, and a
//! [`PeerEnd`] that plays the client: it injects frames and observes
//! everything the write pump emits.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::connection::{
    domain::Frame,
    ports::transport::{FrameChannel, FrameSink, FrameSource, TransportError, TransportResult},
};

#[derive(Debug, Default)]
struct Shared {
    closes: AtomicUsize,
    fail_writes: AtomicBool,
}

/// Server side of an in-memory channel.
#[derive(Debug)]
pub struct MemoryChannel {
    peer: String,
    to_peer: mpsc::Sender<Frame>,
    from_peer: mpsc::Receiver<TransportResult<Frame>>,
    shared: Arc<Shared>,
}

/// Client side of an in-memory channel.
#[derive(Debug)]
pub struct PeerEnd {
    to_server: Option<mpsc::Sender<TransportResult<Frame>>>,
    from_server: mpsc::Receiver<Frame>,
    shared: Arc<Shared>,
}

/// Creates a connected channel pair buffering up to `capacity` frames in
/// each direction.
///
/// # Examples
///
/// ```
/// use chat_relay::connection::adapters::memory::duplex;
/// use chat_relay::connection::ports::FrameChannel;
///
/// let (channel, _peer) = duplex("client-1", 16);
/// assert_eq!(channel.peer(), "client-1");
/// ```
#[must_use]
pub fn duplex(peer: impl Into<String>, capacity: usize) -> (MemoryChannel, PeerEnd) {
    let (to_peer, from_server) = mpsc::channel(capacity.max(1));
    let (to_server, from_peer) = mpsc::channel(capacity.max(1));
    let shared = Arc::new(Shared::default());
    (
        MemoryChannel {
            peer: peer.into(),
            to_peer,
            from_peer,
            shared: Arc::clone(&shared),
        },
        PeerEnd {
            to_server: Some(to_server),
            from_server,
            shared,
        },
    )
}

impl FrameChannel for MemoryChannel {
    fn peer(&self) -> String {
        self.peer.clone()
    }

    fn split(self) -> (Box<dyn FrameSink>, Box<dyn FrameSource>) {
        (
            Box::new(MemorySink {
                tx: Some(self.to_peer),
                shared: self.shared,
            }),
            Box::new(MemorySource { rx: self.from_peer }),
        )
    }
}

struct MemorySink {
    tx: Option<mpsc::Sender<Frame>>,
    shared: Arc<Shared>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, frame: Frame) -> TransportResult<()> {
        if self.shared.fail_writes.load(Ordering::Acquire) {
            return Err(TransportError::io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "peer stopped reading",
            )));
        }
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(frame).await.map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.shared.closes.fetch_add(1, Ordering::AcqRel);
        self.tx.take().map(drop).ok_or(TransportError::Closed)
    }
}

struct MemorySource {
    rx: mpsc::Receiver<TransportResult<Frame>>,
}

#[async_trait]
impl FrameSource for MemorySource {
    async fn recv(&mut self) -> Option<TransportResult<Frame>> {
        self.rx.recv().await
    }
}

impl PeerEnd {
    /// Sends a frame to the server.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the server side has gone away
    /// or the peer already hung up.
    pub async fn send(&self, frame: Frame) -> TransportResult<()> {
        let tx = self.to_server.as_ref().ok_or(TransportError::Closed)?;
        tx.send(Ok(frame)).await.map_err(|_| TransportError::Closed)
    }

    /// Sends a text frame to the server.
    ///
    /// # Errors
    ///
    /// See [`PeerEnd::send`].
    pub async fn send_text(&self, text: impl Into<String>) -> TransportResult<()> {
        self.send(Frame::Text(text.into())).await
    }

    /// Makes the server's next read fail with `err`.
    ///
    /// # Errors
    ///
    /// See [`PeerEnd::send`].
    pub async fn inject_error(&self, err: TransportError) -> TransportResult<()> {
        let tx = self.to_server.as_ref().ok_or(TransportError::Closed)?;
        tx.send(Err(err)).await.map_err(|_| TransportError::Closed)
    }

    /// Ends the stream towards the server without a close frame.
    pub fn hang_up(&mut self) {
        self.to_server = None;
    }

    /// Makes every later server write fail.
    pub fn fail_writes(&self) {
        self.shared.fail_writes.store(true, Ordering::Release);
    }

    /// Receives the next frame written by the server, control frames
    /// included. Returns `None` once the server has closed its side.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.from_server.recv().await
    }

    /// Receives the next text or close frame, answering pings on the way.
    pub async fn recv_data(&mut self) -> Option<Frame> {
        loop {
            match self.from_server.recv().await? {
                Frame::Ping(payload) => {
                    if self.send(Frame::Pong(payload)).await.is_err() {
                        return None;
                    }
                }
                Frame::Pong(_) => {}
                frame => return Some(frame),
            }
        }
    }

    /// Returns how many times the server closed its sending half.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.shared.closes.load(Ordering::Acquire)
    }
}
