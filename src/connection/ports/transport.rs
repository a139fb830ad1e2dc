//! Framed transport channel port.
//!
//! A transport yields one bidirectional channel per accepted client. The
//! channel is split into a sending half, owned by the write pump, and a
//! receiving half, owned by the read pump.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::connection::domain::Frame;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Sending half of a framed channel.
#[async_trait]
pub trait FrameSink: Send {
    /// Writes a single frame.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the frame cannot be written. Any
    /// error is fatal to the connection.
    async fn send(&mut self, frame: Frame) -> TransportResult<()>;

    /// Closes the sending half.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the underlying channel reports a
    /// failure while closing.
    async fn close(&mut self) -> TransportResult<()>;
}

/// Receiving half of a framed channel.
#[async_trait]
pub trait FrameSource: Send {
    /// Receives the next frame.
    ///
    /// Returns `None` when the peer has ended the stream.
    async fn recv(&mut self) -> Option<TransportResult<Frame>>;
}

/// A bidirectional framed channel yielded by a transport.
pub trait FrameChannel: Send {
    /// Remote identity of the peer, used for diagnostics.
    fn peer(&self) -> String;

    /// Splits the channel into its sending and receiving halves.
    fn split(self) -> (Box<dyn FrameSink>, Box<dyn FrameSource>);
}

/// Errors raised by a transport channel.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The channel has already been closed.
    #[error("transport channel is closed")]
    Closed,

    /// The peer sent a frame the connection cannot interpret.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The underlying channel failed.
    #[error("transport failure: {0}")]
    Io(Arc<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// Wraps an underlying channel error.
    pub fn io(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Io(Arc::new(err))
    }

    /// Creates a protocol violation error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}
