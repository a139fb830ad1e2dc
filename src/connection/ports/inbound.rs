//! Inbound text frame handling port.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::message::error::{DecodeError, MessageDomainError};

/// Topology-specific handling of the text frames a read pump receives.
#[async_trait]
pub trait InboundHandler: Send {
    /// Handles one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`InboundError`]. Only errors for which
    /// [`InboundError::is_fatal`] holds end the connection; the read pump
    /// drops the frame and continues for the rest.
    async fn on_text(&mut self, text: String) -> Result<(), InboundError>;
}

/// Failure while handling an inbound frame.
#[derive(Debug, Clone, Error)]
pub enum InboundError {
    /// The frame could not be decoded.
    #[error("undecodable frame: {0}")]
    Decode(String),

    /// A decoded field held an invalid value.
    #[error(transparent)]
    Domain(#[from] MessageDomainError),

    /// The content policy refused the message.
    #[error("message rejected by content policy")]
    Rejected,

    /// The message could not be forwarded and the connection cannot
    /// continue.
    #[error("forwarding failed: {0}")]
    Forward(Arc<dyn std::error::Error + Send + Sync>),
}

impl InboundError {
    /// Wraps a forwarding failure.
    pub fn forward(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Forward(Arc::new(err))
    }

    /// Returns `true` when the connection should be torn down.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Forward(_))
    }
}

impl From<DecodeError> for InboundError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Domain(domain) => Self::Domain(domain),
            other => Self::Decode(other.to_string()),
        }
    }
}
