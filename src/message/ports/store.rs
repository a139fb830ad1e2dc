//! Store port for message persistence and history queries.
//!
//! The store sits on the relay path only. Callers never let a store failure
//! hold back delivery: failures are logged and the message still flows.

use crate::message::domain::{Message, MessageId, ParticipantId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The message was stored.
    Inserted,
    /// A message with the same identifier was already stored; nothing changed.
    AlreadyPresent,
}

/// Port for message persistence operations.
///
/// # Implementation Notes
///
/// Implementations must ensure:
/// - `append` is idempotent on the message identifier, so redelivered
///   messages can be persisted again without error
/// - history excludes soft-deleted messages
/// - concurrent access is handled safely
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Appends a message.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing store is unavailable.
    async fn append(&self, message: &Message) -> StoreResult<AppendOutcome>;

    /// Returns messages sent by or addressed to the participant,
    /// most-recent-first, truncated to `limit` entries when given.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    async fn find_by_participant(
        &self,
        participant: &ParticipantId,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Message>>;

    /// Marks a message as deleted. Returns `false` when no live message has
    /// the identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    async fn soft_delete(&self, id: MessageId) -> StoreResult<bool>;
}

/// Errors returned by store adapters.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("database error: {0}")]
    Database(Arc<dyn std::error::Error + Send + Sync>),

    /// A stored row could not be converted into a message.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The store could not be reached.
    #[error("connection error: {0}")]
    Connection(String),
}

impl StoreError {
    /// Creates a database error from any error type.
    #[must_use]
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Database(Arc::new(err))
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Creates a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }
}
