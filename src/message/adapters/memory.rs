//! In-memory implementation of the `MessageStore` port.
//!
//! Provides a simple, thread-safe store without database dependencies. Used
//! by tests and by the server when no database is configured.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::{Clock, DefaultClock};

use crate::message::{
    domain::{Message, MessageId, ParticipantId},
    ports::store::{AppendOutcome, MessageStore, StoreError, StoreResult},
};

#[derive(Debug, Clone)]
struct StoredMessage {
    message: Message,
    deleted_at: Option<DateTime<Utc>>,
}

/// In-memory implementation of [`MessageStore`].
///
/// Thread-safe via internal [`RwLock`]. Clones share the same storage.
/// Soft deletes are stamped with the store's clock.
///
/// # Example
///
/// ```
/// use chat_relay::message::adapters::memory::InMemoryMessageStore;
///
/// let store = InMemoryMessageStore::new();
/// assert!(store.is_empty());
/// ```
#[derive(Clone)]
pub struct InMemoryMessageStore {
    messages: Arc<RwLock<HashMap<MessageId, StoredMessage>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryMessageStore {
    /// Creates an empty store using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages: Arc::default(),
            clock: Arc::new(DefaultClock),
        }
    }

    /// Replaces the clock used to stamp soft deletes.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns when `id` was soft-deleted, if it was.
    #[must_use]
    pub fn deleted_at(&self, id: MessageId) -> Option<DateTime<Utc>> {
        self.messages
            .read()
            .ok()
            .and_then(|guard| guard.get(&id).and_then(|stored| stored.deleted_at))
    }

    /// Returns the number of stored messages, soft-deleted ones included.
    ///
    /// Returns `0` if the internal lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.read().map(|guard| guard.len()).unwrap_or(0)
    }

    /// Returns `true` if no messages are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryMessageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryMessageStore")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

fn poisoned(err: impl std::fmt::Display) -> StoreError {
    StoreError::connection(format!("lock poisoned: {err}"))
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append(&self, message: &Message) -> StoreResult<AppendOutcome> {
        let mut guard = self.messages.write().map_err(poisoned)?;

        if guard.contains_key(&message.id()) {
            return Ok(AppendOutcome::AlreadyPresent);
        }

        guard.insert(
            message.id(),
            StoredMessage {
                message: message.clone(),
                deleted_at: None,
            },
        );
        Ok(AppendOutcome::Inserted)
    }

    async fn find_by_participant(
        &self,
        participant: &ParticipantId,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Message>> {
        let guard = self.messages.read().map_err(poisoned)?;

        let mut history: Vec<Message> = guard
            .values()
            .filter(|stored| stored.deleted_at.is_none())
            .filter(|stored| stored.message.involves(participant))
            .map(|stored| stored.message.clone())
            .collect();

        // Most recent first; identifiers break timestamp ties.
        history.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        if let Some(max) = limit {
            history.truncate(max);
        }

        Ok(history)
    }

    async fn soft_delete(&self, id: MessageId) -> StoreResult<bool> {
        let mut guard = self.messages.write().map_err(poisoned)?;

        match guard.get_mut(&id) {
            Some(stored) if stored.deleted_at.is_none() => {
                stored.deleted_at = Some(self.clock.utc());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
