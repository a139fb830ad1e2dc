//! Diesel model types for chat message persistence.
//!
//! These types are the boundary between database rows and domain messages.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::schema::chat_messages;
use crate::message::{
    domain::{Address, Message, MessageContent, MessageId, ParticipantId},
    ports::store::{StoreError, StoreResult},
};

/// Database row representation of a chat message.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = chat_messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ChatMessageRow {
    /// Message identifier.
    pub id: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Sending participant.
    pub sender: String,
    /// Rendered destination address.
    pub recipient: String,
    /// Message text.
    pub content: String,
    /// Soft-delete timestamp.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ChatMessageRow {
    /// Converts the row into a domain message.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] when the stored sender or
    /// recipient is no longer a valid domain value.
    pub fn into_domain(self) -> StoreResult<Message> {
        let from = ParticipantId::new(self.sender)
            .map_err(|e| StoreError::serialization(e.to_string()))?;
        let to = self
            .recipient
            .parse::<Address>()
            .map_err(|e| StoreError::serialization(e.to_string()))?;
        Ok(Message::from_persisted(
            MessageId::new(self.id),
            self.created_at,
            from,
            to,
            MessageContent::new(self.content),
        ))
    }
}

/// Data for inserting a new chat message.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = chat_messages)]
pub struct NewChatMessage {
    /// Message identifier.
    pub id: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Sending participant.
    pub sender: String,
    /// Rendered destination address.
    pub recipient: String,
    /// Message text.
    pub content: String,
}

impl NewChatMessage {
    /// Builds an insert record from a domain message.
    #[must_use]
    pub fn from_domain(message: &Message) -> Self {
        Self {
            id: message.id().value(),
            created_at: message.created_at(),
            sender: message.from().to_string(),
            recipient: message.to().to_string(),
            content: message.content().as_str().to_owned(),
        }
    }
}
