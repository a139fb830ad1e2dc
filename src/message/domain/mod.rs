//! Domain types for the message subsystem.
//!
//! This module contains pure domain types with no infrastructure dependencies.
//! All types are immutable after construction and serialisable via serde.

mod address;
mod content;
mod ids;
mod message;

pub use address::{Address, GROUP_PREFIX, USER_PREFIX};
pub use content::MessageContent;
pub use ids::{DisplayName, MessageId, MessageIdGenerator, ParticipantId};
pub use message::Message;
