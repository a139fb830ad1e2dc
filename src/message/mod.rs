//! Chat message model, wire codec, content policy and persistence.
//!
//! # Architecture
//!
//! The module follows hexagonal architecture principles:
//!
//! - **Domain**: Pure domain types ([`domain::Message`], [`domain::Address`],
//!   [`domain::MessageContent`], identifiers)
//! - **Ports**: Abstract trait interfaces ([`ports::store::MessageStore`],
//!   [`ports::policy::ContentPolicy`])
//! - **Adapters**: Concrete stores ([`adapters::memory::InMemoryMessageStore`],
//!   [`adapters::postgres::PostgresMessageStore`])
//! - **Codec**: JSON and delimited frame encodings ([`codec`])
//! - **Policy**: The default inbound content gate ([`policy`])
//!
//! # Example
//!
//! ```
//! use chat_relay::message::codec::{self, WireFormat};
//! use chat_relay::message::domain::{Address, Message, MessageContent, MessageId, ParticipantId};
//! use mockable::DefaultClock;
//!
//! let message = Message::new(
//!     MessageId::new(7),
//!     ParticipantId::new("alice").expect("valid identity"),
//!     Address::group("lobby").expect("valid group"),
//!     MessageContent::new("hi\nthere"),
//!     &DefaultClock,
//! );
//!
//! let frame = codec::render(&message, WireFormat::Delimited).expect("rendered");
//! assert_eq!(frame, "alice:hi there");
//! ```

pub mod adapters;
pub mod codec;
pub mod domain;
pub mod error;
pub mod policy;
pub mod ports;

#[cfg(test)]
mod tests;
