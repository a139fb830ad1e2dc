//! Wire encoding for messages.
//!
//! The broker topology carries JSON objects with `id`, `created_at`, `from`,
//! `to` and `content` fields (`time` is accepted for `created_at` on
//! decode). The hub topology renders delimited text frames of the form
//! `<from>:<content>`, which relies on content being newline-free.

use super::{
    domain::{Address, Message},
    error::DecodeError,
};
use serde::Deserialize;

/// Frame rendering used by a connection's write pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    /// One JSON-encoded [`Message`] per text frame.
    #[default]
    Json,
    /// `<from>:<content>` text frames.
    Delimited,
}

/// Separator between sender and content in delimited frames.
pub const DELIMITER: char = ':';

/// A message as submitted by a client.
///
/// Clients supply only the recipient and the text; the server assigns the
/// identifier, timestamp and sender. Any other fields in the payload are
/// ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundEnvelope {
    /// Requested recipient, if given.
    #[serde(default)]
    pub to: Option<Address>,
    /// Raw, not yet normalised text.
    pub content: String,
}

impl InboundEnvelope {
    /// Resolves the recipient, falling back to the connection's default.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::MissingRecipient`] when neither is present.
    pub fn recipient_or(&self, fallback: Option<&Address>) -> Result<Address, DecodeError> {
        self.to
            .clone()
            .or_else(|| fallback.cloned())
            .ok_or(DecodeError::MissingRecipient)
    }
}

/// Decodes a client-submitted JSON text frame.
///
/// # Errors
///
/// Returns [`DecodeError::Json`] when the frame is not a valid envelope.
pub fn decode_inbound(text: &str) -> Result<InboundEnvelope, DecodeError> {
    Ok(serde_json::from_str(text)?)
}

/// Encodes a message for publication to a broker.
///
/// # Errors
///
/// Returns a serialisation error if the message cannot be encoded.
pub fn encode_message(message: &Message) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(message)
}

/// Decodes a broker payload into a message.
///
/// # Errors
///
/// Returns [`DecodeError::Json`] for malformed payloads, including invalid
/// identities or addresses.
pub fn decode_message(payload: &[u8]) -> Result<Message, DecodeError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Renders a message as the text of an outbound frame.
///
/// # Errors
///
/// Returns a serialisation error if JSON encoding fails.
pub fn render(message: &Message, format: WireFormat) -> serde_json::Result<String> {
    match format {
        WireFormat::Json => serde_json::to_string(message),
        WireFormat::Delimited => Ok(format!(
            "{}{DELIMITER}{}",
            message.from(),
            message.content()
        )),
    }
}
