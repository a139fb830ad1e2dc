//! Normalised message text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Text payload of a message.
///
/// Carriage returns and line feeds are replaced by a space and surrounding
/// whitespace is trimmed at construction, so content never contains a
/// newline once it has been accepted into the system. This keeps it safe for
/// transports that frame on newlines.
///
/// # Examples
///
/// ```
/// use chat_relay::message::domain::MessageContent;
///
/// let content = MessageContent::new("  hello\nworld\r\n");
/// assert_eq!(content.as_str(), "hello world");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct MessageContent(String);

impl MessageContent {
    /// Normalises raw text into message content.
    #[must_use]
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(normalise(raw.as_ref()))
    }

    /// Returns the content as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` when no text remains after normalisation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of characters in the content.
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }
}

fn normalise(raw: &str) -> String {
    raw.replace(|ch: char| ch == '\n' || ch == '\r', " ")
        .trim()
        .to_owned()
}

impl From<String> for MessageContent {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for MessageContent {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<MessageContent> for String {
    fn from(value: MessageContent) -> Self {
        value.0
    }
}

impl AsRef<str> for MessageContent {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
