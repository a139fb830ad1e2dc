//! Identifier newtypes for messages and participants.
//!
//! Message identifiers are microsecond timestamps taken when a message enters
//! the server; [`MessageIdGenerator`] keeps them strictly increasing within a
//! process so they double as a tie-breaker and as the idempotency key for
//! at-least-once consumers.

use crate::message::error::MessageDomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Unique identifier for a chat message.
///
/// # Examples
///
/// ```
/// use chat_relay::message::domain::MessageId;
///
/// let id = MessageId::new(1_700_000_000_000_000);
/// assert_eq!(id.value(), 1_700_000_000_000_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(i64);

impl MessageId {
    /// Creates a message identifier from a raw value.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the underlying value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl From<i64> for MessageId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issues message identifiers derived from the current time in microseconds.
///
/// Two calls within the same microsecond still yield distinct identifiers:
/// the generator never returns a value lower than or equal to the previous
/// one.
///
/// # Examples
///
/// ```
/// use chat_relay::message::domain::MessageIdGenerator;
/// use chrono::Utc;
///
/// let generator = MessageIdGenerator::new();
/// let now = Utc::now();
/// let first = generator.next_id(now);
/// let second = generator.next_id(now);
/// assert!(second > first);
/// ```
#[derive(Debug, Default)]
pub struct MessageIdGenerator {
    last: AtomicI64,
}

impl MessageIdGenerator {
    /// Creates a generator with no identifiers issued yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    /// Returns the next identifier for a message entering at `now`.
    pub fn next_id(&self, now: DateTime<Utc>) -> MessageId {
        let candidate = now.timestamp_micros();
        let previous = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |prev| {
                Some(candidate.max(prev.saturating_add(1)))
            })
            .unwrap_or_else(|prev| prev);
        MessageId(candidate.max(previous.saturating_add(1)))
    }
}

/// Identity of a chat participant.
///
/// Identities are opaque handles: a numeric user id in the broker topology,
/// or a [`DisplayName`] in the hub topology. Identities built with
/// [`ParticipantId::new`] must be non-empty and may not contain whitespace,
/// since they are embedded in broker resource names.
///
/// # Examples
///
/// ```
/// use chat_relay::message::domain::ParticipantId;
///
/// let id = ParticipantId::new("42").expect("valid identity");
/// assert_eq!(id.as_str(), "42");
/// assert!(ParticipantId::new("  ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Validates and wraps a participant identity.
    ///
    /// # Errors
    ///
    /// Returns [`MessageDomainError::EmptyIdentity`] for blank input and
    /// [`MessageDomainError::InvalidIdentity`] when the value contains
    /// whitespace or control characters.
    pub fn new(value: impl Into<String>) -> Result<Self, MessageDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(MessageDomainError::EmptyIdentity);
        }
        if trimmed
            .chars()
            .any(|ch| ch.is_whitespace() || ch.is_control())
        {
            return Err(MessageDomainError::InvalidIdentity(raw));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ParticipantId {
    type Error = MessageDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ParticipantId> for String {
    fn from(value: ParticipantId) -> Self {
        value.0
    }
}

impl AsRef<str> for ParticipantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<DisplayName> for ParticipantId {
    fn from(name: DisplayName) -> Self {
        Self(name.0)
    }
}

/// Name a hub participant chose for itself.
///
/// Any non-blank text is accepted: runs of whitespace collapse to a single
/// space and control characters are removed. Unlike broker identities a
/// display name may contain spaces, so it never names a mailbox.
///
/// # Examples
///
/// ```
/// use chat_relay::message::domain::DisplayName;
///
/// let name = DisplayName::new("  Alice \t Smith ").expect("valid name");
/// assert_eq!(name.as_str(), "Alice Smith");
/// assert!(DisplayName::new(" \n ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DisplayName(String);

impl DisplayName {
    /// Normalises and wraps a display name.
    ///
    /// # Errors
    ///
    /// Returns [`MessageDomainError::EmptyIdentity`] when nothing remains
    /// after normalisation.
    pub fn new(value: impl AsRef<str>) -> Result<Self, MessageDomainError> {
        let words: Vec<String> = value
            .as_ref()
            .split_whitespace()
            .map(|word| word.chars().filter(|ch| !ch.is_control()).collect::<String>())
            .filter(|word| !word.is_empty())
            .collect();
        if words.is_empty() {
            return Err(MessageDomainError::EmptyIdentity);
        }
        Ok(Self(words.join(" ")))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
