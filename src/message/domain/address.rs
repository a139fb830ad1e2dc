//! Message addressing.

use super::ParticipantId;
use crate::message::error::MessageDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix marking an individual recipient.
pub const USER_PREFIX: &str = "u:";

/// Prefix marking a group recipient.
pub const GROUP_PREFIX: &str = "g:";

/// Destination of a message.
///
/// Individual addresses render as the bare participant identity; group
/// addresses carry the `g:` prefix. Parsing also accepts an explicit `u:`
/// prefix for individuals.
///
/// # Examples
///
/// ```
/// use chat_relay::message::domain::Address;
///
/// let user: Address = "42".parse().expect("valid address");
/// assert!(user.participant_id().is_some());
///
/// let group: Address = "g:lobby".parse().expect("valid address");
/// assert!(group.is_group());
/// assert_eq!(group.to_string(), "g:lobby");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Address {
    /// A single participant.
    Participant(ParticipantId),
    /// A named group of participants.
    Group(ParticipantId),
}

impl Address {
    /// Builds an individual address.
    #[must_use]
    pub const fn participant(id: ParticipantId) -> Self {
        Self::Participant(id)
    }

    /// Builds a group address.
    ///
    /// # Errors
    ///
    /// Returns [`MessageDomainError`] when the group name is not a valid
    /// handle.
    pub fn group(name: impl Into<String>) -> Result<Self, MessageDomainError> {
        Ok(Self::Group(ParticipantId::new(name)?))
    }

    /// Returns the addressed participant for individual addresses.
    #[must_use]
    pub const fn participant_id(&self) -> Option<&ParticipantId> {
        match self {
            Self::Participant(id) => Some(id),
            Self::Group(_) => None,
        }
    }

    /// Returns `true` when the address names a group.
    #[must_use]
    pub const fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }
}

impl FromStr for Address {
    type Err = MessageDomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if let Some(name) = trimmed.strip_prefix(GROUP_PREFIX) {
            return Ok(Self::Group(
                ParticipantId::new(name)
                    .map_err(|_| MessageDomainError::InvalidAddress(value.to_owned()))?,
            ));
        }
        let identity = trimmed.strip_prefix(USER_PREFIX).unwrap_or(trimmed);
        ParticipantId::new(identity)
            .map(Self::Participant)
            .map_err(|_| MessageDomainError::InvalidAddress(value.to_owned()))
    }
}

impl TryFrom<String> for Address {
    type Error = MessageDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_string()
    }
}

impl From<ParticipantId> for Address {
    fn from(value: ParticipantId) -> Self {
        Self::Participant(value)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Participant(id) => write!(f, "{id}"),
            Self::Group(name) => write!(f, "{GROUP_PREFIX}{name}"),
        }
    }
}
