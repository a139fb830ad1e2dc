//! Error types for message construction and decoding.
//!
//! Uses `thiserror` for typed variants that callers can inspect. Decode
//! failures are never fatal to a connection: the offending frame or delivery
//! is dropped and processing continues.

use thiserror::Error;

/// Errors raised while building domain values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageDomainError {
    /// A participant identity was blank.
    #[error("participant identity must not be empty")]
    EmptyIdentity,

    /// A participant identity contained whitespace or control characters.
    #[error("invalid participant identity '{0}'")]
    InvalidIdentity(String),

    /// An address could not be parsed.
    #[error("invalid address '{0}'")]
    InvalidAddress(String),
}

/// Errors raised while decoding a wire payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload was not valid JSON for the expected shape.
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload named no recipient and the connection has no default.
    #[error("message has no recipient")]
    MissingRecipient,

    /// A field held an invalid domain value.
    #[error(transparent)]
    Domain(#[from] MessageDomainError),
}
