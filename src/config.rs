//! Process configuration.
//!
//! Every field has a default, so an empty JSON object (or no configuration
//! file at all) yields a working relay. The listen port can additionally be
//! overridden on the command line.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::connection::services::HeartbeatConfig;
use crate::hub::HubConfig;
use crate::message::policy::DefaultContentPolicy;
use crate::relay::services::session::RelaySettings;

/// Default TCP port of the HTTP surface.
pub const DEFAULT_PORT: u16 = 5678;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Read(#[from] std::io::Error),
    /// The configuration file is not valid JSON for [`RelayConfig`].
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Top-level configuration of the relay process.
///
/// # Examples
///
/// ```
/// use chat_relay::config::{DEFAULT_PORT, RelayConfig};
///
/// let config = RelayConfig::from_json(r#"{"max_content_chars": 280}"#).expect("valid config");
/// assert_eq!(config.port, DEFAULT_PORT);
/// assert_eq!(config.policy().max_chars(), Some(280));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Listen port.
    pub port: u16,
    /// Settings of the in-process hub.
    pub hub: HubConfig,
    /// Per-session settings. Outbound capacity and heartbeat timing apply to
    /// hub sessions as well.
    pub sessions: RelaySettings,
    /// Longest accepted message content, in characters.
    pub max_content_chars: Option<usize>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            hub: HubConfig::default(),
            sessions: RelaySettings::default(),
            max_content_chars: None,
        }
    }
}

impl RelayConfig {
    /// Parses configuration from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the document is malformed.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Reads configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read and
    /// [`ConfigError::Parse`] when it is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Returns the content policy described by this configuration.
    #[must_use]
    pub fn policy(&self) -> DefaultContentPolicy {
        self.max_content_chars
            .map_or_else(DefaultContentPolicy::new, |limit| {
                DefaultContentPolicy::new().with_max_chars(limit)
            })
    }

    /// Returns the heartbeat timing shared by both topologies.
    #[must_use]
    pub const fn heartbeat(&self) -> Option<HeartbeatConfig> {
        self.sessions.heartbeat
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::{DEFAULT_PORT, RelayConfig};
    use crate::hub::DEFAULT_REQUEST_CAPACITY;

    #[rstest]
    fn empty_document_yields_defaults() {
        let config = RelayConfig::from_json("{}").expect("valid config");

        assert_eq!(config, RelayConfig::default());
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.hub.request_capacity, DEFAULT_REQUEST_CAPACITY);
        assert!(config.sessions.echo_to_sender);
        assert_eq!(config.policy().max_chars(), None);
    }

    #[rstest]
    fn nested_sections_are_merged_with_defaults() {
        let config = RelayConfig::from_json(
            r#"{
                "hub": {"enqueue_timeout": {"secs": 2, "nanos": 0}},
                "sessions": {"echo_to_sender": false, "heartbeat": null}
            }"#,
        )
        .expect("valid config");

        assert_eq!(config.hub.enqueue_timeout, Some(Duration::from_secs(2)));
        assert_eq!(config.hub.request_capacity, DEFAULT_REQUEST_CAPACITY);
        assert!(!config.sessions.echo_to_sender);
        assert_eq!(config.heartbeat(), None);
    }

    #[rstest]
    fn malformed_documents_are_reported() {
        assert!(RelayConfig::from_json(r#"{"port": "not a port"}"#).is_err());
    }

    #[rstest]
    fn missing_files_are_reported() {
        let result = RelayConfig::load("/nonexistent/chat-relay.json");

        assert!(matches!(result, Err(super::ConfigError::Read(_))));
    }
}
