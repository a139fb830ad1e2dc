//! Shared helpers for relay tests.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::message::domain::{Address, Message, MessageContent, MessageId, ParticipantId};
use crate::relay::services::{DeliverError, MessageSink};

pub fn participant(raw: &str) -> ParticipantId {
    ParticipantId::new(raw).expect("valid identity")
}

pub fn message(id: i64, from: &str, to: &str, content: &str) -> Message {
    Message::from_persisted(
        MessageId::new(id),
        chrono::Utc::now(),
        participant(from),
        to.parse::<Address>().expect("valid address"),
        MessageContent::new(content),
    )
}

/// Sink recording messages; cancels `stop` once `stop_after` arrived and
/// refuses everything once `refuse` is set.
pub struct RecordingSink {
    pub received: Vec<Message>,
    pub stop: CancellationToken,
    pub stop_after: usize,
    pub refuse: bool,
}

impl RecordingSink {
    pub fn stopping_after(stop_after: usize) -> Self {
        Self {
            received: Vec::new(),
            stop: CancellationToken::new(),
            stop_after,
            refuse: false,
        }
    }

    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::stopping_after(usize::MAX)
        }
    }

    pub fn contents(&self) -> Vec<&str> {
        self.received
            .iter()
            .map(|m| m.content().as_str())
            .collect()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn deliver(&mut self, message: Message) -> Result<(), DeliverError> {
        if self.refuse {
            return Err(DeliverError::Refused("test sink refuses".to_owned()));
        }
        self.received.push(message);
        if self.received.len() >= self.stop_after {
            self.stop.cancel();
        }
        Ok(())
    }
}
