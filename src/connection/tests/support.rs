//! Shared helpers for connection tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::connection::{
    domain::ConnectionId,
    outbox::Outbox,
    ports::{InboundError, InboundHandler, Membership},
};
use crate::message::domain::{Address, Message, MessageContent, MessageId, ParticipantId};

/// Membership that closes the connection's outbox and counts releases.
#[derive(Debug)]
pub struct ClosingMembership {
    outbox: Outbox,
    releases: AtomicUsize,
}

impl ClosingMembership {
    pub fn new(outbox: Outbox) -> Arc<Self> {
        Arc::new(Self {
            outbox,
            releases: AtomicUsize::new(0),
        })
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Membership for ClosingMembership {
    async fn release(&self, _connection: ConnectionId) {
        self.releases.fetch_add(1, Ordering::AcqRel);
        self.outbox.close();
    }
}

/// Handler that records texts; `skip` is rejected and `boom` is fatal.
pub struct RecordingHandler {
    seen: Arc<Mutex<Vec<String>>>,
}

impl RecordingHandler {
    pub fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                seen: Arc::clone(&seen),
            },
            seen,
        )
    }
}

#[async_trait]
impl InboundHandler for RecordingHandler {
    async fn on_text(&mut self, text: String) -> Result<(), InboundError> {
        match text.as_str() {
            "skip" => Err(InboundError::Rejected),
            "boom" => Err(InboundError::forward(std::io::Error::other("hub gone"))),
            _ => {
                self.seen.lock().expect("lock").push(text);
                Ok(())
            }
        }
    }
}

pub fn seen(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    log.lock().expect("lock").clone()
}

pub fn message(id: i64, from: &str, content: &str) -> Message {
    Message::from_persisted(
        MessageId::new(id),
        chrono::Utc::now(),
        ParticipantId::new(from).expect("valid identity"),
        Address::group("lobby").expect("valid group"),
        MessageContent::new(content),
    )
}
