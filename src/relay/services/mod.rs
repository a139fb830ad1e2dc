//! Relay services: mailbox publishing and consumption, and client sessions.

mod relay;
pub mod session;

pub use relay::{
    ConsumeOutcome, DeliverError, MailboxAttachment, MessageSink, RelayError, RelayResult,
    RelayService,
};
