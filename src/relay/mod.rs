//! Broker-backed per-recipient relay.
//!
//! Every participant owns a durable mailbox: a fanout exchange named
//! `<id>_exchange` bound to a durable queue named `<id>_queue`. Messages are
//! published into the addressee's mailbox and consumed from a participant's
//! own mailbox into their active connection, acknowledging each delivery
//! only after it has been handed to the connection's outbound queue.
//!
//! - Mailbox naming in [`mailbox`]
//! - The broker port in [`ports`]
//! - The AMQP and in-memory brokers in [`adapters`]
//! - Publishing, consuming and client sessions in [`services`]

pub mod adapters;
pub mod mailbox;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
