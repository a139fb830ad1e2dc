//! Per-client connection handling shared by both delivery topologies.
//!
//! A [`services::Connection`] wraps one framed transport channel and runs
//! three cooperating tasks for its lifetime: a read pump, a write pump and a
//! heartbeat supervisor. The only handle other components hold is the
//! connection's [`outbox::Outbox`], through which they enqueue outbound
//! items and which the membership owner closes exactly once.
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Transport adapters in [`adapters`]
//! - Pumps, heartbeat and teardown in [`services`]

pub mod adapters;
pub mod domain;
pub mod outbox;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
