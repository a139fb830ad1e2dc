//! Broker adapters.
//!
//! - [`amqp`]: an AMQP 0-9-1 server such as `RabbitMQ`
//! - [`memory`]: an in-process broker for tests and single-process runs

pub mod amqp;
pub mod memory;
