//! Chat relay: websocket message relaying with two topologies.
//!
//! This crate moves short text messages between connected clients, either
//! through an in-process broadcast hub or through per-recipient mailboxes
//! held by a message broker, with optional persistence of relayed messages.
//!
//! # Architecture
//!
//! The relay follows hexagonal architecture principles:
//!
//! - **Domain**: Pure message, address and connection types
//! - **Ports**: Abstract trait interfaces for transports, brokers and stores
//! - **Adapters**: Concrete implementations of ports (websocket, AMQP and
//!   in-memory brokers, `PostgreSQL` store, in-memory doubles)
//!
//! # Modules
//!
//! - [`message`]: Message model, wire codec, content policy and persistence
//! - [`connection`]: Per-connection read/write pumps, heartbeat and teardown
//! - [`hub`]: In-process broadcast registry
//! - [`relay`]: Broker-backed per-recipient mailboxes
//! - [`server`]: HTTP surface exposing both topologies
//! - [`config`]: Process configuration
//! - [`telemetry`]: Tracing subscriber installation

pub mod config;
pub mod connection;
pub mod hub;
pub mod message;
pub mod relay;
pub mod server;
pub mod telemetry;
