//! Transport adapters.
//!
//! - [`memory`]: an in-process duplex channel for tests and embedding
//! - [`websocket`]: axum websocket upgrade channels

pub mod memory;
pub mod websocket;
