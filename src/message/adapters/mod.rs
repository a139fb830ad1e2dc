//! Persistence adapters for the message module.
//!
//! This module provides concrete implementations of the [`MessageStore`]
//! port. Adapters handle all infrastructure concerns while the domain
//! remains pure.
//!
//! # Available Adapters
//!
//! - [`memory::InMemoryMessageStore`]: Thread-safe in-memory storage for tests
//!   and single-process deployments
//! - [`postgres::PostgresMessageStore`]: `PostgreSQL` persistence using Diesel
//!
//! [`MessageStore`]: crate::message::ports::store::MessageStore

pub mod memory;
pub mod postgres;
