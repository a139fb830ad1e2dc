//! Port trait definitions for the message subsystem.
//!
//! Ports define the abstract interfaces that the relay path requires from
//! infrastructure. Adapters implement these ports to connect it to
//! databases and other collaborators.

pub mod policy;
pub mod store;

pub use policy::ContentPolicy;
pub use store::{AppendOutcome, MessageStore, StoreError, StoreResult};
