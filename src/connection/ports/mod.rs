//! Port trait definitions for the connection subsystem.
//!
//! - [`transport`]: the framed channel a connection runs over
//! - [`membership`]: release of a connection's hub or mailbox membership
//! - [`inbound`]: topology-specific handling of inbound text frames

pub mod inbound;
pub mod membership;
pub mod transport;

pub use inbound::{InboundError, InboundHandler};
pub use membership::{Membership, NoMembership};
pub use transport::{FrameChannel, FrameSink, FrameSource, TransportError, TransportResult};
