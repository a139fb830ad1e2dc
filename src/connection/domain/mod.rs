//! Domain types for connections: identifiers, frames and lifecycle state.

mod frame;
mod ids;
mod state;

pub use frame::{CLOSE_REASON, Frame, OutboundItem};
pub use ids::ConnectionId;
pub use state::{CloseCause, ConnectionState};
