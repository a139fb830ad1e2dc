//! In-process broadcast hub.
//!
//! A single owner task holds the set of live connections and is the only
//! code that mutates it. Everything else talks to the owner through a
//! [`HubHandle`]: registration and unregistration complete only after the
//! owner has processed them, and broadcasts are fanned out to every member
//! (the sender included) in the order the owner receives them.
//!
//! [`session`] binds a client connection to the hub: the first accepted text
//! frame names the participant, later frames are broadcast as messages.

mod registry;
pub mod session;

pub use registry::{
    DEFAULT_REQUEST_CAPACITY, Hub, HubConfig, HubError, HubHandle, HubMembership, HubResult,
};

#[cfg(test)]
mod tests;
