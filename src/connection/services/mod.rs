//! Connection services: pumps, heartbeat supervision and teardown.

mod connection;
mod heartbeat;
mod pumps;
mod teardown;

pub use connection::{Connection, ConnectionOptions, RunningConnection};
pub use heartbeat::{
    DEFAULT_PING_PERIOD, DEFAULT_PONG_WAIT, HeartbeatConfig, HeartbeatState, HeartbeatSupervisor,
};
pub use pumps::{CLOSE_GRACE, read_pump, write_pump};
pub use teardown::{RELEASE_GRACE, Teardown};
