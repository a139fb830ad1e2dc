//! Heartbeat supervision.
//!
//! The supervisor sends a probe through the outbound queue every period and
//! then waits for a pong. Any pong clears the wait; if the deadline passes
//! first the supervisor moves to [`HeartbeatState::TimedOut`] and triggers
//! teardown once.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, warn};

use super::Teardown;
use crate::connection::{
    domain::{CloseCause, OutboundItem},
    outbox::Outbox,
};

/// Default interval between probes.
pub const DEFAULT_PING_PERIOD: Duration = Duration::from_secs(3);

/// Default time allowed for a pong to arrive after a probe.
pub const DEFAULT_PONG_WAIT: Duration = Duration::from_secs(5);

/// Heartbeat timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Interval between probes.
    pub period: Duration,
    /// Deadline for the pong answering a probe.
    pub deadline: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PING_PERIOD,
            deadline: DEFAULT_PONG_WAIT,
        }
    }
}

/// Heartbeat state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeartbeatState {
    /// No probe is outstanding.
    Idle,
    /// A probe has been sent and its pong has not arrived yet.
    AwaitingPong,
    /// The deadline passed without a pong.
    TimedOut,
}

/// Per-connection heartbeat state machine and its driving loop.
///
/// # Examples
///
/// ```
/// use chat_relay::connection::services::{HeartbeatConfig, HeartbeatState, HeartbeatSupervisor};
///
/// let mut heartbeat = HeartbeatSupervisor::new(HeartbeatConfig::default());
/// heartbeat.probe_sent();
/// assert_eq!(heartbeat.state(), HeartbeatState::AwaitingPong);
/// heartbeat.pong_received();
/// assert_eq!(heartbeat.state(), HeartbeatState::Idle);
/// ```
#[derive(Debug, Clone)]
pub struct HeartbeatSupervisor {
    config: HeartbeatConfig,
    state: HeartbeatState,
}

impl HeartbeatSupervisor {
    /// Creates an idle supervisor.
    #[must_use]
    pub const fn new(config: HeartbeatConfig) -> Self {
        Self {
            config,
            state: HeartbeatState::Idle,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> HeartbeatState {
        self.state
    }

    /// Returns the configured timing.
    #[must_use]
    pub const fn config(&self) -> HeartbeatConfig {
        self.config
    }

    /// Records that a probe was sent.
    pub const fn probe_sent(&mut self) {
        if matches!(self.state, HeartbeatState::Idle) {
            self.state = HeartbeatState::AwaitingPong;
        }
    }

    /// Records a pong.
    pub const fn pong_received(&mut self) {
        if matches!(self.state, HeartbeatState::AwaitingPong) {
            self.state = HeartbeatState::Idle;
        }
    }

    /// Records that the deadline passed.
    ///
    /// Returns `true` when this moved the supervisor to `TimedOut`.
    pub const fn deadline_passed(&mut self) -> bool {
        if matches!(self.state, HeartbeatState::AwaitingPong) {
            self.state = HeartbeatState::TimedOut;
            return true;
        }
        false
    }

    /// Drives the heartbeat until the connection is cancelled or the peer
    /// misses a deadline.
    ///
    /// The first probe is sent immediately. `pongs` is bumped by the read
    /// pump for every pong frame it receives.
    pub async fn run(
        mut self,
        outbox: Outbox,
        mut pongs: watch::Receiver<u64>,
        teardown: Teardown,
    ) -> HeartbeatState {
        let cancel = teardown.token().clone();
        let mut ticker = interval(self.config.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return self.state,
                _ = ticker.tick() => {}
            }

            // Pongs seen from here on count, even while the enqueue below
            // is still waiting for room.
            pongs.mark_unchanged();
            let probe = tokio::select! {
                biased;
                () = cancel.cancelled() => return self.state,
                sent = outbox.send(OutboundItem::Probe) => sent,
            };
            if probe.is_err() {
                return self.state;
            }
            self.probe_sent();

            let deadline = sleep(self.config.deadline);
            tokio::pin!(deadline);
            while matches!(self.state, HeartbeatState::AwaitingPong) {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return self.state,
                    changed = pongs.changed() => {
                        if changed.is_err() {
                            return self.state;
                        }
                        self.pong_received();
                    }
                    () = &mut deadline => {
                        if self.deadline_passed() {
                            warn!(
                                connection = %teardown.connection(),
                                deadline = ?self.config.deadline,
                                "pong deadline passed"
                            );
                            teardown.run(CloseCause::HeartbeatTimeout).await;
                            return self.state;
                        }
                    }
                }
            }
            debug!(connection = %teardown.connection(), "pong received");
        }
    }
}
