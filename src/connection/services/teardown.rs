//! Idempotent connection teardown.
//!
//! Any of the connection's tasks may trigger teardown, concurrently and more
//! than once. Only the first trigger acts: it moves the connection from
//! `Active` to `Closing`, cancels the connection's token so every task
//! stops, and then releases the membership (which closes the outbound
//! queue). A release that does not finish within [`RELEASE_GRACE`] is
//! abandoned.

use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::connection::{
    domain::{CloseCause, ConnectionId, ConnectionState},
    ports::Membership,
};

/// Upper bound on how long teardown waits for the membership release.
pub const RELEASE_GRACE: Duration = Duration::from_secs(5);

struct TeardownInner {
    connection: ConnectionId,
    state: AtomicU8,
    cause: OnceLock<CloseCause>,
    cancel: CancellationToken,
    membership: Arc<dyn Membership>,
}

/// Shared teardown trigger for one connection.
#[derive(Clone)]
pub struct Teardown {
    inner: Arc<TeardownInner>,
}

impl Teardown {
    /// Creates the teardown trigger for `connection`.
    #[must_use]
    pub fn new(connection: ConnectionId, membership: Arc<dyn Membership>) -> Self {
        Self {
            inner: Arc::new(TeardownInner {
                connection,
                state: AtomicU8::new(ConnectionState::Active as u8),
                cause: OnceLock::new(),
                cancel: CancellationToken::new(),
                membership,
            }),
        }
    }

    /// Runs teardown for `cause`.
    ///
    /// Returns `true` only for the call that performed the teardown; every
    /// other call returns `false` without side effects.
    pub async fn run(&self, cause: CloseCause) -> bool {
        let started = self
            .inner
            .state
            .compare_exchange(
                ConnectionState::Active as u8,
                ConnectionState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if !started {
            return false;
        }

        // Only the winning trigger reaches this point.
        self.inner.cause.get_or_init(|| cause);
        debug!(connection = %self.inner.connection, %cause, "tearing down connection");
        self.inner.cancel.cancel();
        let release = self.inner.membership.release(self.inner.connection);
        if tokio::time::timeout(RELEASE_GRACE, release).await.is_err() {
            warn!(connection = %self.inner.connection, "membership release timed out");
        }
        true
    }

    /// Marks the connection closed once all of its tasks have ended.
    pub fn mark_closed(&self) {
        self.inner
            .state
            .store(ConnectionState::Closed as u8, Ordering::Release);
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Returns the cause recorded by the first trigger, if any.
    #[must_use]
    pub fn cause(&self) -> Option<CloseCause> {
        self.inner.cause.get().copied()
    }

    /// Returns the connection's cancellation token.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    /// Returns the connection this trigger belongs to.
    #[must_use]
    pub fn connection(&self) -> ConnectionId {
        self.inner.connection
    }
}

impl std::fmt::Debug for Teardown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Teardown")
            .field("connection", &self.inner.connection)
            .field("state", &self.state())
            .field("cause", &self.cause())
            .finish_non_exhaustive()
    }
}
