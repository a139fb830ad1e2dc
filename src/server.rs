//! HTTP surface of the relay process.
//!
//! - `GET /chat` upgrades to a hub connection.
//! - `GET /register?id=<participant>` prepares the participant's mailbox.
//! - `GET /speak/{id}/{target}` upgrades to a relay connection bound to
//!   `id`'s mailbox, with `target` as the default recipient.
//!
//! Open connections are cut when the shutdown token fires so that the
//! server can drain and the broker can be released.

use std::future::Future;
use std::net::SocketAddr;

use axum::{
    Router,
    extract::{ConnectInfo, Path, Query, State, ws::WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use mockable::DefaultClock;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::adapters::websocket::WebSocketChannel;
use crate::hub::session::{self as hub_session, HubSessionContext};
use crate::message::domain::{Address, ParticipantId};
use crate::relay::{
    ports::Broker,
    services::session::{self as relay_session, RelaySessionContext},
};

/// Shared state of every HTTP handler.
pub struct AppState<B>
where
    B: Broker,
{
    hub: HubSessionContext<DefaultClock>,
    relay: RelaySessionContext<B, DefaultClock>,
    shutdown: CancellationToken,
}

impl<B> AppState<B>
where
    B: Broker,
{
    /// Bundles the session contexts of both topologies.
    #[must_use]
    pub const fn new(
        hub: HubSessionContext<DefaultClock>,
        relay: RelaySessionContext<B, DefaultClock>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            hub,
            relay,
            shutdown,
        }
    }
}

impl<B> Clone for AppState<B>
where
    B: Broker,
{
    fn clone(&self) -> Self {
        Self {
            hub: self.hub.clone(),
            relay: self.relay.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegisterParams {
    id: String,
}

/// Builds the router.
pub fn router<B>(state: AppState<B>) -> Router
where
    B: Broker + 'static,
{
    Router::new()
        .route("/chat", get(chat::<B>))
        .route("/register", get(register::<B>))
        .route("/speak/:id/:target", get(speak::<B>))
        .with_state(state)
}

/// Serves the router on `listener` until `shutdown` fires.
///
/// # Errors
///
/// Returns the I/O error that stopped the server.
pub async fn run<B, F>(
    listener: TcpListener,
    state: AppState<B>,
    shutdown: F,
) -> std::io::Result<()>
where
    B: Broker + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "listening");
    }
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

async fn chat<B>(
    State(state): State<AppState<B>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    upgrade: WebSocketUpgrade,
) -> Response
where
    B: Broker + 'static,
{
    let context = state.hub.clone();
    let shutdown = state.shutdown.clone();
    upgrade.on_upgrade(move |socket| async move {
        let channel = WebSocketChannel::new(socket, peer);
        tokio::select! {
            cause = hub_session::serve(channel, context) => {
                debug!(%peer, ?cause, "hub connection finished");
            }
            () = shutdown.cancelled() => debug!(%peer, "hub connection cut by shutdown"),
        }
    })
}

async fn register<B>(
    State(state): State<AppState<B>>,
    Query(params): Query<RegisterParams>,
) -> StatusCode
where
    B: Broker + 'static,
{
    let Ok(participant) = ParticipantId::new(params.id) else {
        return StatusCode::BAD_REQUEST;
    };
    match state.relay.relay().ensure_mailbox(&participant).await {
        Ok(mailbox) => {
            debug!(%participant, queue = mailbox.queue(), "mailbox registered");
            StatusCode::NO_CONTENT
        }
        Err(err) => {
            warn!(%participant, error = %err, "mailbox registration failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn speak<B>(
    State(state): State<AppState<B>>,
    Path((id, target)): Path<(String, String)>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    upgrade: WebSocketUpgrade,
) -> Response
where
    B: Broker + 'static,
{
    let Ok(participant) = ParticipantId::new(id) else {
        return (StatusCode::BAD_REQUEST, "invalid participant").into_response();
    };
    let Ok(default_target) = target.parse::<Address>() else {
        return (StatusCode::BAD_REQUEST, "invalid target").into_response();
    };

    let context = state.relay.clone();
    let shutdown = state.shutdown.clone();
    upgrade.on_upgrade(move |socket| async move {
        let channel = WebSocketChannel::new(socket, peer);
        let served =
            relay_session::serve(channel, participant.clone(), Some(default_target), context);
        tokio::select! {
            cause = served => {
                debug!(%peer, %participant, ?cause, "relay connection finished");
            }
            () = shutdown.cancelled() => {
                debug!(%peer, %participant, "relay connection cut by shutdown");
            }
        }
    })
}
