//! Runs the chat relay: the in-process hub and the broker-backed relay
//! behind one HTTP listener.
//!
//! Usage:
//!
//! ```text
//! chat-relay [--port <port>] [--config <path>] [--broker-url <amqp-uri>]
//! ```
//!
//! With `--broker-url` (or `CHAT_RELAY_BROKER_URL`) mailboxes live on an
//! AMQP server and survive restarts; otherwise an in-process broker holds
//! them for the lifetime of the process. Set `CHAT_RELAY_DATABASE_URL` to
//! persist messages in `PostgreSQL`; otherwise history is kept in memory.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use chat_relay::config::{ConfigError, RelayConfig};
use chat_relay::hub::{Hub, session::HubSessionContext};
use chat_relay::message::{
    adapters::{memory::InMemoryMessageStore, postgres::PostgresMessageStore},
    domain::{Address, MessageIdGenerator},
    ports::{ContentPolicy, MessageStore, StoreError},
};
use chat_relay::relay::{
    adapters::{amqp::AmqpBroker, memory::InMemoryBroker},
    ports::{Broker, BrokerError},
    services::{RelayService, session::RelaySessionContext},
};
use chat_relay::{
    server,
    telemetry::{self, TelemetryError},
};
use clap::Parser;
use mockable::{Clock, DefaultClock};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const DATABASE_URL_ENV: &str = "CHAT_RELAY_DATABASE_URL";
const HUB_GROUP: &str = "lobby";

#[derive(Debug, Parser)]
#[command(name = "chat-relay", version, about = "Websocket chat relay")]
struct Cli {
    /// Listen port.
    #[arg(long, env = "CHAT_RELAY_PORT")]
    port: Option<u16>,

    /// JSON configuration file.
    #[arg(long, env = "CHAT_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// AMQP server holding the mailboxes.
    #[arg(long, env = "CHAT_RELAY_BROKER_URL")]
    broker_url: Option<String>,
}

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("message store unavailable: {0}")]
    Store(#[from] StoreError),
    #[error("message broker unavailable: {0}")]
    Broker(#[from] BrokerError),
    #[error("invalid hub address: {0}")]
    Address(#[from] chat_relay::message::error::MessageDomainError),
    #[error("server failed: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "chat relay stopped");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), StartupError> {
    telemetry::init()?;
    let mut config = cli
        .config
        .map(RelayConfig::load)
        .transpose()?
        .unwrap_or_default();
    config.port = cli.port.unwrap_or(config.port);

    let Some(url) = cli.broker_url.as_deref() else {
        info!("using in-memory broker");
        return serve(Arc::new(InMemoryBroker::new()), config).await;
    };
    info!("using AMQP broker");
    serve(Arc::new(AmqpBroker::connect(url).await?), config).await
}

async fn serve<B>(broker: Arc<B>, config: RelayConfig) -> Result<(), StartupError>
where
    B: Broker + 'static,
{
    let clock = Arc::new(DefaultClock);
    let store = open_store(Arc::<DefaultClock>::clone(&clock))?;
    let policy: Arc<dyn ContentPolicy> = Arc::new(config.policy());
    let ids = Arc::new(MessageIdGenerator::new());

    let hub = Hub::new(config.hub);
    let hub_task = hub.start();
    let hub_context = HubSessionContext::new(
        hub.handle(),
        Address::group(HUB_GROUP)?,
        Arc::clone(&policy),
        Arc::clone(&ids),
        Arc::clone(&clock),
    )
    .with_outbox_capacity(config.sessions.outbox_capacity)
    .with_heartbeat(config.heartbeat());

    let relay_context = RelaySessionContext::new(
        RelayService::new(Arc::clone(&broker)),
        store,
        policy,
        ids,
        clock,
    )
    .with_settings(config.sessions);

    let shutdown = CancellationToken::new();
    let state = server::AppState::new(hub_context, relay_context, shutdown.clone());
    let address = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
    let listener = TcpListener::bind(address).await?;

    let signal = shutdown.clone();
    let served = server::run(listener, state, async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown requested"),
            Err(err) => warn!(error = %err, "cannot listen for ctrl-c; shutting down"),
        }
        signal.cancel();
    })
    .await;

    if let Err(err) = broker.close().await {
        warn!(error = %err, "releasing broker failed");
    }
    if let Some(task) = hub_task {
        task.abort();
    }
    info!("chat relay stopped");
    served.map_err(StartupError::from)
}

fn open_store(clock: Arc<dyn Clock>) -> Result<Arc<dyn MessageStore>, StartupError> {
    let Ok(url) = std::env::var(DATABASE_URL_ENV) else {
        info!("using in-memory message store");
        return Ok(Arc::new(InMemoryMessageStore::new().with_clock(clock)));
    };
    info!("using postgres message store");
    Ok(Arc::new(PostgresMessageStore::connect(&url)?.with_clock(clock)))
}
