//! gateway-client
//!
//! Logs in, keeps the gateway connection up and tears everything down on
//! SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use clap::Parser;
use serde_json::{Map, Value};
use tokio::sync::broadcast::{self, error::RecvError};

use gateway_client::lifecycle::{signals, Shutdown};
use gateway_client::observability::{logging, metrics};
use gateway_client::transport::http::DEFAULT_API_BASE;
use gateway_client::{BroadcastSink, Client, ClientEvent, PeriodicTask, WeakClient};

#[derive(Parser)]
#[command(name = "gateway-client")]
#[command(about = "Log in to the gateway and stay connected until interrupted", long_about = None)]
struct Cli {
    /// Authentication token
    #[arg(long, env = "GATEWAY_CLIENT_TOKEN", hide_env_values = true)]
    token: String,

    #[arg(long, default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Client options as a JSON object, e.g. '{"shardID":0,"shardCount":2}'
    #[arg(long, value_parser = parse_options)]
    options: Option<Map<String, Value>>,

    /// Skip the cached gateway address
    #[arg(long)]
    force_gateway: bool,

    #[arg(long, default_value = "info")]
    log_level: String,

    #[arg(long)]
    log_json: bool,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    metrics_address: Option<SocketAddr>,

    /// Seconds between cache size reports
    #[arg(long, default_value_t = 60)]
    stats_interval: u64,
}

fn parse_options(raw: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("options must be a JSON object".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    logging::init_logging(&cli.log_level, cli.log_json);
    tracing::info!("gateway-client v{} starting", env!("CARGO_PKG_VERSION"));

    if let Some(addr) = cli.metrics_address {
        metrics::init_metrics(addr);
    }

    let events = Arc::new(BroadcastSink::default());
    let shutdown = Shutdown::new();
    let event_log = tokio::spawn(log_events(events.subscribe(), shutdown.subscribe()));

    let client_slot: Arc<OnceLock<WeakClient>> = Arc::new(OnceLock::new());
    let stats_slot = Arc::clone(&client_slot);
    let stats = PeriodicTask::new(
        "cache-stats",
        Duration::from_secs(cli.stats_interval.max(1)),
        move || {
            if let Some(client) = stats_slot.get().and_then(WeakClient::upgrade) {
                tracing::info!(
                    guilds = client.guilds().len(),
                    channels = client.channels().len(),
                    users = client.users().len(),
                    ping_ms = ?client.ping(),
                    "Cache sizes"
                );
            }
        },
    );

    let mut builder = Client::builder()
        .api_base(cli.api_base)
        .events(events.clone())
        .background_task(Arc::new(stats));
    if let Some(options) = cli.options {
        builder = builder.options_map(options);
    }
    let client = builder.build()?;
    let _ = client_slot.set(client.downgrade());

    let login = tokio::select! {
        result = client.login(&cli.token, cli.force_gateway) => Some(result),
        _ = signals::termination() => None,
    };

    let outcome = match login {
        Some(Ok(())) => {
            tracing::info!(
                user = ?client.user().map(|me| me.user.tag()),
                status = ?client.connection_status(),
                "Logged in"
            );
            signals::trigger_on_termination(&shutdown).await;
            Ok(())
        }
        Some(Err(e)) => {
            tracing::error!(error = %e, "Login failed");
            Err(e)
        }
        None => {
            tracing::warn!("Interrupted during login");
            Ok(())
        }
    };

    shutdown.trigger();
    client.destroy(true).await;
    let _ = event_log.await;

    tracing::info!("Shutdown complete");
    outcome.map_err(Into::into)
}

async fn log_events(
    mut events: broadcast::Receiver<ClientEvent>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ClientEvent::Ready) => tracing::info!(event = "ready", "Client event"),
                Ok(ClientEvent::Error(e)) => tracing::error!(event = "error", error = %e, "Client event"),
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "Event log lagging"),
                Err(RecvError::Closed) => break,
            },
            _ = shutdown.recv() => break,
        }
    }
}
