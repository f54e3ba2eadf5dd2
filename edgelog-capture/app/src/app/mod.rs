pub mod config;

pub use config::{Config, ConfigError};

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::buffer::{Accumulator, BatchConfig};
use crate::proxy::{self, ProxyState};
use crate::sender::{SinkClient, TransportError};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("sink client error: {0}")]
    Sink(#[from] TransportError),
    #[error("failed to build origin client: {0}")]
    OriginClient(#[from] reqwest::Error),
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// Use JSON output unless LOG_FORMAT says otherwise; EnvFilter falls back to
/// the configured level when RUST_LOG is unset.
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(true);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().flatten_event(true))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

pub async fn run() -> Result<(), ServiceError> {
    let config = Config::from_env();
    config.validate()?;
    init_tracing(&config);

    info!("starting edgelog-capture v{}", env!("CARGO_PKG_VERSION"));
    info!(
        sink = %config.sink_url,
        origin = %config.origin_url,
        batch_max_events = config.batch_max_events,
        flush_interval_ms = config.flush_interval_ms,
        "configuration resolved"
    );

    let transport = SinkClient::new(&config)?;
    let pipeline = Accumulator::new(
        BatchConfig {
            max_events: config.batch_max_events,
            flush_interval: config.flush_interval(),
            backoff_base_ms: config.backoff_base_ms,
            backoff_max_ms: config.backoff_max_ms,
        },
        transport,
    );

    let state = ProxyState {
        origin: config.origin()?,
        client: reqwest::Client::builder().build()?,
        pipeline: pipeline.clone(),
    };

    let address = format!("0.0.0.0:{}", config.http_port);
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ServiceError::Bind {
            address: address.clone(),
            source,
        })?;
    info!(%address, "listening");

    axum::serve(listener, proxy::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Best-effort final flush; anything still queued afterwards is lost with
    // the process, which is the accepted delivery model.
    let outcome = pipeline.flush().await;
    info!(?outcome, "edgelog-capture stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
    }
}
