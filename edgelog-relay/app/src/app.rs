use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use bytes::Bytes;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::Config;
use crate::error::ServiceError;
use crate::redaction::RedactionFilter;
use crate::relay::RelayClient;
use crate::sampling::SamplingGate;
use crate::upstream::{IngestClient, PreparedRequest, RetryEngine};

pub struct AppState {
    pub gate: SamplingGate,
    pub filter: RedactionFilter,
    pub engine: RetryEngine<IngestClient>,
    pub relay: RelayClient,
}

/// Wires the full forwarding pipeline from a resolved configuration. Shared
/// between `run` and the integration tests.
pub fn build_state(config: &Config) -> Result<Arc<AppState>, ServiceError> {
    Ok(Arc::new(AppState {
        gate: SamplingGate::new(config.sample_rate),
        filter: RedactionFilter::from_config(config),
        engine: RetryEngine::new(
            IngestClient::new(config.ingest()?)?,
            config.retries,
            config.attempt_timeout(),
        ),
        relay: RelayClient::new(config.relay()?)?,
    }))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/relay", any(relay_handler))
        .route("/relay/{*path}", any(relay_handler))
        .fallback(forward_handler)
        .with_state(state)
}

/// Fixed health path: plain success, no payload.
async fn health_handler() -> StatusCode {
    StatusCode::OK
}

/// The forwarding pipeline: sampling gate, then redaction/signing, then the
/// bounded retry loop. The response carries the mapped status and no body.
async fn forward_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !state.gate.admit() {
        debug!("sampled out");
        return StatusCode::NO_CONTENT.into_response();
    }

    let prepared = PreparedRequest {
        headers: state.filter.apply(&headers, &body),
        body,
    };
    let status = state.engine.execute(&prepared).await;
    status_only(status)
}

/// Status-only pass-through under `/relay`; out-of-scope plumbing the
/// forwarding core must not interfere with.
async fn relay_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
    let target = path_and_query.strip_prefix("/relay").unwrap_or(path_and_query);
    let target = if target.is_empty() { "/" } else { target };

    match state.relay.forward(method, target, headers, body).await {
        Ok(status) => status_only(status),
        Err(e) => {
            error!("relay pass-through failed: {e}");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

fn status_only(status: u16) -> Response {
    StatusCode::from_u16(status)
        .unwrap_or(StatusCode::BAD_GATEWAY)
        .into_response()
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

    let state = build_state(&config)?;
    info!("starting edgelog-relay v{}", env!("CARGO_PKG_VERSION"));
    info!(
        ingest = %config.ingest_url,
        sample_rate = state.gate.rate(),
        signing = state.filter.signing_enabled(),
        retries = config.retries,
        attempt_timeout_ms = config.attempt_timeout_ms,
        "configuration resolved"
    );

    let address = format!("0.0.0.0:{}", config.http_port);
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ServiceError::Bind {
            address: address.clone(),
            source,
        })?;
    info!(%address, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("edgelog-relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
    }
}
