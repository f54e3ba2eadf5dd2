use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures::TryStreamExt;
use tracing::error;
use url::Url;

use crate::buffer::Accumulator;
use crate::domain::LogEvent;
use crate::sender::SinkClient;

/// Shared state of the pass-through surface: the origin base plus the capture
/// pipeline.
#[derive(Clone)]
pub struct ProxyState {
    pub origin: Url,
    pub client: reqwest::Client,
    pub pipeline: Accumulator<SinkClient>,
}

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .fallback(proxy_handler)
        .with_state(state)
}

/// Fixed health path: plain success, no payload.
async fn health_handler() -> StatusCode {
    StatusCode::OK
}

/// Forwards the request to the origin unchanged and streams the response
/// back. Capture is plumbing around the batch core: one event per exchange,
/// spawned detached so the primary response is never delayed or altered.
async fn proxy_handler(State(state): State<ProxyState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let target = match join_origin(&state.origin, &parts.uri) {
        Ok(url) => url,
        Err(e) => {
            error!(uri = %parts.uri, "unroutable request path: {e}");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let mut outbound_headers = parts.headers.clone();
    // Recomputed by the client for the origin connection.
    outbound_headers.remove(header::HOST);

    let upstream = state
        .client
        .request(parts.method.clone(), target)
        .headers(outbound_headers)
        .body(reqwest::Body::wrap_stream(body.into_data_stream()))
        .send()
        .await;

    let (status, response) = match upstream {
        Ok(origin_response) => {
            let status = origin_response.status();
            (status, into_axum_response(origin_response))
        }
        Err(e) => {
            error!("origin request failed: {e}");
            (StatusCode::BAD_GATEWAY, StatusCode::BAD_GATEWAY.into_response())
        }
    };

    let event = LogEvent::from_exchange(&parts.method, &parts.uri, &parts.headers, status);
    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        pipeline.append(event).await;
    });

    response
}

fn into_axum_response(origin_response: reqwest::Response) -> Response {
    let status = origin_response.status();
    let mut builder = Response::builder().status(status);
    if let Some(headers) = builder.headers_mut() {
        for (name, value) in origin_response.headers() {
            // The transfer framing is re-established on our side.
            if name == header::TRANSFER_ENCODING || name == header::CONNECTION {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }
    }
    let body = Body::from_stream(origin_response.bytes_stream().map_err(axum::Error::new));
    match builder.body(body) {
        Ok(response) => response,
        Err(e) => {
            error!("assembling proxied response failed: {e}");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

fn join_origin(origin: &Url, uri: &Uri) -> Result<Url, url::ParseError> {
    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
    origin.join(path_and_query)
}
