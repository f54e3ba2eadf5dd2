use axum::http::HeaderMap;
use bytes::Bytes;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

/// Status returned to the caller when every attempt ended in a timeout or a
/// transport error.
pub const TIMEOUT_STATUS: u16 = 504;

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// One admitted, transformed payload ready for delivery.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Seam between the retry loop and the wire.
pub trait Upstream: Send + Sync {
    fn send(
        &self,
        request: &PreparedRequest,
    ) -> impl Future<Output = Result<u16, UpstreamError>> + Send;
}

/// Bounded attempt loop with an independent deadline per attempt.
///
/// Timeouts and transport errors retry immediately with no inter-attempt
/// delay; server-side errors retry while attempts remain. Everything else is
/// relayed to the caller as-is, body dropped. The per-attempt deadline aborts
/// only the in-flight call, never the inbound request.
pub struct RetryEngine<T: Upstream> {
    upstream: T,
    retries: u32,
    attempt_timeout: Duration,
}

impl<T: Upstream> RetryEngine<T> {
    pub fn new(upstream: T, retries: u32, attempt_timeout: Duration) -> Self {
        Self {
            upstream,
            retries,
            attempt_timeout,
        }
    }

    /// Runs the attempt loop; always resolves to a status for the caller.
    pub async fn execute(&self, request: &PreparedRequest) -> u16 {
        let total_attempts = self.retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match timeout(self.attempt_timeout, self.upstream.send(request)).await {
                Err(_) => {
                    if attempt >= total_attempts {
                        warn!(attempt, "upstream timed out on the final attempt");
                        return TIMEOUT_STATUS;
                    }
                    debug!(attempt, "attempt timed out, retrying");
                }
                Ok(Err(e)) => {
                    if attempt >= total_attempts {
                        warn!(attempt, error = %e, "upstream unreachable, giving up");
                        return TIMEOUT_STATUS;
                    }
                    debug!(attempt, error = %e, "transport error, retrying");
                }
                Ok(Ok(status)) if status >= 500 && attempt < total_attempts => {
                    debug!(attempt, status, "server error, retrying");
                }
                Ok(Ok(status)) => return status,
            }
        }
    }
}

/// Production upstream: POSTs to the ingestion endpoint without following
/// redirects, so a 3xx surfaces to the caller as-is.
pub struct IngestClient {
    client: reqwest::Client,
    url: Url,
}

impl IngestClient {
    pub fn new(url: Url) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client, url })
    }
}

impl Upstream for IngestClient {
    fn send(
        &self,
        request: &PreparedRequest,
    ) -> impl Future<Output = Result<u16, UpstreamError>> + Send {
        let call = self
            .client
            .post(self.url.clone())
            .headers(request.headers.clone())
            .body(request.body.clone())
            .send();
        async move {
            let response = call.await?;
            Ok(response.status().as_u16())
        }
    }
}
