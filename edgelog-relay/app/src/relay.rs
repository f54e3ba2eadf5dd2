use axum::http::header::{CONTENT_LENGTH, HOST};
use axum::http::{HeaderMap, Method};
use bytes::Bytes;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("invalid relay target: {0}")]
    InvalidTarget(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Status-only pass-through to the configured relay base.
///
/// Boundary plumbing around the forwarding core: method, headers and body
/// travel unchanged, and only the upstream status comes back.
pub struct RelayClient {
    client: reqwest::Client,
    base: Url,
}

impl RelayClient {
    pub fn new(base: Url) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client, base })
    }

    pub async fn forward(
        &self,
        method: Method,
        path_and_query: &str,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<u16, RelayError> {
        let target = self
            .base
            .join(path_and_query)
            .map_err(|e| RelayError::InvalidTarget(format!("'{path_and_query}': {e}")))?;

        let mut headers = headers;
        // Recomputed by the client on send.
        headers.remove(HOST);
        headers.remove(CONTENT_LENGTH);

        let response = self
            .client
            .request(method, target)
            .headers(headers)
            .body(body)
            .send()
            .await?;
        Ok(response.status().as_u16())
    }
}
