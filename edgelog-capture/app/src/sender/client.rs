use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use url::Url;

use super::SinkTransport;
use crate::app::Config;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("invalid sink URL: {0}")]
    InvalidUrl(String),
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Production sink transport: POSTs one serialized batch per call over a
/// pooled client. The batch body travels as `text/plain` NDJSON.
#[derive(Debug, Clone)]
pub struct SinkClient {
    client: reqwest::Client,
    sink_url: Url,
}

impl SinkClient {
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        let sink_url: Url = config
            .sink_url
            .parse()
            .map_err(|e| TransportError::InvalidUrl(format!("'{}': {e}", config.sink_url)))?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("edgelog-capture/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, sink_url })
    }

    pub fn sink_url(&self) -> &Url {
        &self.sink_url
    }
}

impl SinkTransport for SinkClient {
    fn send_batch(
        &self,
        body: String,
    ) -> impl std::future::Future<Output = Result<u16, TransportError>> + Send {
        let request = self
            .client
            .post(self.sink_url.clone())
            .header(CONTENT_TYPE, "text/plain")
            .body(body);
        async move {
            let response = request.send().await?;
            Ok(response.status().as_u16())
        }
    }
}
