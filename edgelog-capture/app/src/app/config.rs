use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid URL for {key}: {message}")]
    InvalidUrl { key: &'static str, message: String },
}

/// Resolved service configuration.
///
/// Every field has a documented default. Numeric overrides that are absent or
/// fail to parse fall back to the default rather than aborting startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Ingestion sink endpoint receiving NDJSON batches.
    pub sink_url: String,
    /// Base URL of the proxied origin.
    pub origin_url: String,
    /// Listen port for the pass-through surface.
    pub http_port: u16,
    /// Queue length that triggers an immediate flush.
    pub batch_max_events: usize,
    /// Delay of the time-triggered flush.
    pub flush_interval_ms: u64,
    /// Cooldown after the first delivery failure of a streak.
    pub backoff_base_ms: u64,
    /// Cooldown ceiling.
    pub backoff_max_ms: u64,
    /// Client timeout for each sink POST.
    pub request_timeout_secs: u64,
    /// Tracing filter directive.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sink_url: "http://127.0.0.1:9500/v1/records".to_string(),
            origin_url: "http://127.0.0.1:8080".to_string(),
            http_port: 9700,
            batch_max_events: 200,
            flush_interval_ms: 20_000,
            backoff_base_ms: 1_000,
            backoff_max_ms: 60_000,
            request_timeout_secs: 30,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Resolves a configuration from string-keyed overrides.
    ///
    /// Pure: the same map always yields the same configuration.
    pub fn resolve(overrides: &HashMap<String, String>) -> Self {
        let defaults = Config::default();
        Self {
            sink_url: string_or(overrides, "SINK_URL", defaults.sink_url),
            origin_url: string_or(overrides, "ORIGIN_URL", defaults.origin_url),
            http_port: parsed_or(overrides, "HTTP_PORT", defaults.http_port),
            batch_max_events: parsed_or(overrides, "BATCH_MAX_EVENTS", defaults.batch_max_events),
            flush_interval_ms: parsed_or(overrides, "FLUSH_INTERVAL_MS", defaults.flush_interval_ms),
            backoff_base_ms: parsed_or(overrides, "BACKOFF_BASE_MS", defaults.backoff_base_ms),
            backoff_max_ms: parsed_or(overrides, "BACKOFF_MAX_MS", defaults.backoff_max_ms),
            request_timeout_secs: parsed_or(
                overrides,
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            ),
            log_level: string_or(overrides, "LOG_LEVEL", defaults.log_level),
        }
    }

    pub fn from_env() -> Self {
        Self::resolve(&std::env::vars().collect())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sink()?;
        self.origin()?;
        Ok(())
    }

    pub fn sink(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.sink_url).map_err(|e| ConfigError::InvalidUrl {
            key: "SINK_URL",
            message: format!("'{}': {e}", self.sink_url),
        })
    }

    pub fn origin(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin_url).map_err(|e| ConfigError::InvalidUrl {
            key: "ORIGIN_URL",
            message: format!("'{}': {e}", self.origin_url),
        })
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Parsed override value, or the default when the key is absent or the value
/// does not parse. Misconfigured numerics fail closed to their default.
fn parsed_or<T: std::str::FromStr>(
    overrides: &HashMap<String, String>,
    key: &str,
    default: T,
) -> T {
    overrides
        .get(key)
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn string_or(overrides: &HashMap<String, String>, key: &str, default: String) -> String {
    overrides.get(key).cloned().unwrap_or(default)
}
