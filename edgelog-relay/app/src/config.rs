use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid URL for {key}: {message}")]
    InvalidUrl { key: &'static str, message: String },
}

/// Headers redacted when the caller supplies no `REDACT_HEADERS` override.
pub const DEFAULT_REDACT_HEADERS: &[&str] =
    &["authorization", "cookie", "proxy-authorization", "x-api-key"];

/// Resolved service configuration.
///
/// Every field has a documented default. Numeric overrides that are absent or
/// fail to parse fall back to the default rather than aborting startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Ingestion endpoint receiving forwarded payloads.
    pub ingest_url: String,
    /// Base URL of the status-only pass-through.
    pub relay_url: String,
    /// Listen port.
    pub http_port: u16,
    /// Value of the injected tenant-identity header.
    pub tenant_id: String,
    /// Shared secret for payload signatures.
    pub signing_key: String,
    /// Whether forwarded payloads carry an HMAC signature.
    pub sign_requests: bool,
    /// Admission probability; clamped to [0, 1] at the gate, NaN disables
    /// sampling entirely.
    pub sample_rate: f64,
    /// Case-insensitive header names whose values are destroyed before
    /// forwarding.
    pub redact_headers: Vec<String>,
    /// Extra attempts after the first; total attempts = retries + 1.
    pub retries: u32,
    /// Independent deadline for each upstream attempt.
    pub attempt_timeout_ms: u64,
    /// Tracing filter directive.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ingest_url: "http://127.0.0.1:9500/v1/ingest".to_string(),
            relay_url: "http://127.0.0.1:8080".to_string(),
            http_port: 9800,
            tenant_id: String::new(),
            signing_key: String::new(),
            sign_requests: false,
            sample_rate: 1.0,
            redact_headers: DEFAULT_REDACT_HEADERS
                .iter()
                .map(|name| name.to_string())
                .collect(),
            retries: 2,
            attempt_timeout_ms: 10_000,
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
            ingest_url: string_or(overrides, "INGEST_URL", defaults.ingest_url),
            relay_url: string_or(overrides, "RELAY_URL", defaults.relay_url),
            http_port: parsed_or(overrides, "HTTP_PORT", defaults.http_port),
            tenant_id: string_or(overrides, "TENANT_ID", defaults.tenant_id),
            signing_key: string_or(overrides, "SIGNING_KEY", defaults.signing_key),
            sign_requests: parsed_or(overrides, "SIGN_REQUESTS", defaults.sign_requests),
            sample_rate: parsed_or(overrides, "SAMPLE_RATE", defaults.sample_rate),
            redact_headers: overrides
                .get("REDACT_HEADERS")
                .map_or(defaults.redact_headers, |list| parse_redact_list(list)),
            retries: parsed_or(overrides, "RETRIES", defaults.retries),
            attempt_timeout_ms: parsed_or(
                overrides,
                "ATTEMPT_TIMEOUT_MS",
                defaults.attempt_timeout_ms,
            ),
            log_level: string_or(overrides, "LOG_LEVEL", defaults.log_level),
        }
    }

    pub fn from_env() -> Self {
        Self::resolve(&std::env::vars().collect())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ingest()?;
        self.relay()?;
        Ok(())
    }

    pub fn ingest(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.ingest_url).map_err(|e| ConfigError::InvalidUrl {
            key: "INGEST_URL",
            message: format!("'{}': {e}", self.ingest_url),
        })
    }

    pub fn relay(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.relay_url).map_err(|e| ConfigError::InvalidUrl {
            key: "RELAY_URL",
            message: format!("'{}': {e}", self.relay_url),
        })
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

fn parse_redact_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
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

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn overrides(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_overrides_yield_defaults() {
        let config = Config::resolve(&HashMap::new());
        assert_eq!(config.retries, 2);
        assert_eq!(config.attempt_timeout_ms, 10_000);
        assert_eq!(config.sample_rate, 1.0);
        assert!(!config.sign_requests);
        assert_eq!(
            config.redact_headers,
            vec!["authorization", "cookie", "proxy-authorization", "x-api-key"]
        );
    }

    #[test]
    fn unparseable_numerics_fall_back_to_defaults() {
        let config = Config::resolve(&overrides(&[
            ("RETRIES", "several"),
            ("ATTEMPT_TIMEOUT_MS", ""),
            ("SAMPLE_RATE", "often"),
            ("SIGN_REQUESTS", "yes please"),
        ]));
        assert_eq!(config.retries, 2);
        assert_eq!(config.attempt_timeout_ms, 10_000);
        assert_eq!(config.sample_rate, 1.0);
        assert!(!config.sign_requests);
    }

    #[test]
    fn nan_sample_rate_is_preserved_for_the_gate() {
        let config = Config::resolve(&overrides(&[("SAMPLE_RATE", "NaN")]));
        assert!(config.sample_rate.is_nan());
    }

    #[test]
    fn redact_list_is_lowercased_and_trimmed() {
        let config = Config::resolve(&overrides(&[(
            "REDACT_HEADERS",
            "Authorization, X-Secret-Token ,cookie,,",
        )]));
        assert_eq!(
            config.redact_headers,
            vec!["authorization", "x-secret-token", "cookie"]
        );
    }

    #[test]
    fn validate_rejects_bad_ingest_url() {
        let config = Config {
            ingest_url: "nope".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn from_env_reads_process_environment() {
        unsafe { std::env::set_var("RETRIES", "5") };
        let config = Config::from_env();
        assert_eq!(config.retries, 5);
        unsafe { std::env::remove_var("RETRIES") };
    }
}
