use axum::http::header::{CONTENT_LENGTH, HOST, USER_AGENT};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use bytes::Bytes;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use crate::config::Config;

/// Value written over every redacted header. Presence is preserved for
/// downstream schema expectations; the value is destroyed.
pub const REDACTION_MARKER: &str = "REDACTED";

/// Tenant identity attached to every forwarded request, regardless of what
/// the caller supplied.
pub const TENANT_HEADER: &str = "x-edgelog-tenant";

/// Lowercase hex HMAC-SHA-256 of the forwarded body.
pub const SIGNATURE_HEADER: &str = "x-edgelog-signature";

type HmacSha256 = Hmac<Sha256>;

/// Strips sensitive header values and stamps the forwarder's identity onto
/// outbound requests; optionally signs the payload.
pub struct RedactionFilter {
    redact: Vec<HeaderName>,
    tenant: HeaderValue,
    user_agent: HeaderValue,
    signing_key: Option<String>,
}

impl RedactionFilter {
    pub fn from_config(config: &Config) -> Self {
        let redact = config
            .redact_headers
            .iter()
            .filter_map(|name| HeaderName::try_from(name.as_str()).ok())
            .collect();
        // An unrepresentable tenant id degrades to an empty header value
        // rather than failing the pipeline.
        let tenant = HeaderValue::from_str(&config.tenant_id)
            .unwrap_or_else(|_| HeaderValue::from_static(""));
        let user_agent = HeaderValue::from_static(concat!(
            "edgelog-relay/",
            env!("CARGO_PKG_VERSION")
        ));
        let signing_key = (config.sign_requests && !config.signing_key.is_empty())
            .then(|| config.signing_key.clone());

        Self {
            redact,
            tenant,
            user_agent,
            signing_key,
        }
    }

    pub fn signing_enabled(&self) -> bool {
        self.signing_key.is_some()
    }

    /// Prepares the outbound header set for one forwarded payload.
    pub fn apply(&self, inbound: &HeaderMap, body: &Bytes) -> HeaderMap {
        let mut headers = inbound.clone();

        // Recomputed by the client on send.
        headers.remove(HOST);
        headers.remove(CONTENT_LENGTH);

        for name in &self.redact {
            if headers.contains_key(name) {
                headers.insert(name.clone(), HeaderValue::from_static(REDACTION_MARKER));
            }
        }

        // Never trust caller-supplied identity.
        headers.insert(HeaderName::from_static(TENANT_HEADER), self.tenant.clone());
        headers.insert(USER_AGENT, self.user_agent.clone());

        if let Some(signature) = self.signature(body) {
            debug!("payload signed");
            if let Ok(value) = HeaderValue::from_str(&signature) {
                headers.insert(HeaderName::from_static(SIGNATURE_HEADER), value);
            }
        }

        headers
    }

    /// Keyed hash over the exact bytes forwarded, hex-encoded lowercase.
    fn signature(&self, body: &[u8]) -> Option<String> {
        let key = self.signing_key.as_deref()?;
        // HMAC accepts keys of any length, so this cannot fail in practice.
        let mut mac = HmacSha256::new_from_slice(key.as_bytes()).ok()?;
        mac.update(body);
        Some(hex::encode(mac.finalize().into_bytes()))
    }
}
