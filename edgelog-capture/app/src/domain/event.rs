use axum::http::{HeaderMap, Method, StatusCode, Uri};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

// Edge headers carrying client identity and geo hints.
const FORWARDED_FOR: &str = "x-forwarded-for";
const FORWARDED_PROTO: &str = "x-forwarded-proto";
const EDGE_COUNTRY: &str = "x-edge-country";
const EDGE_CITY: &str = "x-edge-city";

/// One flat record per proxied request/response exchange.
///
/// Every string field is materialized at construction time: absent headers
/// become empty strings so downstream consumers never see nulls. Records have
/// no identity beyond insertion order and are consumed only as batch members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: String,
    pub ip: String,
    pub country: String,
    pub city: String,
    pub scheme: String,
    pub host: String,
    pub path: String,
    pub method: String,
    pub user_agent: String,
    pub referer: String,
    pub status: u16,
}

impl LogEvent {
    /// Builds the record for one exchange.
    ///
    /// Infallible and non-blocking: an unreadable or missing header degrades
    /// to an empty string rather than aborting capture.
    pub fn from_exchange(
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        status: StatusCode,
    ) -> Self {
        let scheme = match uri.scheme_str() {
            Some(scheme) => scheme.to_string(),
            // Behind the edge the request line usually carries no scheme.
            None => header_str(headers, FORWARDED_PROTO),
        };
        let host = match uri.host() {
            Some(host) => host.to_string(),
            None => header_str(headers, "host"),
        };
        let path = uri
            .path_and_query()
            .map_or_else(|| uri.path().to_string(), |pq| pq.to_string());

        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            ip: client_ip(headers),
            country: header_str(headers, EDGE_COUNTRY),
            city: header_str(headers, EDGE_CITY),
            scheme,
            host,
            path,
            method: method.as_str().to_string(),
            user_agent: header_str(headers, "user-agent"),
            referer: header_str(headers, "referer"),
            status: status.as_u16(),
        }
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string()
}

/// First hop of `x-forwarded-for`, which is the client as seen by the edge.
fn client_ip(headers: &HeaderMap) -> String {
    header_str(headers, FORWARDED_FOR)
        .split(',')
        .next()
        .unwrap_or("")
        .trim()
        .to_string()
}
