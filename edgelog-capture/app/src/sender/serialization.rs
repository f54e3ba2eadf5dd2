use crate::domain::LogEvent;
use tracing::error;

/// Serializes a batch as newline-delimited compact JSON, one event per line,
/// in insertion order.
///
/// An event that fails to serialize is logged and dropped rather than
/// aborting the whole batch.
pub fn to_ndjson(events: &[LogEvent]) -> String {
    let mut body = String::with_capacity(events.len() * 256);
    for event in events {
        match serde_json::to_string(event) {
            Ok(line) => {
                body.push_str(&line);
                body.push('\n');
            }
            Err(e) => error!("dropping unserializable event: {e}"),
        }
    }
    body
}
