#![allow(dead_code)]

use edgelog_capture::domain::LogEvent;
use edgelog_capture::sender::{SinkTransport, TransportError};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

/// Scripted in-memory sink: records every batch body it receives and replays
/// a scripted sequence of outcomes, falling back to `Ok(200)` once the
/// script is exhausted.
#[derive(Clone, Default)]
pub struct RecordingSink {
    inner: Arc<Mutex<RecordingSinkInner>>,
}

#[derive(Default)]
struct RecordingSinkInner {
    bodies: Vec<String>,
    script: VecDeque<Result<u16, TransportError>>,
}

impl RecordingSink {
    pub fn push_outcome(&self, outcome: Result<u16, TransportError>) {
        self.inner.lock().unwrap().script.push_back(outcome);
    }

    pub fn sends(&self) -> usize {
        self.inner.lock().unwrap().bodies.len()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.inner.lock().unwrap().bodies.clone()
    }
}

impl SinkTransport for RecordingSink {
    fn send_batch(
        &self,
        body: String,
    ) -> impl Future<Output = Result<u16, TransportError>> + Send {
        let inner = self.inner.clone();
        async move {
            let mut guard = inner.lock().unwrap();
            guard.bodies.push(body);
            guard.script.pop_front().unwrap_or(Ok(200))
        }
    }
}

pub fn event(path: &str) -> LogEvent {
    LogEvent {
        timestamp: "2026-01-01T00:00:00.000Z".to_string(),
        ip: "203.0.113.7".to_string(),
        country: "NO".to_string(),
        city: "Oslo".to_string(),
        scheme: "https".to_string(),
        host: "api.example.com".to_string(),
        path: path.to_string(),
        method: "GET".to_string(),
        user_agent: "integration-test".to_string(),
        referer: String::new(),
        status: 200,
    }
}

/// Paths of the NDJSON lines in one recorded batch body, in order.
pub fn recorded_paths(body: &str) -> Vec<String> {
    body.lines()
        .map(|line| {
            let event: LogEvent = serde_json::from_str(line).unwrap();
            event.path
        })
        .collect()
}
