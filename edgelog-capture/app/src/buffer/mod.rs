use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::domain::LogEvent;
use crate::sender::{Backoff, SinkTransport, serialization};

#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Queue length that triggers an immediate flush.
    pub max_events: usize,
    /// Delay of the time-triggered flush.
    pub flush_interval: Duration,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_events: 200,
            flush_interval: Duration::from_millis(20_000),
            backoff_base_ms: 1_000,
            backoff_max_ms: 60_000,
        }
    }
}

/// Result of one `flush` entry, mostly of interest to tests and shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Still inside the cooldown window; queue untouched, no network call.
    InCooldown,
    /// Nothing queued (spurious timer fire); no network call.
    Empty,
    Delivered(usize),
    Requeued(usize),
}

/// Counters over the lifetime of one accumulator.
#[derive(Debug, Default)]
struct PipelineCounters {
    events_appended: AtomicU64,
    size_flushes: AtomicU64,
    timers_armed: AtomicU64,
    batches_delivered: AtomicU64,
    batches_requeued: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub events_appended: u64,
    pub size_flushes: u64,
    pub timers_armed: u64,
    pub batches_delivered: u64,
    pub batches_requeued: u64,
}

/// Process-wide mutable batch and backoff state. All fields are mutated only
/// under the accumulator's mutex; no lock is ever held across a suspension
/// point, so the queue swap and the backoff updates are single atomic steps
/// relative to interleaved captures.
struct BatchState {
    queue: VecDeque<LogEvent>,
    /// At most one flush timer may be outstanding at any time. Set when a
    /// timer is armed, cleared only when that timer fires.
    flush_scheduled: bool,
    backoff: Backoff,
}

enum AppendAction {
    Nothing,
    Flush,
    ArmTimer,
}

/// Owns the append-only event queue and both flush triggers.
///
/// Size-triggered and time-triggered flushes funnel through the same
/// [`Accumulator::flush`] entry point. The `flush_scheduled` flag gates timer
/// arming only; a size flush may fire while a timer is pending, which is
/// harmless because the queue swap is idempotent against an empty queue.
pub struct Accumulator<T: SinkTransport> {
    inner: Arc<AccumulatorInner<T>>,
}

// Not derived: a derive would demand `T: Clone`, but clones only share the
// inner state.
impl<T: SinkTransport> Clone for Accumulator<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct AccumulatorInner<T> {
    state: Mutex<BatchState>,
    config: BatchConfig,
    transport: T,
    counters: PipelineCounters,
}

impl<T: SinkTransport + 'static> Accumulator<T> {
    pub fn new(config: BatchConfig, transport: T) -> Self {
        let state = BatchState {
            queue: VecDeque::with_capacity(config.max_events),
            flush_scheduled: false,
            backoff: Backoff::new(config.backoff_base_ms, config.backoff_max_ms),
        };
        Self {
            inner: Arc::new(AccumulatorInner {
                state: Mutex::new(state),
                config,
                transport,
                counters: PipelineCounters::default(),
            }),
        }
    }

    /// Pushes one captured event.
    ///
    /// Crossing the size threshold triggers an asynchronous flush exactly
    /// once, fire-and-forget; otherwise the flush timer is armed unless one
    /// is already pending. Never blocks the caller on the network.
    pub async fn append(&self, event: LogEvent) {
        let action = {
            let mut state = self.inner.state.lock().await;
            state.queue.push_back(event);
            self.inner
                .counters
                .events_appended
                .fetch_add(1, Ordering::Relaxed);
            if state.queue.len() == self.inner.config.max_events {
                AppendAction::Flush
            } else if !state.flush_scheduled {
                state.flush_scheduled = true;
                AppendAction::ArmTimer
            } else {
                AppendAction::Nothing
            }
        };

        match action {
            AppendAction::Flush => {
                self.inner
                    .counters
                    .size_flushes
                    .fetch_add(1, Ordering::Relaxed);
                let accumulator = self.clone();
                tokio::spawn(async move {
                    accumulator.flush().await;
                });
            }
            AppendAction::ArmTimer => {
                self.inner
                    .counters
                    .timers_armed
                    .fetch_add(1, Ordering::Relaxed);
                let accumulator = self.clone();
                tokio::spawn(async move {
                    accumulator.run_timer().await;
                });
            }
            AppendAction::Nothing => {}
        }
    }

    /// One armed timer: sleeps the flush interval, transitions back to idle
    /// unconditionally, then flushes if anything is queued. There is no
    /// cancellation path; a timer that finds an empty queue is a cheap no-op.
    async fn run_timer(&self) {
        sleep(self.inner.config.flush_interval).await;
        let should_flush = {
            let mut state = self.inner.state.lock().await;
            state.flush_scheduled = false;
            !state.queue.is_empty()
        };
        if should_flush {
            self.flush().await;
        }
    }

    /// Delivers the current queue to the sink.
    ///
    /// Skips while inside the cooldown window. On delivery failure the whole
    /// outbox is requeued verbatim ahead of whatever accumulated during the
    /// attempt; there is no partial-batch retry.
    pub async fn flush(&self) -> FlushOutcome {
        let outbox: Vec<LogEvent> = {
            let mut state = self.inner.state.lock().await;
            let now = Instant::now();
            if state.backoff.in_cooldown(now) {
                debug!(
                    remaining_ms = state.backoff.remaining(now).as_millis() as u64,
                    "flush skipped: sink cooldown active"
                );
                return FlushOutcome::InCooldown;
            }
            if state.queue.is_empty() {
                return FlushOutcome::Empty;
            }
            std::mem::take(&mut state.queue).into()
        };

        let count = outbox.len();
        let body = serialization::to_ndjson(&outbox);
        let result = self.inner.transport.send_batch(body).await;

        let failure = match &result {
            Ok(status) => rejected_by_sink(*status).then(|| format!("sink returned {status}")),
            Err(e) => Some(e.to_string()),
        };

        let mut state = self.inner.state.lock().await;
        match failure {
            None => {
                state.backoff.reset();
                self.inner
                    .counters
                    .batches_delivered
                    .fetch_add(1, Ordering::Relaxed);
                debug!(events = count, "batch delivered");
                FlushOutcome::Delivered(count)
            }
            Some(reason) => {
                state.backoff.advance(Instant::now());
                warn!(
                    events = count,
                    cooldown_ms = state.backoff.current_ms(),
                    %reason,
                    "sink delivery failed, requeueing batch"
                );
                // Requeued items keep their original order ahead of anything
                // captured while the attempt was in flight.
                for event in outbox.into_iter().rev() {
                    state.queue.push_front(event);
                }
                self.inner
                    .counters
                    .batches_requeued
                    .fetch_add(1, Ordering::Relaxed);
                FlushOutcome::Requeued(count)
            }
        }
    }

    pub async fn pending_events(&self) -> usize {
        self.inner.state.lock().await.queue.len()
    }

    /// Current backoff magnitude; zero outside a failure streak.
    pub async fn backoff_ms(&self) -> u64 {
        self.inner.state.lock().await.backoff.current_ms()
    }

    pub fn stats(&self) -> PipelineStats {
        let counters = &self.inner.counters;
        PipelineStats {
            events_appended: counters.events_appended.load(Ordering::Relaxed),
            size_flushes: counters.size_flushes.load(Ordering::Relaxed),
            timers_armed: counters.timers_armed.load(Ordering::Relaxed),
            batches_delivered: counters.batches_delivered.load(Ordering::Relaxed),
            batches_requeued: counters.batches_requeued.load(Ordering::Relaxed),
        }
    }
}

/// Statuses treated as delivery failure: rate-limited or forbidden. Every
/// other response, 4xx and 5xx included, counts as accepted for delivery
/// purposes and is not retried.
fn rejected_by_sink(status: u16) -> bool {
    matches!(status, 429 | 403)
}
