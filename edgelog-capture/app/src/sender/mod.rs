pub mod backoff;
pub mod client;
pub mod serialization;

pub use backoff::Backoff;
pub use client::{SinkClient, TransportError};

#[cfg(test)]
use mockall::automock;

/// Transport seam between the batch state machine and the wire.
///
/// Resolves to the HTTP status for any response the sink produced, or a
/// transport error when no response was obtained at all. Outcome
/// classification belongs to the flush step, not the transport.
#[cfg_attr(test, automock)]
pub trait SinkTransport: Send + Sync {
    fn send_batch(
        &self,
        body: String,
    ) -> impl std::future::Future<Output = Result<u16, TransportError>> + Send;
}
