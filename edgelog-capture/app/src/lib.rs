#![warn(rust_2018_idioms)]

pub mod app;
pub mod buffer;
pub mod domain;
pub mod proxy;
pub mod sender;

// Re-export main types for easy access
pub use app::{Config, ConfigError};
pub use buffer::{Accumulator, BatchConfig, FlushOutcome};
pub use domain::LogEvent;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
