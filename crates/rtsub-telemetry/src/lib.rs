//! Structured logging for rtsub.
//!
//! JSON output in production (`RUST_ENV=production`), pretty output otherwise,
//! filtered through `RUST_LOG`.

pub mod error;
pub mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, init_logging_with, LogFormat, DEFAULT_FILTER};
