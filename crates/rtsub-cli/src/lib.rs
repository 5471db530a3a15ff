//! rtsub command-line application.
//!
//! Opens one real-time client, subscribes every configured query and writes
//! each event to stdout as a JSON line:
//! - Configuration from TOML with command-line overrides
//! - API key or bearer token credentials
//! - Status transitions logged through tracing
//! - Clean shutdown on Ctrl-C

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::{AppConfig, AuthConfig, AuthMode, SubscriptionConfig};
pub use error::{AppError, AppResult};
