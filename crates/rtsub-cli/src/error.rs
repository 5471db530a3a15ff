//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Real-time client error: {0}")]
    Realtime(#[from] rtsub_ws::RealtimeError),

    #[error("Auth error: {0}")]
    Auth(#[from] rtsub_core::AuthError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] rtsub_telemetry::TelemetryError),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
