//! Client configuration.

use crate::backoff::BackoffConfig;
use crate::error::{RealtimeError, RealtimeResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Real-time client configuration.
///
/// Durations are expressed in milliseconds so the struct maps directly onto
/// TOML configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API endpoint (or real-time endpoint) of the service.
    pub endpoint: String,
    /// Deadline for `connection_ack` after `connection_init` is sent.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// Deadline for `start_ack` after `start` is sent.
    #[serde(default = "default_start_ack_timeout_ms")]
    pub start_ack_timeout_ms: u64,
    /// Deadline for `complete` after `stop` is sent.
    #[serde(default = "default_stop_ack_timeout_ms")]
    pub stop_ack_timeout_ms: u64,
    /// Keep-alive interval used when `connection_ack` does not carry one.
    #[serde(default = "default_keep_alive_ms")]
    pub default_keep_alive_ms: u64,
    /// Silence timeout = keep-alive interval * multiplier.
    #[serde(default = "default_keep_alive_multiplier")]
    pub keep_alive_multiplier: u32,
    /// First reconnect delay.
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    /// Reconnect delay ceiling. Attempts themselves are unlimited.
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    /// Share of each delay that is randomized (0.0-1.0).
    #[serde(default = "default_reconnect_jitter")]
    pub reconnect_jitter: f64,
    /// Identical consecutive handshake rejections before giving up.
    #[serde(default = "default_max_identical_rejections")]
    pub max_identical_rejections: u32,
    /// Per-subscription event queue capacity: the hand-off to each
    /// subscriber's relay, and the channel created by `subscribe_channel`.
    #[serde(default = "default_sink_capacity")]
    pub sink_capacity: usize,
    /// Capacity of the client's input queue.
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

fn default_handshake_timeout_ms() -> u64 {
    15_000
}

fn default_start_ack_timeout_ms() -> u64 {
    15_000
}

fn default_stop_ack_timeout_ms() -> u64 {
    5_000
}

fn default_keep_alive_ms() -> u64 {
    300_000
}

fn default_keep_alive_multiplier() -> u32 {
    2
}

fn default_reconnect_base_delay_ms() -> u64 {
    1_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}

fn default_reconnect_jitter() -> f64 {
    0.5
}

fn default_max_identical_rejections() -> u32 {
    3
}

fn default_sink_capacity() -> usize {
    64
}

fn default_command_buffer() -> usize {
    256
}

impl ClientConfig {
    /// Configuration with defaults for `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            start_ack_timeout_ms: default_start_ack_timeout_ms(),
            stop_ack_timeout_ms: default_stop_ack_timeout_ms(),
            default_keep_alive_ms: default_keep_alive_ms(),
            keep_alive_multiplier: default_keep_alive_multiplier(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            reconnect_jitter: default_reconnect_jitter(),
            max_identical_rejections: default_max_identical_rejections(),
            sink_capacity: default_sink_capacity(),
            command_buffer: default_command_buffer(),
        }
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> RealtimeResult<()> {
        let positive = [
            ("handshake_timeout_ms", self.handshake_timeout_ms),
            ("start_ack_timeout_ms", self.start_ack_timeout_ms),
            ("stop_ack_timeout_ms", self.stop_ack_timeout_ms),
            ("default_keep_alive_ms", self.default_keep_alive_ms),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(RealtimeError::Config(format!("{name} must be > 0")));
            }
        }
        if self.keep_alive_multiplier == 0 {
            return Err(RealtimeError::Config(
                "keep_alive_multiplier must be > 0".to_string(),
            ));
        }
        if self.max_identical_rejections == 0 {
            return Err(RealtimeError::Config(
                "max_identical_rejections must be > 0".to_string(),
            ));
        }
        if self.sink_capacity == 0 || self.command_buffer == 0 {
            return Err(RealtimeError::Config(
                "sink_capacity and command_buffer must be > 0".to_string(),
            ));
        }
        self.backoff().validate().map_err(RealtimeError::Config)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn start_ack_timeout(&self) -> Duration {
        Duration::from_millis(self.start_ack_timeout_ms)
    }

    pub fn stop_ack_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_ack_timeout_ms)
    }

    pub fn default_keep_alive(&self) -> Duration {
        Duration::from_millis(self.default_keep_alive_ms)
    }

    pub fn backoff(&self) -> BackoffConfig {
        BackoffConfig {
            initial_delay: Duration::from_millis(self.reconnect_base_delay_ms),
            max_delay: Duration::from_millis(self.reconnect_max_delay_ms),
            factor: 2.0,
            jitter: self.reconnect_jitter,
        }
    }
}
