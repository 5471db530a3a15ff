//! Keep-alive monitoring for the real-time connection.
//!
//! Tracks the last received frame and reports when the connection has been
//! silent for longer than the negotiated interval times a fixed multiplier.
//! Silence is treated as connection loss even if the transport looks open.

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Keep-alive monitor. Armed only while connected.
#[derive(Debug)]
pub struct KeepAliveMonitor {
    /// Interval used when `connection_ack` does not carry one.
    default_interval: Duration,
    /// Timeout = interval * multiplier.
    multiplier: u32,
    /// Negotiated interval; `None` while disarmed.
    interval: Option<Duration>,
    /// Last frame received (any type).
    last_activity: Instant,
}

impl KeepAliveMonitor {
    pub fn new(default_interval: Duration, multiplier: u32) -> Self {
        Self {
            default_interval,
            multiplier: multiplier.max(1),
            interval: None,
            last_activity: Instant::now(),
        }
    }

    /// Arm on entering `Connected`.
    pub fn arm(&mut self, negotiated: Option<Duration>, now: Instant) {
        let interval = negotiated.unwrap_or(self.default_interval);
        self.interval = Some(interval);
        self.last_activity = now;
        debug!(
            interval_ms = interval.as_millis() as u64,
            multiplier = self.multiplier,
            "Keep-alive monitor armed"
        );
    }

    /// Disarm on leaving `Connected`.
    pub fn disarm(&mut self) {
        self.interval = None;
    }

    pub fn is_armed(&self) -> bool {
        self.interval.is_some()
    }

    /// Record that a frame was received.
    pub fn record_activity(&mut self, now: Instant) {
        self.last_activity = now;
    }

    /// Silence timeout, if armed.
    pub fn timeout(&self) -> Option<Duration> {
        self.interval
            .map(|interval| interval.saturating_mul(self.multiplier))
    }

    /// Instant at which the connection is declared dead, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.timeout().map(|timeout| self.last_activity + timeout)
    }

    /// Check whether the silence timeout has elapsed.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }
}
