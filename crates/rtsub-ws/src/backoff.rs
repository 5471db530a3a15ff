//! Reconnect backoff: exponential growth with jitter, capped delay, unlimited attempts.

use rand::Rng;
use std::time::Duration;

/// Backoff parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
    /// Share of the delay that is randomized (0.0 = none, 1.0 = full jitter).
    pub jitter: f64,
}

impl BackoffConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.initial_delay.is_zero() {
            return Err("Initial reconnect delay must be > 0".to_string());
        }
        if self.max_delay < self.initial_delay {
            return Err("Max reconnect delay must be >= initial reconnect delay".to_string());
        }
        if self.factor < 1.0 || !self.factor.is_finite() {
            return Err("Backoff factor must be >= 1.0".to_string());
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err("Jitter must be between 0.0 and 1.0".to_string());
        }
        Ok(())
    }
}

/// Delay before reconnect attempt `attempt` (0-based).
pub fn calculate_backoff(config: BackoffConfig, attempt: u32) -> Duration {
    let initial = config.initial_delay.as_secs_f64();
    let max = config.max_delay.as_secs_f64();
    let exponent = config.factor.powf(f64::from(attempt.min(64)));
    let base = (initial * exponent).min(max);

    if config.jitter == 0.0 {
        return Duration::from_secs_f64(base);
    }

    let randomized = rand::rng().random_range(0.0..=base);
    let blended = base * (1.0 - config.jitter) + randomized * config.jitter;
    Duration::from_secs_f64(blended)
}

/// Attempt counter over [`calculate_backoff`].
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay for the next attempt; advances the counter.
    pub fn next_delay(&mut self) -> Duration {
        let delay = calculate_backoff(self.config, self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Called once a connection is established.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(jitter: f64) -> BackoffConfig {
        BackoffConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            factor: 2.0,
            jitter,
        }
    }

    #[test]
    fn test_exponential_growth_without_jitter() {
        let mut backoff = Backoff::new(config(0.0));
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(400));
        assert_eq!(backoff.attempt(), 3);
    }

    #[test]
    fn test_delay_is_capped_and_never_gives_up() {
        let mut backoff = Backoff::new(config(0.0));
        for _ in 0..1_000 {
            assert!(backoff.next_delay() <= Duration::from_secs(2));
        }
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        for attempt in 0..10 {
            let delay = calculate_backoff(config(0.5), attempt);
            let base = calculate_backoff(config(0.0), attempt);
            assert!(delay <= base);
            assert!(delay + Duration::from_micros(1) >= base / 2);
        }
    }

    #[test]
    fn test_reset() {
        let mut backoff = Backoff::new(config(0.0));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_validate() {
        assert!(config(0.5).validate().is_ok());
        assert!(config(1.5).validate().is_err());
        let mut bad = config(0.0);
        bad.factor = 0.5;
        assert!(bad.validate().is_err());
    }
}
