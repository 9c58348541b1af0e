//! Retry pacing for transient failures.

use std::time::Duration;

use crate::config::BackoffConfig;

/// Computes the delay before retry number `attempt` (zero-based).
///
/// The base delay is `min_duration * factor^attempt`. With jitter, the base is
/// moved up or down by up to `jitter * base`, picked from `sample` in
/// `0.0..1.0`. The result is always clamped to `[min_duration, max_duration]`.
#[must_use]
pub fn backoff_delay(config: &BackoffConfig, attempt: u32, sample: f64) -> Duration {
    let min = config.min_duration.as_secs_f64();
    let max = config.max_duration.as_secs_f64().max(min);
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);

    let mut secs = min * config.factor.max(1.0).powi(exponent);
    if config.jitter > 0.0 {
        let deviation = sample * config.jitter.min(1.0) * secs;
        // The digit after the first decimal decides the direction.
        if ((sample * 10.0).floor() as u64) & 1 == 0 {
            secs -= deviation;
        } else {
            secs += deviation;
        }
    }

    if !secs.is_finite() {
        return Duration::from_secs_f64(max);
    }
    Duration::from_secs_f64(secs.clamp(min, max))
}

/// Per-dispatch retry budget.
///
/// A fresh `Backoff` is created for each new dispatch; retries of that
/// dispatch draw from the same instance.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    retries: u32,
}

impl Backoff {
    #[must_use]
    pub const fn new(config: BackoffConfig) -> Self {
        Self { config, retries: 0 }
    }

    /// Number of retries scheduled so far.
    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.retries
    }

    /// Total transport invocations so far, assuming each scheduled retry ran.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.retries + 1
    }

    /// Returns the delay before the next retry, or `None` once the attempt
    /// budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts() >= self.config.max_attempts {
            return None;
        }
        let delay = backoff_delay(&self.config, self.retries, fastrand::f64());
        self.retries += 1;
        Some(delay)
    }
}
