use std::time::Duration;

/// Well-known status codes used by the default retry policy.
pub mod status {
    /// Reported when the transport could not produce an HTTP status
    /// (connection refused, DNS failure, dropped socket).
    pub const UNKNOWN: u16 = 0;
    pub const REQUEST_TIMEOUT: u16 = 408;
    pub const TOO_MANY_REQUESTS: u16 = 429;
    pub const SERVICE_UNAVAILABLE: u16 = 503;
    pub const GATEWAY_TIMEOUT: u16 = 504;

    /// Returns `true` for statuses in the 2xx range.
    #[must_use]
    pub const fn is_success(status: u16) -> bool {
        status >= 200 && status < 300
    }
}

/// Retry pacing for transient failures.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Total number of transport invocations allowed for one dispatch,
    /// including the first one.
    pub max_attempts: u32,

    /// Delay before the first retry. Delays never go below this.
    pub min_duration: Duration,

    /// Upper bound for any single retry delay.
    pub max_duration: Duration,

    /// Multiplier applied to the delay after each retry.
    pub factor: f64,

    /// Random deviation as a fraction of the computed delay, in `0.0..=1.0`.
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            min_duration: Duration::from_millis(300),
            max_duration: Duration::from_secs(5),
            factor: 2.0,
            jitter: 0.0,
        }
    }
}

impl BackoffConfig {
    /// Creates a backoff configuration with the default factor and no jitter.
    #[must_use]
    pub const fn new(max_attempts: u32, min_duration: Duration, max_duration: Duration) -> Self {
        Self {
            max_attempts,
            min_duration,
            max_duration,
            factor: 2.0,
            jitter: 0.0,
        }
    }

    /// Sets the random deviation applied to each delay.
    #[must_use]
    pub const fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }
}

/// Configuration for a [`Coordinator`](crate::coordinator::Coordinator).
///
/// This controls how many times transient failures are retried, how long the
/// coordinator waits between attempts, and which statuses count as transient.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    /// Retry pacing.
    pub backoff: BackoffConfig,

    /// Statuses that are retried while the attempt budget lasts.
    ///
    /// Anything else (including every 4xx other than 408/429) is surfaced on
    /// the first failure.
    pub retryable_status_codes: Vec<u16>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            retryable_status_codes: vec![
                status::UNKNOWN,
                status::REQUEST_TIMEOUT,
                status::TOO_MANY_REQUESTS,
                status::SERVICE_UNAVAILABLE,
                status::GATEWAY_TIMEOUT,
            ],
        }
    }
}

impl CoordinatorConfig {
    /// Creates a configuration with the given backoff and retryable statuses.
    #[must_use]
    pub const fn new(backoff: BackoffConfig, retryable_status_codes: Vec<u16>) -> Self {
        Self {
            backoff,
            retryable_status_codes,
        }
    }

    /// Replaces the backoff settings.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replaces the set of retryable statuses.
    #[must_use]
    pub fn with_retryable_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_status_codes = codes.into_iter().collect();
        self
    }

    /// Returns `true` if a response with this status may be retried.
    #[must_use]
    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }
}
