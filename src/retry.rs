//! Retry policy for transient failures.
//!
//! A [`RetryPolicy`] bounds how many times a request is re-sent after a
//! transient failure (network error, per-attempt timeout, 429, 5xx) and how
//! long the client waits in between. Delays grow exponentially from one
//! second and never exceed the policy's maximum interval.

use rand::Rng;
use std::time::Duration;

/// Number of retries used by [`RetryPolicy::enabled`] when `0` is requested.
pub const DEFAULT_MAX_RETRIES: usize = 4;

/// Interval cap used by [`RetryPolicy::enabled`] when zero is requested.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(30);

const INITIAL_INTERVAL: Duration = Duration::from_secs(1);

/// Defines how often and how patiently failed requests are retried.
///
/// # Examples
///
/// ```
/// use account_management::RetryPolicy;
/// use std::time::Duration;
///
/// // Single attempt
/// let none = RetryPolicy::disabled();
/// assert!(!none.is_enabled());
///
/// // Up to 3 retries, waiting 1s, 2s, 2s
/// let policy = RetryPolicy::new(3, Duration::from_secs(2)).with_jitter(false);
/// assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_secs(2)));
/// assert_eq!(policy.delay_for_attempt(4), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_retries: usize,
    max_interval: Duration,
    jitter: bool,
}

impl RetryPolicy {
    /// Creates a policy allowing `max_retries` retries after the initial
    /// attempt. `max_retries == 0` disables retries.
    pub fn new(max_retries: usize, max_interval: Duration) -> Self {
        Self {
            max_retries,
            max_interval,
            jitter: true,
        }
    }

    /// Creates an enabled policy, substituting [`DEFAULT_MAX_RETRIES`] and
    /// [`DEFAULT_MAX_INTERVAL`] for zero arguments.
    pub fn enabled(max_retries: usize, max_interval: Duration) -> Self {
        let max_retries = if max_retries == 0 {
            DEFAULT_MAX_RETRIES
        } else {
            max_retries
        };
        let max_interval = if max_interval.is_zero() {
            DEFAULT_MAX_INTERVAL
        } else {
            max_interval
        };
        Self::new(max_retries, max_interval)
    }

    /// A policy that makes a single attempt.
    pub fn disabled() -> Self {
        Self::new(0, DEFAULT_MAX_INTERVAL)
    }

    /// Enables or disables random jitter on computed delays.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns `true` if at least one retry is allowed.
    pub fn is_enabled(&self) -> bool {
        self.max_retries > 0
    }

    /// The maximum number of retries after the initial attempt.
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// The upper bound on any single delay.
    pub fn max_interval(&self) -> Duration {
        self.max_interval
    }

    /// Returns the delay before the given retry, or `None` if retries are
    /// exhausted.
    ///
    /// `attempt` is 1-indexed: 1 is the first retry.
    pub fn delay_for_attempt(&self, attempt: usize) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_retries {
            return None;
        }

        let multiplier = 2u32.saturating_pow(attempt.saturating_sub(1) as u32);
        let delay = INITIAL_INTERVAL
            .saturating_mul(multiplier)
            .min(self.max_interval);

        if self.jitter {
            // Between 50% and 100% of the computed delay
            let jitter_factor = rand::thread_rng().gen_range(0.5..=1.0);
            Some(delay.mul_f64(jitter_factor))
        } else {
            Some(delay)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}
