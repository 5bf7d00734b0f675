//! Retry policy for transient failures.
//!
//! [`RetryPolicy`] is a plain value: the client asks it whether an error is
//! worth another attempt and how long to wait first. Nothing here performs
//! I/O or sleeps, so the policy can be tested on its own.

use crate::{Error, ErrorKind};
use rand::Rng;
use std::time::Duration;

/// Error kinds retried by default.
pub const DEFAULT_RETRYABLE: [ErrorKind; 4] = [
    ErrorKind::Connection,
    ErrorKind::Timeout,
    ErrorKind::Server,
    ErrorKind::RateLimited,
];

/// Defines when and how to retry failed requests.
///
/// The delay before the retry that follows failed attempt `n` (0-indexed) is
/// `min(base_delay * growth_factor^n, max_delay)`, optionally scaled by a
/// random factor in `[0.5, 1.5)` and capped at `max_delay` again. A
/// server-suggested delay (`Retry-After`) replaces the computed one.
///
/// # Examples
///
/// ```
/// use mender_sdk::RetryPolicy;
/// use std::time::Duration;
///
/// // 100ms, 200ms, 400ms, 800ms, capped at 1s
/// let policy = RetryPolicy::default()
///     .max_retries(5)
///     .base_delay(Duration::from_millis(100))
///     .max_delay(Duration::from_secs(1))
///     .jitter(false);
///
/// assert_eq!(policy.delay_for_attempt(0, None), Duration::from_millis(100));
/// assert_eq!(policy.delay_for_attempt(3, None), Duration::from_millis(800));
/// assert_eq!(policy.delay_for_attempt(4, None), Duration::from_secs(1));
/// assert_eq!(policy.max_attempts(), 6);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    growth_factor: f64,
    jitter: bool,
    retryable: Vec<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            growth_factor: 2.0,
            jitter: true,
            retryable: DEFAULT_RETRYABLE.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self::default().max_retries(0)
    }

    /// Sets the number of retries after the first attempt.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the delay before the first retry.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the upper bound on computed delays.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the exponential growth factor. Values below 1.0 are clamped to 1.0.
    pub fn growth_factor(mut self, factor: f64) -> Self {
        self.growth_factor = if factor.is_finite() { factor.max(1.0) } else { 1.0 };
        self
    }

    /// Enables or disables random jitter.
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Replaces the set of retryable error kinds.
    pub fn retry_on(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.retryable = kinds.into_iter().collect();
        self
    }

    /// Returns the configured number of retries.
    pub fn retries(&self) -> u32 {
        self.max_retries
    }

    /// Total number of attempts, the first one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Returns `true` if errors of this kind are retried.
    pub fn is_retryable(&self, kind: ErrorKind) -> bool {
        self.retryable.contains(&kind)
    }

    /// Decides whether `error`, observed on 0-indexed `attempt`, gets another try.
    pub fn should_retry(&self, error: &Error, attempt: u32) -> bool {
        attempt < self.max_retries && self.is_retryable(error.kind())
    }

    /// Returns the delay before retrying after failed attempt `attempt` (0-indexed).
    ///
    /// `suggested` is a server-provided delay; when present it is returned as-is.
    pub fn delay_for_attempt(&self, attempt: u32, suggested: Option<Duration>) -> Duration {
        if let Some(delay) = suggested {
            return delay;
        }

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.base_delay.as_secs_f64() * self.growth_factor.powi(exponent);
        let max = self.max_delay.as_secs_f64();
        let delay = if scaled.is_finite() { scaled.min(max) } else { max };

        let delay = if self.jitter {
            let factor = rand::thread_rng().gen_range(0.5..1.5);
            (delay * factor).min(max)
        } else {
            delay
        };

        Duration::try_from_secs_f64(delay.max(0.0))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}
