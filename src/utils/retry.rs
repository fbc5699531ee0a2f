//! Retry utilities with exponential backoff
//!
//! The pool itself never retries; callers that want another attempt on a
//! different client use these helpers around their select-and-send step.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not counting the initial attempt)
    pub max_retries: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Cap on the delay between retries
    pub max_delay: Duration,

    /// Growth factor of the delay per attempt
    pub multiplier: f64,

    /// Randomize each delay to between half and all of its nominal value
    pub use_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    /// Delay before retry number `retry` (0-indexed)
    ///
    /// The nominal delay grows geometrically and is capped at `max_delay`;
    /// with jitter the result lies in `[nominal / 2, nominal]`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(retry.min(i32::MAX as u32) as i32);
        let nanos = (self.initial_delay.as_nanos() as f64 * factor)
            .min(self.max_delay.as_nanos() as f64)
            .max(0.0);
        let nominal = Duration::from_nanos(nanos.round() as u64);

        if !self.use_jitter || nominal.is_zero() {
            return nominal;
        }
        let scale = rand::thread_rng().gen_range(0.5..=1.0);
        nominal.mul_f64(scale)
    }
}

/// Result of a retry operation
#[derive(Debug)]
pub struct RetryResult<T, E> {
    /// The final result (success or last error)
    pub result: Result<T, E>,

    /// Number of attempts made
    pub attempts: u32,

    /// Total time spent sleeping between attempts
    pub total_delay: Duration,
}

/// Run `operation` until it succeeds, fails permanently or retries run out
///
/// `operation` receives the 1-based attempt number. An error is retried only
/// when `is_retryable` says so.
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    config: &RetryConfig,
    is_retryable: R,
    mut operation: F,
) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
{
    let mut attempts = 0;
    let mut total_delay = Duration::ZERO;

    loop {
        attempts += 1;

        let err = match operation(attempts).await {
            Ok(value) => {
                return RetryResult {
                    result: Ok(value),
                    attempts,
                    total_delay,
                }
            }
            Err(err) => err,
        };

        if attempts > config.max_retries || !is_retryable(&err) {
            return RetryResult {
                result: Err(err),
                attempts,
                total_delay,
            };
        }

        let delay = config.delay_for(attempts - 1);
        total_delay += delay;

        tracing::debug!(
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            "Retrying after failed attempt"
        );

        sleep(delay).await;
    }
}
