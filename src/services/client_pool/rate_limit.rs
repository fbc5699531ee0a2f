//! Per-client rate limiting
//!
//! Each client enforces a minimum spacing between the requests it sends.
//! The next permitted slot is anchored to the moment a request is let
//! through, not to when its response arrives, so a slow upstream does not
//! stretch the spacing further.

use crate::error::SendError;
use crate::utils::deadline_after;
use async_trait::async_trait;
use reqwest::{Request, Response};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

use super::transport::Transport;

/// Minimum-interval gate for a single client
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    next_run: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a gate enforcing `interval` between requests; zero disables it
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_run: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_unlimited(&self) -> bool {
        self.interval.is_zero()
    }

    /// Wait for the next permitted slot and claim it
    ///
    /// Concurrent callers queue on the gate, so each of them observes the
    /// full interval after the previous one.
    pub async fn until_ready(&self) {
        if self.is_unlimited() {
            return;
        }

        let mut next_run = self.next_run.lock().await;
        if let Some(at) = *next_run {
            if at > Instant::now() {
                tracing::trace!(
                    wait_ms = (at - Instant::now()).as_millis() as u64,
                    "Waiting for rate limit slot"
                );
                sleep_until(at).await;
            }
        }
        *next_run = Some(deadline_after(Instant::now(), self.interval));
    }
}

/// A transport behind a `RateLimiter`
pub struct RateLimitedTransport<T> {
    limiter: RateLimiter,
    inner: T,
}

impl<T: Transport> RateLimitedTransport<T> {
    pub fn new(inner: T, interval: Duration) -> Self {
        Self {
            limiter: RateLimiter::new(interval),
            inner,
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

#[async_trait]
impl<T: Transport> Transport for RateLimitedTransport<T> {
    async fn execute(&self, request: Request) -> Result<Response, SendError> {
        self.limiter.until_ready().await;
        self.inner.execute(request).await
    }
}

// ============================================================================
// Tests
// ============================================================================
