//! Process-wide request rate limiting.
//!
//! One token bucket is shared by every worker in a batch and consulted before
//! each fetch attempt, retries included. It bounds aggregate request issuance
//! independently of per-item backoff, so many items retrying at once cannot
//! amplify load on a source.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared token bucket. Clones share the same bucket.
#[derive(Clone, Default)]
pub struct RequestLimiter {
    inner: Option<Arc<DirectLimiter>>,
}

impl RequestLimiter {
    /// A bucket refilling at `per_second` requests per second. `0` disables
    /// limiting.
    #[must_use]
    pub fn per_second(per_second: u32) -> Self {
        match NonZeroU32::new(per_second) {
            Some(rate) => Self {
                inner: Some(Arc::new(RateLimiter::direct(Quota::per_second(rate)))),
            },
            None => Self::unlimited(),
        }
    }

    #[must_use]
    pub fn unlimited() -> Self {
        Self { inner: None }
    }

    #[must_use]
    pub fn is_limited(&self) -> bool {
        self.inner.is_some()
    }

    /// Waits until the bucket grants one request. Suspends the task rather
    /// than blocking the thread.
    pub async fn acquire(&self) {
        if let Some(limiter) = &self.inner {
            limiter.until_ready().await;
        }
    }
}

impl std::fmt::Debug for RequestLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLimiter")
            .field("limited", &self.is_limited())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    #[tokio::test]
    async fn unlimited_never_waits() {
        let limiter = RequestLimiter::per_second(0);
        assert!(!limiter.is_limited());
        let start = Instant::now();
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn clones_share_one_bucket() {
        let limiter = RequestLimiter::per_second(1);
        let clone = limiter.clone();
        let start = Instant::now();
        limiter.acquire().await;
        clone.acquire().await;
        // The second token only becomes available after roughly one second.
        assert!(start.elapsed() >= Duration::from_millis(900));
    }
}
