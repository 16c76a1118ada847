//! Fetch/retry controller.
//!
//! One request moves through
//! `Idle -> Attempting -> (Success | Backoff -> Attempting | GivenUp)`.
//! Transient failures wait `min(base * 2^(n-1), max_wait)` (plus jitter) after
//! the n-th failure; permanent failures give up at once. Every attempt is
//! reported through [`Diagnostics`].
//!
//! Waiting goes through an injected [`Sleeper`], so tests observe the exact
//! backoff sequence without wall-clock delays.

use std::future::Future;
use std::time::Duration;

use shelfscan_core::{FetchParams, SiteProfile};
use tokio_util::sync::CancellationToken;

use crate::client::{FetchOptions, Fetcher};
use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::error::{FailureClass, FetchError, ScraperError};
use crate::rate_limit::RequestLimiter;
use crate::types::RawDocument;

/// Non-blocking wait used between attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// [`Sleeper`] backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// Backoff parameters for one source.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Total attempt budget, first attempt included.
    pub max_attempts: u32,
    pub base: Duration,
    pub max_wait: Duration,
    /// Width of the symmetric jitter band as a fraction of the delay.
    pub jitter_ratio: f64,
}

impl From<&FetchParams> for BackoffPolicy {
    fn from(params: &FetchParams) -> Self {
        Self {
            max_attempts: params.max_retries.max(1),
            base: params.base_backoff(),
            max_wait: params.max_wait(),
            jitter_ratio: params.jitter_ratio.clamp(0.0, 1.0),
        }
    }
}

impl BackoffPolicy {
    /// Delay after the `failures`-th consecutive failure (1-based), before
    /// jitter: `min(base * 2^(failures - 1), max_wait)`.
    #[must_use]
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .map_or(self.max_wait, |delay| delay.min(self.max_wait))
    }

    /// [`Self::delay_for`] spread by up to `jitter_ratio / 2` either way and
    /// capped at `max_wait`.
    #[must_use]
    pub fn jittered_delay_for(&self, failures: u32) -> Duration {
        let delay = self.delay_for(failures);
        if self.jitter_ratio <= 0.0 {
            return delay;
        }
        let spread = self.jitter_ratio * (rand::random::<f64>() - 0.5);
        delay.mul_f64((1.0 + spread).max(0.0)).min(self.max_wait)
    }
}

/// Bookkeeping for one request; discarded once it reaches a terminal phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryState {
    pub attempt: u32,
    pub next_backoff: Option<Duration>,
    pub last_failure: Option<FailureClass>,
}

enum RetryPhase {
    Idle,
    Attempting,
    Backoff(Duration),
    Success(String),
    GivenUp(ScraperError),
}

/// Wraps a [`Fetcher`] with rate limiting, per-attempt timeouts, retry with
/// backoff, and cancellation.
pub struct FetchController<F, S = TokioSleeper> {
    fetcher: F,
    sleeper: S,
    limiter: RequestLimiter,
    diagnostics: Diagnostics,
    default_timeout: Duration,
    default_user_agent: Option<String>,
}

impl<F: Fetcher> FetchController<F, TokioSleeper> {
    #[must_use]
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            sleeper: TokioSleeper,
            limiter: RequestLimiter::unlimited(),
            diagnostics: Diagnostics::disabled(),
            default_timeout: FetchOptions::default().timeout,
            default_user_agent: None,
        }
    }
}

impl<F: Fetcher, S: Sleeper> FetchController<F, S> {
    #[must_use]
    pub fn with_sleeper<S2: Sleeper>(self, sleeper: S2) -> FetchController<F, S2> {
        FetchController {
            fetcher: self.fetcher,
            sleeper,
            limiter: self.limiter,
            diagnostics: self.diagnostics,
            default_timeout: self.default_timeout,
            default_user_agent: self.default_user_agent,
        }
    }

    #[must_use]
    pub fn with_limiter(mut self, limiter: RequestLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Timeout used when a profile does not set `timeout_secs`.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// `User-Agent` used when a profile does not set one.
    #[must_use]
    pub fn with_default_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.default_user_agent = Some(user_agent.into());
        self
    }

    pub(crate) fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    fn options_for(&self, profile: &SiteProfile) -> FetchOptions {
        FetchOptions {
            timeout: profile
                .fetch
                .timeout_secs
                .map_or(self.default_timeout, Duration::from_secs),
            user_agent: profile
                .fetch
                .user_agent
                .clone()
                .or_else(|| self.default_user_agent.clone()),
            headers: profile.fetch.headers.clone(),
        }
    }

    /// Fetches `url` for `profile`'s source, retrying transient failures.
    ///
    /// Cancellation is honoured before each attempt and during backoff; an
    /// attempt already in flight is allowed to finish.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::PermanentFetch`] on the first permanent failure.
    /// - [`ScraperError::ExhaustedRetries`] once the attempt budget is spent.
    /// - [`ScraperError::Cancelled`] if `cancel` fires before success.
    pub async fn fetch_with_retry(
        &self,
        url: &str,
        profile: &SiteProfile,
        item: &str,
        cancel: &CancellationToken,
    ) -> Result<RawDocument, ScraperError> {
        let policy = BackoffPolicy::from(&profile.fetch);
        let options = self.options_for(profile);
        let mut state = RetryState::default();
        let mut phase = RetryPhase::Idle;

        loop {
            phase = match phase {
                RetryPhase::Idle => {
                    if cancel.is_cancelled() {
                        RetryPhase::GivenUp(ScraperError::Cancelled)
                    } else {
                        self.wait_for_slot(cancel).await
                    }
                }
                RetryPhase::Backoff(delay) => {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => RetryPhase::GivenUp(ScraperError::Cancelled),
                        () = self.sleeper.sleep(delay) => self.wait_for_slot(cancel).await,
                    }
                }
                RetryPhase::Attempting => {
                    state.attempt += 1;
                    let attempt = self.fetcher.fetch(url, &options);
                    let result = tokio::time::timeout(options.timeout, attempt)
                        .await
                        .unwrap_or_else(|_| {
                            Err(FetchError::Timeout {
                                url: url.to_owned(),
                                timeout_secs: options.timeout.as_secs(),
                            })
                        });
                    self.after_attempt(result, url, item, &policy, &mut state)
                }
                RetryPhase::Success(body) => {
                    return Ok(RawDocument::new(
                        profile.id.clone(),
                        Some(url.to_owned()),
                        body,
                        state.attempt,
                    ));
                }
                RetryPhase::GivenUp(err) => return Err(err),
            };
        }
    }

    /// Waits for the global limiter unless cancelled first.
    async fn wait_for_slot(&self, cancel: &CancellationToken) -> RetryPhase {
        tokio::select! {
            biased;
            () = cancel.cancelled() => RetryPhase::GivenUp(ScraperError::Cancelled),
            () = self.limiter.acquire() => RetryPhase::Attempting,
        }
    }

    fn after_attempt(
        &self,
        result: Result<String, FetchError>,
        url: &str,
        item: &str,
        policy: &BackoffPolicy,
        state: &mut RetryState,
    ) -> RetryPhase {
        let err = match result {
            Ok(body) => {
                self.diagnostics.emit(DiagnosticEvent::FetchAttempt {
                    item: item.to_owned(),
                    url: url.to_owned(),
                    attempt: state.attempt,
                    succeeded: true,
                    class: None,
                    error: None,
                    backoff_ms: None,
                });
                return RetryPhase::Success(body);
            }
            Err(err) => err,
        };

        let class = err.classify();
        state.last_failure = Some(class);
        state.next_backoff = match class {
            FailureClass::Transient if state.attempt < policy.max_attempts => {
                Some(policy.jittered_delay_for(state.attempt))
            }
            _ => None,
        };

        self.diagnostics.emit(DiagnosticEvent::FetchAttempt {
            item: item.to_owned(),
            url: url.to_owned(),
            attempt: state.attempt,
            succeeded: false,
            class: Some(class),
            error: Some(err.to_string()),
            backoff_ms: state
                .next_backoff
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        });

        match (class, state.next_backoff) {
            (FailureClass::Permanent, _) => RetryPhase::GivenUp(ScraperError::PermanentFetch {
                url: url.to_owned(),
                source: err,
            }),
            (FailureClass::Transient, Some(delay)) => {
                let transient = ScraperError::TransientFetch {
                    url: url.to_owned(),
                    attempt: state.attempt,
                    source: err,
                };
                tracing::debug!(
                    error = %transient,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "backing off before retry"
                );
                RetryPhase::Backoff(delay)
            }
            (FailureClass::Transient, None) => RetryPhase::GivenUp(ScraperError::ExhaustedRetries {
                url: url.to_owned(),
                attempts: state.attempt,
                source: err,
            }),
        }
    }
}

#[cfg(test)]
#[path = "retry_test.rs"]
mod tests;
