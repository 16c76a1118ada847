//! Fetch capability: the [`Fetcher`] seam and its `reqwest` implementation.

mod challenge;
mod origin;

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};

use crate::error::FetchError;

use challenge::looks_like_bot_challenge;
use origin::extract_domain;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request options. The core does not interpret these; they are handed
/// to the fetcher as configured on the profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            headers: BTreeMap::new(),
        }
    }
}

/// Anything that can turn a URL into markup.
///
/// Implementations report every failure as a [`FetchError`] so the retry
/// controller can classify it.
pub trait Fetcher: Send + Sync {
    fn fetch(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// [`Fetcher`] over a shared `reqwest` client.
///
/// Status handling:
/// - 429 is [`FetchError::RateLimited`]
/// - 404 and 410 are [`FetchError::NotFound`]
/// - 401 and 403 are [`FetchError::Blocked`]
/// - any other non-2xx is [`FetchError::UnexpectedStatus`]
/// - a 2xx bot-challenge interstitial is [`FetchError::Challenge`]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Builds a fetcher with a default timeout and `User-Agent`; both can be
    /// overridden per request through [`FetchOptions`].
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed (e.g., invalid TLS config).
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<String, FetchError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl {
                url: url.to_owned(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let mut request = self
            .client
            .get(parsed)
            .timeout(options.timeout)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-IN,en;q=0.9");
        if let Some(ua) = &options.user_agent {
            request = request.header(reqwest::header::USER_AGENT, ua);
        }
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok());
            return Err(FetchError::RateLimited {
                domain: extract_domain(url),
                retry_after_secs,
            });
        }

        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(FetchError::NotFound {
                url: url.to_owned(),
            });
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Blocked {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        if !status.is_success() {
            return Err(FetchError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        let body = response.text().await?;
        if looks_like_bot_challenge(&body) {
            return Err(FetchError::Challenge {
                url: url.to_owned(),
            });
        }

        tracing::debug!(url, bytes = body.len(), "fetched page");
        Ok(body)
    }
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;
