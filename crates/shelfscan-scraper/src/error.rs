use serde::Serialize;
use shelfscan_core::FieldName;
use thiserror::Error;

/// Whether a failed fetch attempt is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Timeouts, rate limiting, 5xx: another attempt may succeed.
    Transient,
    /// Not found, blocked, malformed request: another attempt returns the same.
    Permanent,
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureClass::Transient => write!(f, "transient"),
            FailureClass::Permanent => write!(f, "permanent"),
        }
    }
}

/// Failure reported by a [`crate::Fetcher`] for a single attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("attempt timed out after {timeout_secs}s fetching {url}")]
    Timeout { url: String, timeout_secs: u64 },

    #[error("rate limited by {domain}")]
    RateLimited {
        domain: String,
        retry_after_secs: Option<u64>,
    },

    #[error("page not found: {url}")]
    NotFound { url: String },

    #[error("access blocked (HTTP {status}) for {url}")]
    Blocked { status: u16, url: String },

    #[error("bot challenge page served for {url}")]
    Challenge { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl FetchError {
    /// Classifies the failure for the retry controller.
    ///
    /// Transient:
    /// - network-level timeout, connect, or request failures
    /// - [`FetchError::Timeout`] (per-attempt deadline)
    /// - [`FetchError::RateLimited`] (HTTP 429)
    /// - [`FetchError::UnexpectedStatus`] for 5xx and 408
    ///
    /// Permanent: everything else, including 404/410, 401/403, bot challenge
    /// pages, other 4xx, and URLs that do not parse.
    #[must_use]
    pub fn classify(&self) -> FailureClass {
        match self {
            FetchError::Http(e) => {
                if e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.is_body()
                    || e.status().is_some_and(|s| s.is_server_error())
                {
                    FailureClass::Transient
                } else {
                    FailureClass::Permanent
                }
            }
            FetchError::Timeout { .. } | FetchError::RateLimited { .. } => FailureClass::Transient,
            FetchError::UnexpectedStatus { status, .. } => {
                if *status >= 500 || *status == 408 {
                    FailureClass::Transient
                } else {
                    FailureClass::Permanent
                }
            }
            FetchError::NotFound { .. }
            | FetchError::Blocked { .. }
            | FetchError::Challenge { .. }
            | FetchError::InvalidUrl { .. } => FailureClass::Permanent,
        }
    }
}

/// Pipeline-level error taxonomy.
///
/// Only [`ScraperError::PermanentFetch`], [`ScraperError::ExhaustedRetries`]
/// and [`ScraperError::Cancelled`] ever surface as a failed item. `Parse` and
/// `Validation` are recovered where they happen: an unparseable page goes
/// straight to the emergency tier, an invalid field becomes missing.
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("transient fetch failure on attempt {attempt} for {url}: {source}")]
    TransientFetch {
        url: String,
        attempt: u32,
        #[source]
        source: FetchError,
    },

    #[error("permanent fetch failure for {url}: {source}")]
    PermanentFetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("markup could not be parsed: {reason}")]
    Parse { reason: String },

    #[error("field {field} failed validation: {reason}")]
    Validation { field: FieldName, reason: String },

    #[error("gave up on {url} after {attempts} attempts: {source}")]
    ExhaustedRetries {
        url: String,
        attempts: u32,
        #[source]
        source: FetchError,
    },

    #[error("cancelled")]
    Cancelled,
}
