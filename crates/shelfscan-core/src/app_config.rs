use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Process-level settings read from the environment.
///
/// Per-source behaviour (selectors, retry budget, backoff) lives in the
/// profile registry instead; these values only cover the batch as a whole.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub profiles_path: PathBuf,
    /// Fallback per-attempt timeout for profiles that do not set one.
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Size of the worker pool; always at least 1.
    pub max_concurrency: usize,
    /// Aggregate request rate across all workers. `0` disables the limiter.
    pub requests_per_second: u32,
}
