//! Host extraction for error messages and rate-limit reporting.

/// Hostname of `url`, or the URL itself when it does not parse.
pub(super) fn extract_domain(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| url.to_owned())
}
