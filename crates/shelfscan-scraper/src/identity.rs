//! Canonical identity keys used to deduplicate items within a batch.

use reqwest::Url;
use sha2::{Digest, Sha256};

/// Query parameters that only track where a visitor came from.
const TRACKING_PARAMS: &[&str] = &["ref", "ref_", "tag", "fbclid", "gclid"];

fn is_tracking_param(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name.starts_with("utm_") || TRACKING_PARAMS.contains(&name.as_str())
}

/// Canonical form of a product URL.
///
/// Lower-cases the host, drops the fragment and tracking query pairs, and
/// trims a trailing slash from the path. Input that does not parse as a URL is
/// only trimmed, so distinct garbage inputs stay distinct.
#[must_use]
pub fn canonical_url(raw: &str) -> String {
    let raw = raw.trim();
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_owned();
    };

    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !is_tracking_param(name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    let path = url.path().to_owned();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    let mut canonical = url.to_string();
    // `Url` always renders an empty path as "/".
    if url.path() == "/" && url.query().is_none() && canonical.ends_with('/') {
        canonical.pop();
    }
    canonical
}

fn hash_key(source: &str, discriminator: &str) -> String {
    let input = format!("{}\x00{}", source.trim().to_lowercase(), discriminator);
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// Dedup key for an item that refers to a URL. Hex-encoded SHA-256.
#[must_use]
pub fn url_key(source: &str, url: &str) -> String {
    hash_key(source, &canonical_url(url))
}

/// Dedup key for a URL-less item, keyed on its extracted product name.
#[must_use]
pub fn name_key(source: &str, name: &str) -> String {
    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
    hash_key(source, &name.to_lowercase())
}
