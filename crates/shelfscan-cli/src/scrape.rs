//! Command handlers for the CLI.
//!
//! Outcomes go to stdout as JSON lines; everything else is logged to stderr
//! so the output can be piped straight into other tools.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use shelfscan_core::{AppConfig, ProfileRegistry};
use shelfscan_scraper::{
    decide, extract, Aggregator, FetchController, HttpFetcher, Pipeline, RawDocument,
    RequestLimiter, ScrapeItem,
};
use tokio_util::sync::CancellationToken;

/// Print one line per loaded profile.
pub(crate) fn run_profiles(registry: &ProfileRegistry) {
    if registry.is_empty() {
        println!("no profiles loaded");
        return;
    }
    for profile in registry.iter() {
        let required: Vec<String> = profile
            .required_fields
            .iter()
            .map(ToString::to_string)
            .collect();
        println!(
            "{:<12} {:<24} required=[{}] tiers={}",
            profile.id,
            profile.display_name(),
            required.join(", "),
            profile.selector_tiers.len()
        );
    }
}

/// Merge positional URLs with those listed in `input`, keeping order.
///
/// # Errors
///
/// Returns an error if `input` cannot be read or no URL is given at all.
pub(crate) fn collect_urls(
    mut urls: Vec<String>,
    input: Option<&Path>,
) -> anyhow::Result<Vec<String>> {
    if let Some(path) = input {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
        urls.extend(parse_url_list(&content));
    }
    if urls.is_empty() {
        anyhow::bail!("no URLs given; pass them as arguments or with --input");
    }
    Ok(urls)
}

fn parse_url_list(content: &str) -> impl Iterator<Item = String> + '_ {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
}

/// Fetch and extract every URL for `site`, streaming outcomes as they finish.
///
/// Ctrl-C cancels the batch: items still waiting or backing off come back as
/// failed with reason `cancelled`.
///
/// # Errors
///
/// Returns an error if `site` has no profile, the HTTP client cannot be
/// built, or an outcome cannot be serialized. Per-item failures are reported
/// as outcomes, never as errors.
pub(crate) async fn run_scrape(
    config: &AppConfig,
    registry: ProfileRegistry,
    site: &str,
    urls: Vec<String>,
) -> anyhow::Result<()> {
    if registry.get(site).is_none() {
        anyhow::bail!("unknown site '{site}'; run `shelfscan-cli profiles` to list them");
    }

    let fetcher = HttpFetcher::new(config.request_timeout_secs, &config.user_agent)
        .map_err(|e| anyhow::anyhow!("failed to build HTTP fetcher: {e}"))?;
    let controller = FetchController::new(fetcher)
        .with_limiter(RequestLimiter::per_second(config.requests_per_second))
        .with_default_timeout(Duration::from_secs(config.request_timeout_secs))
        .with_default_user_agent(config.user_agent.clone());

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; cancelling batch");
            interrupt.cancel();
        }
    });

    let aggregator = Aggregator::new(
        Pipeline::new(registry, controller),
        config.max_concurrency,
        cancel,
    );
    let items: Vec<ScrapeItem> = urls
        .into_iter()
        .map(|url| ScrapeItem::url(site, url))
        .collect();

    let outcomes = aggregator.run(items);
    let mut outcomes = std::pin::pin!(outcomes);
    while let Some(item) = outcomes.next().await {
        println!("{}", serde_json::to_string(&item)?);
    }

    let counts = aggregator.counts();
    tracing::info!(
        site,
        accepted = counts.accepted,
        degraded = counts.degraded,
        failed = counts.failed,
        duplicates = counts.duplicates,
        "batch complete"
    );
    Ok(())
}

/// Run the extraction chain over a saved page and print the outcome.
///
/// # Errors
///
/// Returns an error if `site` has no profile, the file cannot be read, or the
/// outcome cannot be serialized.
pub(crate) fn run_extract(
    registry: &ProfileRegistry,
    site: &str,
    base_url: Option<String>,
    file: &Path,
) -> anyhow::Result<()> {
    let profile = registry
        .get(site)
        .ok_or_else(|| anyhow::anyhow!("unknown site '{site}'"))?;
    let body = std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", file.display()))?;

    let document = RawDocument::new(profile.id.clone(), base_url, body, 0);
    let record = extract(&document, &profile);
    tracing::debug!(
        tier = ?record.tier(),
        confidence = record.confidence(),
        "extraction finished"
    );
    let outcome = decide(record, &profile);
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_list_skips_blanks_and_comments() {
        let content = "# amazon\nhttps://www.amazon.in/dp/B0CX1\n\n  https://www.amazon.in/dp/B0CX2  \n";
        let urls: Vec<String> = parse_url_list(content).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.amazon.in/dp/B0CX1".to_owned(),
                "https://www.amazon.in/dp/B0CX2".to_owned(),
            ]
        );
    }

    #[test]
    fn collect_urls_requires_at_least_one() {
        assert!(collect_urls(Vec::new(), None).is_err());
        let urls = collect_urls(vec!["https://shop.example/p/1".to_owned()], None).unwrap();
        assert_eq!(urls.len(), 1);
    }
}
