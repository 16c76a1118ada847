//! Aggressive tier: pattern scanning over the page's visible text.
//!
//! Nothing here depends on markup structure, which makes it the fallback for
//! redesigned pages whose selectors no longer match. Precision is lower, so
//! every candidate still goes through the field rules.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use shelfscan_core::{FieldName, SiteProfile};

use super::accept;
use super::page::Page;
use crate::normalize::{
    normalize_availability, normalize_count, normalize_money, normalize_percentage,
    normalize_rating, normalize_url_list, rating_scale,
};
use crate::types::{FieldValue, PartialRecord};

const AMOUNT: &str = r"(\d[\d,]*(?:\.\d+)?)";

/// Stock statements. Bare "available" is left out; it shows up in phrases
/// like "Available offers" that say nothing about stock.
static STOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:out\s+of\s+stock|sold\s+out|currently\s+unavailable|in\s+stock|add\s+to\s+cart|buy\s+now)\b",
    )
    .expect("valid regex")
});

static REVIEWS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d[\d,]*)\s*(?:global\s+)?(?:ratings?|reviews?)\b").expect("valid regex")
});

static DISCOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,3}(?:\.\d+)?)\s*%\s*off\b").expect("valid regex")
});

/// Currency-anchored amounts, built from the profile's symbols.
struct PricePatterns {
    price: Regex,
    original: Regex,
}

impl PricePatterns {
    fn for_profile(profile: &SiteProfile) -> Option<Self> {
        let mut symbols: Vec<&str> = profile
            .currency_symbols
            .iter()
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .collect();
        if symbols.is_empty() {
            return None;
        }
        // Longest first so "Rs." wins over "Rs".
        symbols.sort_by_key(|s| std::cmp::Reverse(s.chars().count()));
        let currency = symbols
            .iter()
            .map(|s| regex::escape(s))
            .collect::<Vec<_>>()
            .join("|");

        let price = Regex::new(&format!(r"(?:{currency})\s*{AMOUNT}")).ok()?;
        let original = Regex::new(&format!(
            r"(?i)(?:\bM\.?R\.?P\.?|\blist\s+price|\bwas)\s*:?\s*(?:{currency})?\s*{AMOUNT}"
        ))
        .ok()?;
        Some(Self { price, original })
    }
}

pub(super) fn run(page: &Page, profile: &SiteProfile) -> PartialRecord {
    let text = page.visible_text();
    let mut partial = PartialRecord::new();

    if let Some(patterns) = PricePatterns::for_profile(profile) {
        let (price, original) = scan_prices(&text, &patterns, profile);
        partial.insert(FieldName::Price, price);
        partial.insert(FieldName::OriginalPrice, original);
    }

    let scale = rating_scale(profile.rule(FieldName::Rating));
    if let Some(rating) = rating_pattern(scale) {
        partial.insert(
            FieldName::Rating,
            first_accepted(&rating, &text, FieldName::Rating, profile, |raw| {
                normalize_rating(raw, scale)
            }),
        );
    }
    partial.insert(
        FieldName::ReviewCount,
        first_accepted(&REVIEWS, &text, FieldName::ReviewCount, profile, normalize_count),
    );
    partial.insert(
        FieldName::DiscountPct,
        first_accepted(&DISCOUNT, &text, FieldName::DiscountPct, profile, normalize_percentage),
    );
    partial.insert(
        FieldName::Availability,
        accept(FieldName::Availability, scan_stock(&text), profile),
    );

    let og_image = page.meta("og:image");
    partial.insert(
        FieldName::ImageUrls,
        accept(
            FieldName::ImageUrls,
            normalize_url_list(og_image.as_deref(), page.base()),
            profile,
        ),
    );

    partial
}

/// "4.1 out of 5", "7/10" or "4 stars", with the slash form tied to the
/// profile's rating scale.
fn rating_pattern(scale: Decimal) -> Option<Regex> {
    let scale = regex::escape(&scale.normalize().to_string());
    Regex::new(&format!(
        r"(?i)\b(\d+(?:\.\d+)?)\s*(?:out\s+of\s+\d+(?:\.\d+)?|/\s*{scale}\b|stars?\b)"
    ))
    .ok()
}

/// Price is the first currency amount that is not part of an MRP / list
/// price / was-price phrase; those feed the original price instead.
fn scan_prices(
    text: &str,
    patterns: &PricePatterns,
    profile: &SiteProfile,
) -> (FieldValue, FieldValue) {
    let original_spans: Vec<(usize, usize)> = patterns
        .original
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect();

    let original = first_accepted(
        &patterns.original,
        text,
        FieldName::OriginalPrice,
        profile,
        normalize_money,
    );

    let price = patterns
        .price
        .captures_iter(text)
        .filter(|caps| {
            caps.get(0).is_some_and(|m| {
                !original_spans
                    .iter()
                    .any(|(start, end)| m.start() < *end && *start < m.end())
            })
        })
        .filter_map(|caps| caps.get(1))
        .map(|m| accept(FieldName::Price, normalize_money(m.as_str()), profile))
        .find(FieldValue::is_present)
        .unwrap_or(FieldValue::Missing);

    (price, original)
}

/// Any out-of-stock statement wins over positive ones, so a stale "Buy now"
/// button does not mask "Currently unavailable".
fn scan_stock(text: &str) -> FieldValue {
    let mut verdict = FieldValue::Missing;
    for m in STOCK.find_iter(text) {
        let phrase = m.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
        match normalize_availability(&phrase) {
            FieldValue::Boolean(false) => return FieldValue::Boolean(false),
            value @ FieldValue::Boolean(true) => verdict = value,
            _ => {}
        }
    }
    verdict
}

fn first_accepted(
    re: &Regex,
    text: &str,
    field: FieldName,
    profile: &SiteProfile,
    normalize: impl Fn(&str) -> FieldValue,
) -> FieldValue {
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| accept(field, normalize(m.as_str()), profile))
        .find(FieldValue::is_present)
        .unwrap_or(FieldValue::Missing)
}
