//! Field normalizers: raw matched text to typed [`FieldValue`]s.
//!
//! Every function here is total. Input that cannot be interpreted yields
//! [`FieldValue::Missing`], never an error, so a bad selector match degrades
//! one field instead of the whole record.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use rust_decimal::{Decimal, RoundingStrategy};
use shelfscan_core::{FieldName, FieldRule};

use crate::types::FieldValue;

/// How raw text for a field is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Money,
    Percentage,
    Rating { scale: Decimal },
    Url,
    UrlList,
    Boolean,
    Count,
}

impl FieldKind {
    /// The kind a product field is normalized as. Ratings pick up the scale
    /// declared by the field's rule.
    #[must_use]
    pub fn for_field(field: FieldName, rule: &FieldRule) -> Self {
        match field {
            FieldName::Name | FieldName::Offers => FieldKind::Text,
            FieldName::Price | FieldName::OriginalPrice => FieldKind::Money,
            FieldName::DiscountPct => FieldKind::Percentage,
            FieldName::Rating => FieldKind::Rating {
                scale: rating_scale(rule),
            },
            FieldName::ReviewCount => FieldKind::Count,
            FieldName::ImageUrls => FieldKind::UrlList,
            FieldName::Availability => FieldKind::Boolean,
        }
    }
}

/// The rule's rating scale as a decimal.
#[must_use]
pub fn rating_scale(rule: &FieldRule) -> Decimal {
    Decimal::try_from(rule.rating_scale()).unwrap_or_else(|_| Decimal::from(5))
}

/// A minus sign ahead of the amount, possibly separated from it by a
/// currency marker: "-500", "- 500", "-₹500", "₹-500", "Rs. -1,299".
static NEGATIVE_LEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)-\s*(?:\p{Sc}|rs\.?|inr)?\s*$").expect("valid regex")
});

static UNSIGNED_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("valid regex"));

static INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d[\d,]*").expect("valid regex"));

const IMAGE_EXTENSIONS: [&str; 6] = [".jpg", ".jpeg", ".png", ".webp", ".gif", ".avif"];

const UNAVAILABLE_PHRASES: [&str; 5] = [
    "out of stock",
    "sold out",
    "currently unavailable",
    "not available",
    "unavailable",
];

const AVAILABLE_PHRASES: [&str; 6] = [
    "in stock",
    "available",
    "add to cart",
    "buy now",
    "left in stock",
    "bought in past",
];

/// Normalizes `raw` as `kind`. URLs are resolved against `base` when relative.
#[must_use]
pub fn normalize(kind: FieldKind, raw: &str, base: Option<&Url>) -> FieldValue {
    match kind {
        FieldKind::Text => normalize_text(raw),
        FieldKind::Money => normalize_money(raw),
        FieldKind::Percentage => normalize_percentage(raw),
        FieldKind::Rating { scale } => normalize_rating(raw, scale),
        FieldKind::Url => {
            resolve_url(raw, base).map_or(FieldValue::Missing, |u| FieldValue::Url(u.into()))
        }
        FieldKind::UrlList => normalize_url_list([raw], base),
        FieldKind::Boolean => normalize_availability(raw),
        FieldKind::Count => normalize_count(raw),
    }
}

/// Trims, collapses whitespace runs, and rejects empty text.
#[must_use]
pub fn normalize_text(raw: &str) -> FieldValue {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        FieldValue::Missing
    } else {
        FieldValue::Text(collapsed)
    }
}

fn first_decimal(re: &Regex, raw: &str) -> Option<Decimal> {
    let matched = re.find(raw)?.as_str().replace(',', "");
    matched.parse::<Decimal>().ok()
}

/// Parses the first number in `raw` as a two-decimal amount. Currency
/// symbols and thousands separators are ignored; negatives are rejected.
#[must_use]
pub fn normalize_money(raw: &str) -> FieldValue {
    let Some(number) = UNSIGNED_NUMBER.find(raw) else {
        return FieldValue::Missing;
    };
    if NEGATIVE_LEAD.is_match(&raw[..number.start()]) {
        return FieldValue::Missing;
    }
    let Ok(amount) = number.as_str().replace(',', "").parse::<Decimal>() else {
        return FieldValue::Missing;
    };
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    FieldValue::Money(rounded)
}

/// Parses a percentage in `[0, 100]`. Out-of-range values are discarded.
///
/// Storefronts print discounts as "-23%"; the dash is a display convention,
/// so the sign is ignored.
#[must_use]
pub fn normalize_percentage(raw: &str) -> FieldValue {
    match first_decimal(&UNSIGNED_NUMBER, raw) {
        Some(pct) if pct <= Decimal::ONE_HUNDRED => FieldValue::Percentage(pct.normalize()),
        _ => FieldValue::Missing,
    }
}

/// Parses a rating against `scale`; values above the scale are discarded.
#[must_use]
pub fn normalize_rating(raw: &str, scale: Decimal) -> FieldValue {
    match first_decimal(&UNSIGNED_NUMBER, raw) {
        Some(value) if value <= scale => FieldValue::Rating {
            value: value.normalize(),
            scale: scale.normalize(),
        },
        _ => FieldValue::Missing,
    }
}

#[must_use]
pub fn normalize_count(raw: &str) -> FieldValue {
    INTEGER
        .find(raw)
        .and_then(|m| m.as_str().replace(',', "").parse::<u64>().ok())
        .map_or(FieldValue::Missing, FieldValue::Count)
}

/// Classifies availability text. Negative phrases win over positive ones
/// ("Currently unavailable" contains "available").
#[must_use]
pub fn normalize_availability(raw: &str) -> FieldValue {
    let lower = raw.to_lowercase();
    if UNAVAILABLE_PHRASES.iter().any(|p| lower.contains(p)) {
        FieldValue::Boolean(false)
    } else if AVAILABLE_PHRASES.iter().any(|p| lower.contains(p)) {
        FieldValue::Boolean(true)
    } else {
        FieldValue::Missing
    }
}

/// Resolves `raw` to an absolute `http`/`https` URL.
///
/// Protocol-relative URLs are given `https:`; other relative forms are joined
/// onto `base`. Anything else (`data:`, `javascript:`, no base) is `None`.
#[must_use]
pub fn resolve_url(raw: &str, base: Option<&Url>) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let parsed = if let Some(rest) = raw.strip_prefix("//") {
        Url::parse(&format!("https://{rest}"))
    } else {
        base.map_or_else(|| Url::parse(raw), |b| b.join(raw))
    }
    .ok()?;
    matches!(parsed.scheme(), "http" | "https").then_some(parsed)
}

/// Drops sizing query strings from image URLs whose path has an image
/// extension; CDN resize parameters would otherwise split duplicates.
#[must_use]
pub fn clean_image_url(mut url: Url) -> String {
    let path = url.path().to_lowercase();
    if IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        url.set_query(None);
    }
    url.set_fragment(None);
    url.into()
}

/// Resolves and cleans every candidate, keeping first-seen order and
/// dropping duplicates. Missing when nothing resolves.
#[must_use]
pub fn normalize_url_list<'a>(
    raws: impl IntoIterator<Item = &'a str>,
    base: Option<&Url>,
) -> FieldValue {
    let mut urls: Vec<String> = Vec::new();
    for raw in raws {
        if let Some(url) = resolve_url(raw, base).map(clean_image_url) {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    }
    if urls.is_empty() {
        FieldValue::Missing
    } else {
        FieldValue::UrlList(urls)
    }
}

/// `round((original - current) / original * 100)` when `original > current`;
/// Missing otherwise, so an inconsistent pair never yields a negative discount.
#[must_use]
pub fn derive_discount(current: &FieldValue, original: &FieldValue) -> FieldValue {
    let (Some(current), Some(original)) = (current.as_money(), original.as_money()) else {
        return FieldValue::Missing;
    };
    if original <= current || original.is_zero() {
        return FieldValue::Missing;
    }
    let pct = ((original - current) / original * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    FieldValue::Percentage(pct.normalize())
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
