//! Data model shared by the extraction chain, quality gate and aggregator.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shelfscan_core::{FieldName, Tier};

use crate::error::ScraperError;

/// A typed field value. `Missing` is an ordinary value, distinct from zero
/// or an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    /// Non-negative amount with exactly two decimal places.
    Money(Decimal),
    /// Within `[0, 100]`.
    Percentage(Decimal),
    Rating {
        value: Decimal,
        scale: Decimal,
    },
    /// Absolute `http`/`https` URL.
    Url(String),
    /// Absolute `http`/`https` URLs, deduplicated, in document order.
    UrlList(Vec<String>),
    Count(u64),
    Boolean(bool),
    Missing,
}

impl FieldValue {
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        !self.is_missing()
    }

    #[must_use]
    pub fn as_money(&self) -> Option<Decimal> {
        match self {
            FieldValue::Money(amount) => Some(*amount),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Numeric view used for plausible-range checks.
    #[must_use]
    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            FieldValue::Money(d) | FieldValue::Percentage(d) => Some(*d),
            FieldValue::Rating { value, .. } => Some(*value),
            FieldValue::Count(n) => Some(Decimal::from(*n)),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Text(text) | FieldValue::Url(text) => f.write_str(text),
            FieldValue::Money(amount) => write!(f, "{amount}"),
            FieldValue::Percentage(pct) => write!(f, "{pct}%"),
            FieldValue::Rating { value, scale } => write!(f, "{value}/{scale}"),
            FieldValue::UrlList(urls) => f.write_str(&urls.join(" ")),
            FieldValue::Count(n) => write!(f, "{n}"),
            FieldValue::Boolean(b) => write!(f, "{b}"),
            FieldValue::Missing => f.write_str("N/A"),
        }
    }
}

/// Which tier produced a field, or whether it was derived from other fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOrigin {
    Standard,
    Alternative,
    Aggressive,
    Emergency,
    Derived,
}

impl From<Tier> for FieldOrigin {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::Standard => FieldOrigin::Standard,
            Tier::Alternative => FieldOrigin::Alternative,
            Tier::Aggressive => FieldOrigin::Aggressive,
            Tier::Emergency => FieldOrigin::Emergency,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedField {
    pub value: FieldValue,
    pub origin: FieldOrigin,
}

/// Fields found by a single tier, before merging.
pub(crate) type PartialRecord = BTreeMap<FieldName, FieldValue>;

/// Best-effort product record accumulated across tiers.
///
/// Fields are only ever added: once a field holds a value it is never
/// replaced, so an earlier (more trusted) tier always wins. The confidence
/// score follows the same rule and never decreases.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRecord {
    source: String,
    url: Option<String>,
    fields: BTreeMap<FieldName, ExtractedField>,
    tier: Option<Tier>,
    confidence: f64,
}

static MISSING: FieldValue = FieldValue::Missing;

impl CandidateRecord {
    #[must_use]
    pub fn new(source: impl Into<String>, url: Option<String>) -> Self {
        Self {
            source: source.into(),
            url,
            fields: BTreeMap::new(),
            tier: None,
            confidence: 0.0,
        }
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Value of `field`, or [`FieldValue::Missing`].
    #[must_use]
    pub fn get(&self, field: FieldName) -> &FieldValue {
        self.fields.get(&field).map_or(&MISSING, |f| &f.value)
    }

    #[must_use]
    pub fn origin(&self, field: FieldName) -> Option<FieldOrigin> {
        self.fields.get(&field).map(|f| f.origin)
    }

    #[must_use]
    pub fn is_present(&self, field: FieldName) -> bool {
        self.fields.contains_key(&field)
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.get(FieldName::Name).as_text()
    }

    /// Last tier that ran against this record.
    #[must_use]
    pub fn tier(&self) -> Option<Tier> {
        self.tier
    }

    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn fields(&self) -> impl Iterator<Item = (FieldName, &ExtractedField)> {
        self.fields.iter().map(|(name, field)| (*name, field))
    }

    /// Stores `value` under `field` unless the field is already populated or
    /// `value` is missing. Returns whether the field was filled.
    pub(crate) fn fill(&mut self, field: FieldName, value: FieldValue, origin: FieldOrigin) -> bool {
        if value.is_missing() || self.fields.contains_key(&field) {
            return false;
        }
        self.fields.insert(field, ExtractedField { value, origin });
        true
    }

    /// Merges one tier's output, filling only fields that are still missing.
    /// Returns the fields this tier contributed.
    pub(crate) fn merge(&mut self, partial: PartialRecord, tier: Tier) -> Vec<FieldName> {
        self.tier = Some(tier);
        partial
            .into_iter()
            .filter_map(|(field, value)| self.fill(field, value, tier.into()).then_some(field))
            .collect()
    }

    pub(crate) fn raise_confidence(&mut self, score: f64) {
        self.confidence = self.confidence.max(score);
    }
}

/// Markup handed from the fetch controller to the extraction chain.
#[derive(Debug, Clone)]
pub struct RawDocument {
    source: String,
    url: Option<String>,
    body: String,
    fetched_at: DateTime<Utc>,
    attempts: u32,
}

impl RawDocument {
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        url: Option<String>,
        body: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            source: source.into(),
            url,
            body: body.into(),
            fetched_at: Utc::now(),
            attempts,
        }
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    #[must_use]
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Number of fetch attempts it took to obtain this body (`0` for markup
    /// supplied inline).
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Why an item produced no record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    NoProductData,
    Cancelled,
    UnknownSource { source: String },
    PermanentFetch { error: String },
    ExhaustedRetries { attempts: u32, error: String },
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::NoProductData => write!(f, "no identifiable product data"),
            FailureReason::Cancelled => write!(f, "cancelled"),
            FailureReason::UnknownSource { source } => write!(f, "unknown source '{source}'"),
            FailureReason::PermanentFetch { error } => write!(f, "permanent fetch failure: {error}"),
            FailureReason::ExhaustedRetries { attempts, error } => {
                write!(f, "gave up after {attempts} attempts: {error}")
            }
        }
    }
}

impl From<&ScraperError> for FailureReason {
    fn from(err: &ScraperError) -> Self {
        match err {
            ScraperError::Cancelled => FailureReason::Cancelled,
            ScraperError::ExhaustedRetries {
                attempts, source, ..
            } => FailureReason::ExhaustedRetries {
                attempts: *attempts,
                error: source.to_string(),
            },
            ScraperError::PermanentFetch { source, .. } => FailureReason::PermanentFetch {
                error: source.to_string(),
            },
            // Neither reaches the aggregator in practice; map them onto the
            // closest terminal reason rather than panicking.
            ScraperError::TransientFetch { source, .. } => FailureReason::PermanentFetch {
                error: source.to_string(),
            },
            ScraperError::Parse { .. } | ScraperError::Validation { .. } => {
                FailureReason::NoProductData
            }
        }
    }
}

/// Terminal result for one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Accepted {
        record: CandidateRecord,
    },
    Degraded {
        record: CandidateRecord,
        missing: BTreeSet<FieldName>,
    },
    Failed {
        reason: FailureReason,
    },
}

impl Outcome {
    #[must_use]
    pub fn status(&self) -> &'static str {
        match self {
            Outcome::Accepted { .. } => "accepted",
            Outcome::Degraded { .. } => "degraded",
            Outcome::Failed { .. } => "failed",
        }
    }

    #[must_use]
    pub fn record(&self) -> Option<&CandidateRecord> {
        match self {
            Outcome::Accepted { record } | Outcome::Degraded { record, .. } => Some(record),
            Outcome::Failed { .. } => None,
        }
    }

    #[must_use]
    pub fn failed(reason: FailureReason) -> Self {
        Outcome::Failed { reason }
    }
}

/// Where an item's markup comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemTarget {
    /// Fetched through the retry controller.
    Url(String),
    /// Already-fetched markup, e.g. one product card cut out of a listing page.
    Inline {
        base_url: Option<String>,
        markup: String,
    },
}

/// One unit of work submitted to the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeItem {
    pub source: String,
    pub target: ItemTarget,
}

impl ScrapeItem {
    #[must_use]
    pub fn url(source: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: ItemTarget::Url(url.into()),
        }
    }

    #[must_use]
    pub fn inline(
        source: impl Into<String>,
        base_url: Option<String>,
        markup: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: ItemTarget::Inline {
                base_url,
                markup: markup.into(),
            },
        }
    }

    /// The URL the item refers to, if any.
    #[must_use]
    pub fn url_hint(&self) -> Option<&str> {
        match &self.target {
            ItemTarget::Url(url) => Some(url),
            ItemTarget::Inline { base_url, .. } => base_url.as_deref(),
        }
    }
}

/// Correlates an outcome with the item that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemIdentity {
    /// Position of the item in the submitted batch.
    pub index: usize,
    pub source: String,
    pub url: Option<String>,
}

impl std::fmt::Display for ItemIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.url {
            Some(url) => write!(f, "#{} {} {}", self.index, self.source, url),
            None => write!(f, "#{} {}", self.index, self.source),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemOutcome {
    pub identity: ItemIdentity,
    pub outcome: Outcome,
}
