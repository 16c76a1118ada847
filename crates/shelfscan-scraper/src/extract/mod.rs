//! Extraction strategy chain.
//!
//! Tiers run in a fixed order, each against the document alone. Their output
//! is merged into one [`CandidateRecord`] where the first tier to fill a field
//! owns it. The chain stops as soon as the quality gate finds the record
//! sufficient.

mod aggressive;
mod emergency;
mod page;
mod selectors;

use shelfscan_core::{FieldName, SiteProfile, Tier};

use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::normalize::derive_discount;
use crate::quality::{admit, evaluate};
use crate::types::{CandidateRecord, FieldOrigin, FieldValue, PartialRecord, RawDocument};

use page::Page;

pub(crate) const OFFER_SEPARATOR: &str = "; ";

/// Runs the chain over `document` using `profile`'s tiers and rules.
#[must_use]
pub fn extract(document: &RawDocument, profile: &SiteProfile) -> CandidateRecord {
    let label = document.url().unwrap_or_else(|| document.source());
    extract_observed(document, profile, &Diagnostics::disabled(), label)
}

/// [`extract`], reporting tier events for `item` through `diagnostics`.
pub(crate) fn extract_observed(
    document: &RawDocument,
    profile: &SiteProfile,
    diagnostics: &Diagnostics,
    item: &str,
) -> CandidateRecord {
    let page = match Page::parse(document.body(), document.url(), profile.base_url.as_deref()) {
        Ok(page) => Some(page),
        Err(err) => {
            tracing::debug!(item, error = %err, "skipping straight to the emergency tier");
            None
        }
    };
    let plan = plan(profile, page.is_some());

    let mut record = CandidateRecord::new(document.source(), document.url().map(str::to_owned));
    for (idx, tier) in plan.iter().copied().enumerate() {
        let partial = run_tier(tier, page.as_ref(), document.body(), profile);
        let filled = record.merge(partial, tier);
        let verdict = evaluate(&record, profile);
        record.raise_confidence(verdict.score);
        diagnostics.emit(DiagnosticEvent::TierCompleted {
            item: item.to_owned(),
            tier,
            filled,
            score: verdict.score,
        });

        if verdict.sufficient {
            break;
        }
        if let Some(next) = plan.get(idx + 1) {
            diagnostics.emit(DiagnosticEvent::TierEscalation {
                item: item.to_owned(),
                from: tier,
                to: *next,
                score: verdict.score,
            });
        }
    }

    fill_derived_discount(&mut record, profile);
    record
}

/// Tiers to attempt, in order. An unparseable document only gets Emergency.
fn plan(profile: &SiteProfile, parsed: bool) -> Vec<Tier> {
    if !parsed {
        return vec![Tier::Emergency];
    }
    profile
        .selector_tiers
        .iter()
        .map(|t| t.tier)
        .chain([Tier::Aggressive, Tier::Emergency])
        .collect()
}

fn run_tier(tier: Tier, page: Option<&Page>, body: &str, profile: &SiteProfile) -> PartialRecord {
    match (tier, page) {
        (Tier::Standard | Tier::Alternative, Some(page)) => profile
            .selector_tier(tier)
            .map(|selectors| selectors::run(page, selectors, profile))
            .unwrap_or_default(),
        (Tier::Aggressive, Some(page)) => aggressive::run(page, profile),
        (Tier::Emergency, page) => emergency::run(page, body, profile),
        (_, None) => PartialRecord::new(),
    }
}

/// Derives the discount from the two prices once the chain has stopped, so
/// any tier's explicitly scraped discount takes precedence.
fn fill_derived_discount(record: &mut CandidateRecord, profile: &SiteProfile) {
    if record.is_present(FieldName::DiscountPct) {
        return;
    }
    let derived = derive_discount(
        record.get(FieldName::Price),
        record.get(FieldName::OriginalPrice),
    );
    let derived = accept(FieldName::DiscountPct, derived, profile);
    if record.fill(FieldName::DiscountPct, derived, FieldOrigin::Derived) {
        let verdict = evaluate(record, profile);
        record.raise_confidence(verdict.score);
    }
}

/// Normalized value that passed the field's rule, or Missing.
pub(super) fn accept(field: FieldName, value: FieldValue, profile: &SiteProfile) -> FieldValue {
    match admit(field, value, profile) {
        Ok(value) => value,
        Err(err) => {
            tracing::trace!(error = %err, "discarding candidate value");
            FieldValue::Missing
        }
    }
}

#[cfg(test)]
#[path = "../extract_test.rs"]
mod tests;
