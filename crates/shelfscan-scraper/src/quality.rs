//! Quality gate: per-field admission rules and whole-record verdicts.

use std::collections::BTreeSet;

use rust_decimal::prelude::ToPrimitive;
use shelfscan_core::{FieldName, SiteProfile};

use crate::error::ScraperError;
use crate::types::{CandidateRecord, FailureReason, FieldValue, Outcome};

/// Result of evaluating a record against its profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    /// Every required field is present.
    pub sufficient: bool,
    /// Fraction of declared fields that are present, in `[0, 1]`.
    pub score: f64,
    /// Declared fields that are still missing.
    pub missing: BTreeSet<FieldName>,
}

fn declared_fields(profile: &SiteProfile) -> BTreeSet<FieldName> {
    let declared = profile.declared_fields();
    if declared.is_empty() {
        FieldName::ALL.into_iter().collect()
    } else {
        declared
    }
}

#[must_use]
pub fn evaluate(record: &CandidateRecord, profile: &SiteProfile) -> Verdict {
    let declared = declared_fields(profile);
    let missing: BTreeSet<FieldName> = declared
        .iter()
        .copied()
        .filter(|field| !record.is_present(*field))
        .collect();
    let present = declared.len() - missing.len();
    #[allow(clippy::cast_precision_loss)] // at most nine fields
    let score = present as f64 / declared.len() as f64;
    let sufficient = profile
        .required_fields
        .iter()
        .all(|field| record.is_present(*field));

    Verdict {
        sufficient,
        score,
        missing,
    }
}

/// Turns the final record into the item's terminal outcome.
///
/// - every required field present: `Accepted`
/// - otherwise, a name is present: `Degraded`, listing the missing required fields
/// - otherwise: `Failed(NoProductData)`
#[must_use]
pub fn decide(record: CandidateRecord, profile: &SiteProfile) -> Outcome {
    let missing: BTreeSet<FieldName> = profile
        .required_fields
        .iter()
        .copied()
        .filter(|field| !record.is_present(*field))
        .collect();

    if missing.is_empty() {
        Outcome::Accepted { record }
    } else if record.is_present(FieldName::Name) {
        Outcome::Degraded { record, missing }
    } else {
        Outcome::failed(FailureReason::NoProductData)
    }
}

/// Applies the profile's rule for `field` to a normalized value.
///
/// # Errors
///
/// Returns [`ScraperError::Validation`] when the value breaks the rule. Callers
/// treat that as a missing field, never as a fault.
pub(crate) fn admit(
    field: FieldName,
    value: FieldValue,
    profile: &SiteProfile,
) -> Result<FieldValue, ScraperError> {
    let rule = profile.rule(field);
    let invalid = |reason: String| ScraperError::Validation { field, reason };

    match value {
        FieldValue::Missing => Ok(FieldValue::Missing),
        FieldValue::Text(text) => {
            let cleaned = rule.check_text(&text).map_err(invalid)?;
            if field == FieldName::Name {
                check_name(&cleaned, profile).map_err(invalid)?;
            }
            Ok(FieldValue::Text(cleaned))
        }
        other => match other.as_number() {
            Some(number) => {
                let number = number
                    .to_f64()
                    .ok_or_else(|| invalid(format!("{number} is not representable")))?;
                rule.check_range(number).map_err(invalid)?;
                Ok(other)
            }
            None => Ok(other),
        },
    }
}

fn check_name(name: &str, profile: &SiteProfile) -> Result<(), String> {
    if name.chars().all(|c| c.is_ascii_digit() || c.is_whitespace()) {
        return Err("name is only digits".to_owned());
    }
    if let Some(symbol) = profile
        .currency_symbols
        .iter()
        .find(|symbol| name.starts_with(symbol.as_str()))
    {
        return Err(format!("name starts with currency symbol '{symbol}'"));
    }
    Ok(())
}
