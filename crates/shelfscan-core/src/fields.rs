//! Product field names and the per-field validation rules a profile declares.

use serde::{Deserialize, Serialize};

/// One slot of an extracted product record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    Name,
    Price,
    OriginalPrice,
    Rating,
    ReviewCount,
    DiscountPct,
    Offers,
    ImageUrls,
    Availability,
}

impl FieldName {
    pub const ALL: [FieldName; 9] = [
        FieldName::Name,
        FieldName::Price,
        FieldName::OriginalPrice,
        FieldName::Rating,
        FieldName::ReviewCount,
        FieldName::DiscountPct,
        FieldName::Offers,
        FieldName::ImageUrls,
        FieldName::Availability,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FieldName::Name => "name",
            FieldName::Price => "price",
            FieldName::OriginalPrice => "original_price",
            FieldName::Rating => "rating",
            FieldName::ReviewCount => "review_count",
            FieldName::DiscountPct => "discount_pct",
            FieldName::Offers => "offers",
            FieldName::ImageUrls => "image_urls",
            FieldName::Availability => "availability",
        }
    }

    /// Fields whose values are numeric and therefore subject to `min`/`max`.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            FieldName::Price
                | FieldName::OriginalPrice
                | FieldName::Rating
                | FieldName::ReviewCount
                | FieldName::DiscountPct
        )
    }

    /// Fields that hold free text and are subject to text rules.
    #[must_use]
    pub fn is_text(self) -> bool {
        matches!(self, FieldName::Name | FieldName::Offers)
    }
}

impl std::fmt::Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation rule for a single field of a profile.
///
/// All constraints are optional. A value that fails any of them is treated as
/// missing by the extractor rather than rejected as an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldRule {
    /// Lower bound of the plausible range (numeric fields).
    #[serde(default)]
    pub min: Option<f64>,
    /// Upper bound of the plausible range (numeric fields).
    #[serde(default)]
    pub max: Option<f64>,
    /// Rating scale, e.g. `5` for "out of 5". Only meaningful for `rating`.
    #[serde(default)]
    pub scale: Option<f64>,
    /// Minimum character count after normalization (text fields).
    #[serde(default)]
    pub min_len: Option<usize>,
    /// Substrings that mark a text value as junk (e.g. `"Add to Compare"`).
    #[serde(default)]
    pub reject_patterns: Vec<String>,
    /// Leading boilerplate removed before validation (e.g. `"Sponsored"`).
    #[serde(default)]
    pub strip_prefixes: Vec<String>,
}

impl FieldRule {
    pub const DEFAULT_RATING_SCALE: f64 = 5.0;

    #[must_use]
    pub fn rating_scale(&self) -> f64 {
        self.scale.unwrap_or(Self::DEFAULT_RATING_SCALE)
    }

    /// Returns `Err` with a reason when `value` lies outside `[min, max]`.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the bound check fails.
    pub fn check_range(&self, value: f64) -> Result<(), String> {
        if let Some(min) = self.min {
            if value < min {
                return Err(format!("{value} is below the plausible minimum {min}"));
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return Err(format!("{value} is above the plausible maximum {max}"));
            }
        }
        Ok(())
    }

    /// Applies `strip_prefixes` then checks `min_len` and `reject_patterns`.
    ///
    /// Returns the cleaned text on success.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the text is rejected.
    pub fn check_text(&self, text: &str) -> Result<String, String> {
        let mut cleaned = text.trim();
        // Prefixes can stack ("Sponsored Sponsored ..."), so strip until stable.
        loop {
            let before = cleaned;
            for prefix in &self.strip_prefixes {
                if let Some(rest) = cleaned.strip_prefix(prefix.as_str()) {
                    cleaned = rest.trim_start();
                }
            }
            if before == cleaned {
                break;
            }
        }

        if let Some(pattern) = self
            .reject_patterns
            .iter()
            .find(|p| cleaned.contains(p.as_str()))
        {
            return Err(format!("contains rejected pattern '{pattern}'"));
        }

        if let Some(min_len) = self.min_len {
            let len = cleaned.chars().count();
            if len < min_len {
                return Err(format!("length {len} is below minimum {min_len}"));
            }
        }

        if cleaned.is_empty() {
            return Err("empty after cleanup".to_string());
        }

        Ok(cleaned.to_string())
    }
}
