//! Per-source site profiles: selector tiers, field rules, and fetch parameters.
//!
//! Profiles are plain data loaded once from YAML at startup and shared
//! read-only behind `Arc` for the life of the process. Nothing in the
//! extraction path branches on a source id; it iterates the tiers a profile
//! declares.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::fields::{FieldName, FieldRule};
use crate::ConfigError;

/// Extraction strategy tiers in escalation order.
///
/// The derived `Ord` follows declaration order, so `Standard < Emergency`
/// reads as "more trusted than".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Standard,
    Alternative,
    Aggressive,
    Emergency,
}

impl Tier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Standard => "standard",
            Tier::Alternative => "alternative",
            Tier::Aggressive => "aggressive",
            Tier::Emergency => "emergency",
        }
    }

    /// Whether a profile may supply CSS selectors for this tier.
    #[must_use]
    pub fn is_selector_based(self) -> bool {
        matches!(self, Tier::Standard | Tier::Alternative)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selectors for one selector-based tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectorTier {
    pub tier: Tier,
    /// Optional product container; selectors are scoped to its first match.
    #[serde(default)]
    pub container: Option<String>,
    /// Candidate selectors per field, tried in order.
    #[serde(default)]
    pub selectors: BTreeMap<FieldName, Vec<String>>,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    1_000
}

fn default_max_wait_ms() -> u64 {
    30_000
}

fn default_jitter_ratio() -> f64 {
    0.25
}

/// Fetch and retry parameters for one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchParams {
    /// Total attempt budget, including the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
    /// Fraction of the computed delay used as a symmetric jitter band.
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,
    /// Per-attempt timeout. Falls back to the process-wide default when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Passed through to the fetch capability untouched.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Passed through to the fetch capability untouched.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for FetchParams {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_backoff_ms: default_base_backoff_ms(),
            max_wait_ms: default_max_wait_ms(),
            jitter_ratio: default_jitter_ratio(),
            timeout_secs: None,
            user_agent: None,
            headers: BTreeMap::new(),
        }
    }
}

impl FetchParams {
    #[must_use]
    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    #[must_use]
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

fn default_currency_symbols() -> Vec<String> {
    ["₹", "Rs.", "Rs", "INR", "$", "€", "£"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

static DEFAULT_RULE: FieldRule = FieldRule {
    min: None,
    max: None,
    scale: None,
    min_len: None,
    reject_patterns: Vec::new(),
    strip_prefixes: Vec::new(),
};

/// Immutable configuration for a single source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteProfile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Last-resort base for resolving relative URLs.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Symbols that anchor free-text price scanning.
    #[serde(default = "default_currency_symbols")]
    pub currency_symbols: Vec<String>,
    pub required_fields: Vec<FieldName>,
    #[serde(default)]
    pub fields: BTreeMap<FieldName, FieldRule>,
    #[serde(default)]
    pub selector_tiers: Vec<SelectorTier>,
    #[serde(default)]
    pub fetch: FetchParams,
}

impl SiteProfile {
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Rule for `field`, or an unconstrained rule when none is declared.
    #[must_use]
    pub fn rule(&self, field: FieldName) -> &FieldRule {
        self.fields.get(&field).unwrap_or(&DEFAULT_RULE)
    }

    #[must_use]
    pub fn is_required(&self, field: FieldName) -> bool {
        self.required_fields.contains(&field)
    }

    /// Every field the profile mentions: required fields, fields with rules,
    /// and fields with selectors in any tier.
    #[must_use]
    pub fn declared_fields(&self) -> BTreeSet<FieldName> {
        let mut declared: BTreeSet<FieldName> = self.required_fields.iter().copied().collect();
        declared.extend(self.fields.keys().copied());
        for tier in &self.selector_tiers {
            declared.extend(tier.selectors.keys().copied());
        }
        declared
    }

    /// Selector set for `tier`, if the profile declares one.
    #[must_use]
    pub fn selector_tier(&self, tier: Tier) -> Option<&SelectorTier> {
        self.selector_tiers.iter().find(|t| t.tier == tier)
    }
}

#[derive(Debug, Deserialize)]
pub struct ProfilesFile {
    pub profiles: Vec<SiteProfile>,
}

/// Read-only lookup of site profiles by id.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, Arc<SiteProfile>>,
}

impl ProfileRegistry {
    /// Builds a registry from already-validated profiles.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any profile is invalid.
    pub fn from_profiles(profiles: Vec<SiteProfile>) -> Result<Self, ConfigError> {
        validate_profiles(&profiles)?;
        let profiles = profiles
            .into_iter()
            .map(|p| (p.id.clone(), Arc::new(p)))
            .collect();
        Ok(Self { profiles })
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<SiteProfile>> {
        self.profiles.get(id).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SiteProfile>> {
        self.profiles.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Load and validate site profiles from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_profiles(path: &Path) -> Result<ProfileRegistry, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ProfilesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_profiles(&content)
}

/// Parse and validate site profiles from YAML text.
///
/// # Errors
///
/// Returns `ConfigError` if the text cannot be parsed or fails validation.
pub fn parse_profiles(yaml: &str) -> Result<ProfileRegistry, ConfigError> {
    let file: ProfilesFile = serde_yaml::from_str(yaml)?;
    ProfileRegistry::from_profiles(file.profiles)
}

fn validate_profiles(profiles: &[SiteProfile]) -> Result<(), ConfigError> {
    let mut seen_ids = HashSet::new();

    for profile in profiles {
        if profile.id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "profile id must be non-empty".to_string(),
            ));
        }

        if !seen_ids.insert(profile.id.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate profile id: '{}'",
                profile.id
            )));
        }

        validate_profile(profile)?;
    }

    Ok(())
}

fn validate_profile(profile: &SiteProfile) -> Result<(), ConfigError> {
    let id = &profile.id;

    if profile.required_fields.is_empty() {
        return Err(ConfigError::Validation(format!(
            "profile '{id}' must declare at least one required field"
        )));
    }

    let mut previous: Option<Tier> = None;
    for tier in &profile.selector_tiers {
        if !tier.tier.is_selector_based() {
            return Err(ConfigError::Validation(format!(
                "profile '{id}' declares selectors for the {} tier; only standard and alternative take selectors",
                tier.tier
            )));
        }
        if previous.is_some_and(|p| p >= tier.tier) {
            return Err(ConfigError::Validation(format!(
                "profile '{id}' selector tiers must be listed once each in escalation order"
            )));
        }
        previous = Some(tier.tier);
    }

    let fetch = &profile.fetch;
    if fetch.max_retries == 0 {
        return Err(ConfigError::Validation(format!(
            "profile '{id}' max_retries must be at least 1"
        )));
    }
    if fetch.base_backoff_ms > fetch.max_wait_ms {
        return Err(ConfigError::Validation(format!(
            "profile '{id}' base_backoff_ms ({}) exceeds max_wait_ms ({})",
            fetch.base_backoff_ms, fetch.max_wait_ms
        )));
    }
    if !(0.0..=1.0).contains(&fetch.jitter_ratio) {
        return Err(ConfigError::Validation(format!(
            "profile '{id}' jitter_ratio must be within [0, 1], got {}",
            fetch.jitter_ratio
        )));
    }
    if fetch.timeout_secs == Some(0) {
        return Err(ConfigError::Validation(format!(
            "profile '{id}' timeout_secs must be greater than zero"
        )));
    }

    for (field, rule) in &profile.fields {
        if let (Some(min), Some(max)) = (rule.min, rule.max) {
            if min > max {
                return Err(ConfigError::Validation(format!(
                    "profile '{id}' field '{field}' has min {min} greater than max {max}"
                )));
            }
        }
        if let Some(scale) = rule.scale {
            if *field != FieldName::Rating {
                return Err(ConfigError::Validation(format!(
                    "profile '{id}' field '{field}' sets a scale; only rating takes one"
                )));
            }
            if !(scale.is_finite() && scale > 0.0) {
                return Err(ConfigError::Validation(format!(
                    "profile '{id}' rating scale must be positive, got {scale}"
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "profiles_test.rs"]
mod tests;
