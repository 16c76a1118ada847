//! Emergency tier: salvage a name from whatever title-like text exists.

use shelfscan_core::{FieldName, SiteProfile};

use super::accept;
use super::page::Page;
use crate::normalize::normalize_text;
use crate::types::{FieldValue, PartialRecord};

pub(super) const MAX_NAME_CHARS: usize = 100;

/// Title sources in preference order.
const TITLE_SOURCES: [TitleSource; 4] = [
    TitleSource::Css("h1"),
    TitleSource::Meta("og:title"),
    TitleSource::Css("title"),
    TitleSource::Css("h2"),
];

#[derive(Clone, Copy)]
enum TitleSource {
    Css(&'static str),
    Meta(&'static str),
}

/// Name from the first title source that yields a valid one. With no parsed
/// page, the first non-empty line of the raw payload is used instead.
pub(super) fn run(page: Option<&Page>, body: &str, profile: &SiteProfile) -> PartialRecord {
    let name = match page {
        Some(page) => TITLE_SOURCES
            .iter()
            .filter_map(|source| match source {
                TitleSource::Css(css) => page.first_text(css),
                TitleSource::Meta(key) => page.meta(key),
            })
            .map(|raw| admit_name(&raw, profile))
            .find(FieldValue::is_present)
            .unwrap_or(FieldValue::Missing),
        None => body
            .lines()
            .find(|line| !line.trim().is_empty())
            .map_or(FieldValue::Missing, |line| admit_name(line, profile)),
    };

    let mut partial = PartialRecord::new();
    partial.insert(FieldName::Name, name);
    partial
}

fn admit_name(raw: &str, profile: &SiteProfile) -> FieldValue {
    let value = match normalize_text(raw) {
        FieldValue::Text(text) => FieldValue::Text(truncate_chars(&text, MAX_NAME_CHARS)),
        other => other,
    };
    accept(FieldName::Name, value, profile)
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].trim_end().to_owned(),
        None => text.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_char_boundaries() {
        let long = "₹".repeat(150);
        assert_eq!(truncate_chars(&long, MAX_NAME_CHARS).chars().count(), 100);
        assert_eq!(truncate_chars("short", MAX_NAME_CHARS), "short");
    }
}
