//! Standard and Alternative tiers: the profile's CSS selector sets.

use shelfscan_core::{FieldName, SelectorTier, SiteProfile};

use super::page::Page;
use super::{accept, OFFER_SEPARATOR};
use crate::normalize::{normalize, normalize_url_list, FieldKind};
use crate::selector::{compile_all, FieldSelector};
use crate::types::{FieldValue, PartialRecord};

/// Attributes tried in order for image selectors without an `@attr` suffix.
const IMAGE_ATTRS: [&str; 3] = ["src", "data-src", "data-lazy-src"];

pub(super) fn run(page: &Page, tier: &SelectorTier, profile: &SiteProfile) -> PartialRecord {
    let root = page.root();
    let scope = tier
        .container
        .as_deref()
        .and_then(FieldSelector::parse)
        .and_then(|container| container.select(root).next())
        .unwrap_or_else(|| {
            if let Some(container) = &tier.container {
                tracing::debug!(
                    tier = %tier.tier,
                    container = container.as_str(),
                    "container not found; using whole document"
                );
            }
            root
        });

    let mut partial = PartialRecord::new();
    for (field, raws) in &tier.selectors {
        let selectors = compile_all(raws);
        let value = match field {
            FieldName::ImageUrls => images(&selectors, scope, page, profile),
            FieldName::Offers => offers(&selectors, scope, profile),
            _ => first_valid(*field, &selectors, scope, page, profile),
        };
        partial.insert(*field, value);
    }
    partial
}

/// First match, across selectors in order, that normalizes and passes the
/// field's rule.
fn first_valid(
    field: FieldName,
    selectors: &[FieldSelector],
    scope: scraper::ElementRef<'_>,
    page: &Page,
    profile: &SiteProfile,
) -> FieldValue {
    let kind = FieldKind::for_field(field, profile.rule(field));
    for selector in selectors {
        for raw in selector.select(scope).filter_map(|el| selector.read(el)) {
            let value = accept(field, normalize(kind, &raw, page.base()), profile);
            if value.is_present() {
                tracing::trace!(%field, selector = selector.raw(), "selector matched");
                return value;
            }
        }
    }
    FieldValue::Missing
}

fn images(
    selectors: &[FieldSelector],
    scope: scraper::ElementRef<'_>,
    page: &Page,
    profile: &SiteProfile,
) -> FieldValue {
    let mut raws = Vec::new();
    for selector in selectors {
        for el in selector.select(scope) {
            let raw = match selector.attr() {
                Some(attr) => el.value().attr(attr),
                None => IMAGE_ATTRS.iter().find_map(|attr| el.value().attr(attr)),
            };
            if let Some(raw) = raw.filter(|r| !r.trim().is_empty()) {
                raws.push(raw.to_owned());
            }
        }
    }
    let value = normalize_url_list(raws.iter().map(String::as_str), page.base());
    accept(FieldName::ImageUrls, value, profile)
}

/// Every distinct valid offer text, joined.
fn offers(
    selectors: &[FieldSelector],
    scope: scraper::ElementRef<'_>,
    profile: &SiteProfile,
) -> FieldValue {
    let mut found: Vec<String> = Vec::new();
    for selector in selectors {
        for raw in selector.select(scope).filter_map(|el| selector.read(el)) {
            let value = accept(
                FieldName::Offers,
                normalize(FieldKind::Text, &raw, None),
                profile,
            );
            if let FieldValue::Text(text) = value {
                if !found.contains(&text) {
                    found.push(text);
                }
            }
        }
    }
    if found.is_empty() {
        FieldValue::Missing
    } else {
        FieldValue::Text(found.join(OFFER_SEPARATOR))
    }
}
