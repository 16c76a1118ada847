//! Profile selector strings compiled for the `scraper` crate.
//!
//! On top of plain CSS a profile selector may carry two extensions:
//! - `base:contains("needle")` keeps only matches whose text contains
//!   `needle`, compared case-insensitively.
//! - a trailing `@attr` reads that attribute instead of the element text.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};

static CONTAINS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?P<base>.*?):contains\((?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)')\)$"#)
        .expect("valid regex")
});

static ATTR_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<css>.+)@(?P<attr>[A-Za-z_][\w:-]*)$").expect("valid regex"));

/// One compiled profile selector.
#[derive(Debug)]
pub(crate) struct FieldSelector {
    raw: String,
    css: Selector,
    contains: Option<String>,
    attr: Option<String>,
}

impl FieldSelector {
    /// Compiles `raw`, or logs and returns `None` when it is not valid CSS.
    pub(crate) fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let (css, attr) = match ATTR_SUFFIX.captures(trimmed) {
            Some(caps) => (
                caps.name("css").map_or("", |m| m.as_str()),
                caps.name("attr").map(|m| m.as_str().to_owned()),
            ),
            None => (trimmed, None),
        };

        let (base, contains) = match CONTAINS.captures(css) {
            Some(caps) => {
                let needle = caps
                    .name("dq")
                    .or_else(|| caps.name("sq"))
                    .map_or("", |m| m.as_str());
                let base = caps.name("base").map_or("", |m| m.as_str().trim());
                (
                    if base.is_empty() { "*" } else { base },
                    Some(needle.to_lowercase()),
                )
            }
            None => (css, None),
        };

        match Selector::parse(base) {
            Ok(css) => Some(Self {
                raw: raw.to_owned(),
                css,
                contains,
                attr,
            }),
            Err(err) => {
                tracing::warn!(selector = raw, error = ?err, "skipping invalid selector");
                None
            }
        }
    }

    pub(crate) fn raw(&self) -> &str {
        &self.raw
    }

    pub(crate) fn attr(&self) -> Option<&str> {
        self.attr.as_deref()
    }

    /// Matches under `scope`, in document order.
    pub(crate) fn select<'s, 'a: 's>(
        &'s self,
        scope: ElementRef<'a>,
    ) -> impl Iterator<Item = ElementRef<'a>> + 's {
        scope.select(&self.css).filter(move |el| match &self.contains {
            Some(needle) => element_text(*el).to_lowercase().contains(needle.as_str()),
            None => true,
        })
    }

    /// The attribute named by `@attr`, or the element's text.
    pub(crate) fn read(&self, el: ElementRef<'_>) -> Option<String> {
        match &self.attr {
            Some(attr) => el.value().attr(attr).map(str::to_owned),
            None => Some(element_text(el)),
        }
    }
}

/// Text content of `el` with whitespace runs collapsed.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compiles every selector in `raws`, dropping the invalid ones.
pub(crate) fn compile_all(raws: &[String]) -> Vec<FieldSelector> {
    raws.iter().filter_map(|raw| FieldSelector::parse(raw)).collect()
}

#[cfg(test)]
mod tests {
    use scraper::Html;

    use super::*;

    const CARD: &str = r#"
        <div class="card">
          <img alt="Vivo Y28 5G" src="/img/y28.jpg">
          <span class="badge">Hot deal</span>
          <span class="badge">23% off</span>
          <a href="mailto:sales@shop.example">mail</a>
        </div>
    "#;

    fn texts(selector: &FieldSelector, html: &Html) -> Vec<String> {
        selector
            .select(html.root_element())
            .filter_map(|el| selector.read(el))
            .collect()
    }

    #[test]
    fn contains_filters_by_text_case_insensitively() {
        let html = Html::parse_fragment(CARD);
        let selector = FieldSelector::parse(r#"span:contains("% OFF")"#).unwrap();
        assert_eq!(texts(&selector, &html), vec!["23% off".to_owned()]);
    }

    #[test]
    fn contains_without_base_matches_any_element() {
        let html = Html::parse_fragment(CARD);
        let selector = FieldSelector::parse(":contains('hot deal')").unwrap();
        assert!(texts(&selector, &html).iter().any(|t| t == "Hot deal"));
    }

    #[test]
    fn attr_suffix_reads_attribute() {
        let html = Html::parse_fragment(CARD);
        let selector = FieldSelector::parse("img@alt").unwrap();
        assert_eq!(selector.attr(), Some("alt"));
        assert_eq!(texts(&selector, &html), vec!["Vivo Y28 5G".to_owned()]);
    }

    #[test]
    fn at_sign_inside_attribute_value_is_not_a_suffix() {
        let selector = FieldSelector::parse(r#"a[href*="@shop"]"#).unwrap();
        assert_eq!(selector.attr(), None);
        let html = Html::parse_fragment(CARD);
        assert_eq!(texts(&selector, &html), vec!["mail".to_owned()]);
    }

    #[test]
    fn invalid_selector_is_skipped() {
        assert!(FieldSelector::parse("div[[").is_none());
        let compiled = compile_all(&["div[[".to_owned(), "span".to_owned()]);
        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0].raw(), "span");
    }
}
