//! Parsed document plus the URL base used to resolve relative links.

use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::error::ScraperError;
use crate::selector::element_text;

/// Elements whose text never reaches a shopper.
const INVISIBLE_TAGS: [&str; 5] = ["script", "style", "noscript", "template", "svg"];

pub(super) struct Page {
    html: Html,
    base: Option<Url>,
}

impl Page {
    /// Parses `body` as HTML.
    ///
    /// The HTML parser accepts anything, so "unparseable" means there is no
    /// markup to speak of: an empty body or one without a single tag.
    pub(super) fn parse(
        body: &str,
        document_url: Option<&str>,
        fallback_base: Option<&str>,
    ) -> Result<Self, ScraperError> {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Err(ScraperError::Parse {
                reason: "empty document".to_owned(),
            });
        }
        if !trimmed.contains('<') || !trimmed.contains('>') {
            return Err(ScraperError::Parse {
                reason: "payload contains no markup".to_owned(),
            });
        }

        let html = Html::parse_document(body);
        let document_url = document_url.and_then(|u| Url::parse(u).ok());
        let fallback = fallback_base.and_then(|u| Url::parse(u).ok());
        let base = first_attr(&html, "base[href]", "href")
            .and_then(|href| match document_url.as_ref().or(fallback.as_ref()) {
                Some(base) => base.join(&href).ok(),
                None => Url::parse(&href).ok(),
            })
            .or(document_url)
            .or(fallback);

        Ok(Self { html, base })
    }

    pub(super) fn root(&self) -> ElementRef<'_> {
        self.html.root_element()
    }

    pub(super) fn base(&self) -> Option<&Url> {
        self.base.as_ref()
    }

    /// Text of the first element matching `css` that has any.
    pub(super) fn first_text(&self, css: &str) -> Option<String> {
        let selector = Selector::parse(css).ok()?;
        self.html
            .select(&selector)
            .map(element_text)
            .find(|text| !text.is_empty())
    }

    /// `content` of the first `<meta>` whose `property` or `name` is `key`.
    pub(super) fn meta(&self, key: &str) -> Option<String> {
        first_attr(&self.html, &format!(r#"meta[property="{key}"]"#), "content")
            .or_else(|| first_attr(&self.html, &format!(r#"meta[name="{key}"]"#), "content"))
            .filter(|content| !content.trim().is_empty())
    }

    /// Text a shopper would see, with whitespace collapsed.
    pub(super) fn visible_text(&self) -> String {
        let mut parts = Vec::new();
        collect_visible(self.root(), &mut parts);
        parts
            .iter()
            .flat_map(|part| part.split_whitespace())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn first_attr(html: &Html, css: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    html.select(&selector)
        .find_map(|el| el.value().attr(attr).map(str::to_owned))
}

fn collect_visible<'a>(element: ElementRef<'a>, parts: &mut Vec<&'a str>) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            if INVISIBLE_TAGS.contains(&child_element.value().name()) {
                continue;
            }
            collect_visible(child_element, parts);
        } else if let Some(text) = child.value().as_text() {
            parts.push(&**text);
        }
    }
}
