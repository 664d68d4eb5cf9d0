//! "Next page" discovery for listing pages.
//!
//! Structural selectors are tried first, in rank order. When none of them
//! produces a usable link, every anchor is scanned for an exact "next" label.
//! A link that resolves back to the current page ends pagination.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

/// Structural "next page" selectors, best first.
const NEXT_SELECTORS: &[&str] = &[
    r#"a[rel~="next"]"#,
    r#"link[rel~="next"]"#,
    "a.next",
    "a.next-page",
    ".next > a",
    "li.next a",
    "li.pagination-next a",
    "a[aria-label]",
    "a[title]",
];

/// Anchor labels accepted by the text fallback (compared lower-cased).
const NEXT_LABELS: &[&str] = &["next", "suivant", ">"];

static STRUCTURAL: Lazy<Vec<(&'static str, Selector)>> = Lazy::new(|| {
    NEXT_SELECTORS
        .iter()
        .map(|s| (*s, Selector::parse(s).unwrap()))
        .collect()
});
static ANCHORS: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

#[derive(Debug, Default, Clone, Copy)]
pub struct PaginationWalker;

impl PaginationWalker {
    pub fn new() -> Self {
        Self
    }

    /// Find the next listing page after `current`.
    ///
    /// Returns `None` when no candidate exists or when the candidate resolves
    /// to `current` itself (fragments ignored).
    pub fn next_page(&self, document: &Html, current: &Url) -> Option<Url> {
        let href = structural_match(document).or_else(|| label_match(document))?;

        let mut next = current.join(href).ok()?;
        if !matches!(next.scheme(), "http" | "https") {
            return None;
        }
        next.set_fragment(None);

        let mut here = current.clone();
        here.set_fragment(None);
        if next == here {
            debug!(url = %current, "Next link points at the current page; stopping");
            return None;
        }
        Some(next)
    }
}

fn usable_href<'a>(el: &ElementRef<'a>) -> Option<&'a str> {
    el.value()
        .attr("href")
        .map(str::trim)
        .filter(|h| !h.is_empty() && !h.to_ascii_lowercase().starts_with("javascript:"))
}

/// `aria-label` and `title` only count when they mention "next".
fn attr_mentions_next(el: &ElementRef<'_>, attr: &str) -> bool {
    el.value()
        .attr(attr)
        .map(|v| v.to_lowercase().contains("next"))
        .unwrap_or(false)
}

fn structural_match(document: &Html) -> Option<&str> {
    STRUCTURAL.iter().find_map(|(raw, sel)| {
        document.select(sel).find_map(|el| {
            let ok = match *raw {
                "a[aria-label]" => attr_mentions_next(&el, "aria-label"),
                "a[title]" => attr_mentions_next(&el, "title"),
                _ => true,
            };
            if ok { usable_href(&el) } else { None }
        })
    })
}

fn label_match(document: &Html) -> Option<&str> {
    document.select(&ANCHORS).find_map(|el| {
        let label = el.text().collect::<String>().trim().to_lowercase();
        if NEXT_LABELS.contains(&label.as_str()) {
            usable_href(&el)
        } else {
            None
        }
    })
}
