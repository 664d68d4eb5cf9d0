//! Tiered body-text assembly and small per-block field readers.

use super::selectors::{BLOCK_DATE, CONTENT_CLASS, DATE_NOISE, LINK, TIERS, TITLE};
use crate::utils::{char_len, normalize_text};
use itertools::Itertools;
use scraper::ElementRef;
use tracing::trace;
use url::Url;

/// Visible text of `el`: trimmed text nodes joined by single spaces.
pub fn text_of(el: &ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .join(" ")
}

/// Assemble the body of `root` from the content tiers.
///
/// Each tier contributes the text of its matching descendants that is longer
/// than the tier minimum, differs from `title`, and is not already contained
/// in a collected fragment. Fragments are joined by blank lines and then
/// whitespace-normalized.
pub fn assemble_content(root: ElementRef<'_>, title: &str) -> String {
    let mut parts: Vec<String> = Vec::new();

    for (tier, selector) in TIERS.iter() {
        let before = parts.len();
        for el in root.select(selector) {
            if el.id() == root.id() {
                continue;
            }
            if tier.needs_content_class {
                let class = el.value().attr("class").unwrap_or_default();
                if !CONTENT_CLASS.is_match(class) {
                    continue;
                }
            }
            let text = text_of(&el);
            if char_len(&text) <= tier.min_chars || text == title {
                continue;
            }
            if parts.iter().any(|p| p.contains(text.as_str())) {
                continue;
            }
            parts.push(text);
        }
        trace!(tier = tier.name, added = parts.len() - before, "Content tier");
    }

    normalize_text(&parts.join("\n\n"))
}

/// First heading inside `block`, whitespace-normalized.
pub fn block_title(block: &ElementRef<'_>) -> Option<String> {
    block
        .select(&TITLE)
        .map(|h| normalize_text(&text_of(&h)))
        .find(|t| !t.is_empty())
}

/// Absolute URL of the block's first link, or `page_url` when there is none.
pub fn block_link(block: &ElementRef<'_>, page_url: &Url) -> String {
    block
        .select(&LINK)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .find(|h| !h.is_empty())
        .and_then(|href| page_url.join(href).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|u| u.to_string())
        .unwrap_or_else(|| page_url.to_string())
}

/// Printed date inside `block`, if any.
pub fn block_date(block: &ElementRef<'_>) -> Option<String> {
    block.select(&BLOCK_DATE).find_map(|el| date_text(&el))
}

/// Text of a date element with punctuation noise removed. Falls back to a
/// `datetime` attribute when the element has no text.
pub fn date_text(el: &ElementRef<'_>) -> Option<String> {
    let text = text_of(el);
    let raw = if text.is_empty() {
        el.value().attr("datetime").unwrap_or_default().to_string()
    } else {
        text
    };
    clean_date(&raw)
}

pub fn clean_date(raw: &str) -> Option<String> {
    let cleaned = DATE_NOISE.replace_all(raw, "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}
