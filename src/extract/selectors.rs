//! Declarative selector tables driving heuristic extraction.
//!
//! Every CSS string here is a compile-time constant. The compiled forms live
//! in `Lazy` statics so each table is parsed once per process.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Selector;

/// Candidate article blocks. All matches of all selectors are candidates;
/// order only affects which blocks are seen first.
pub const BLOCK_SELECTORS: &[&str] = &[
    // generic
    "article",
    "div.post",
    "div.article",
    "div.story",
    "div.entry",
    "section.article",
    "article.article",
    // news families
    "div.news-item",
    "li.news-item",
    "div.news",
    "li.news",
    "div.news-article",
    "div.news-content",
    "div.news-block",
    "div.news-summary",
    "div.news-excerpt",
    "div.news-card",
    "div.news-teaser",
    "div.news-list-item",
    "div.news-wrapper",
    "div.actualite",
    "div.actualite-item",
    // article families
    "li.article",
    "div.content-article",
    "div.article-content",
    "div.article-block",
    "div.article-summary",
    "div.article-item",
    "div.article-card",
    "div.article-preview",
    "div.article-teaser",
    "div.article-snippet",
    "div.article-list-item",
    "div.article-entry",
    "div.article-wrapper",
    // blog families
    "div.blog-post",
    "li.blog-post",
    "div.blog-entry",
    "div.blog-item",
    "div.blog-article",
    "div.post-content",
    "div.post-item",
    "div.post-article",
];

/// Headings that can carry a block's title, first in document order wins.
pub const TITLE_SELECTOR: &str = "h1, h2, h3, h4";

/// Titles that are navigation chrome rather than headlines.
pub const STOP_TITLES: &[&str] = &[
    "accueil",
    "menu",
    "navigation",
    "footer",
    "boutique",
    "services",
    "home",
    "shop",
    "main menu",
    "newsletter",
];

/// Titles shorter than this are rejected.
pub const MIN_TITLE_CHARS: usize = 10;
/// Accepted articles have strictly more content characters than this.
pub const MIN_CONTENT_CHARS: usize = 30;
/// Below this many content characters a secondary fetch of the permalink is tried.
pub const SECONDARY_FETCH_BELOW: usize = 100;

/// Date-bearing elements inside a listing block.
pub const BLOCK_DATE_SELECTOR: &str =
    "time, span.date, div.date, span.timestamp, span.time, div.time";

/// One level of content assembly: elements matching `selector` contribute
/// their text when it is longer than `min_chars`.
#[derive(Debug, Clone, Copy)]
pub struct ContentTier {
    pub name: &'static str,
    pub selector: &'static str,
    pub min_chars: usize,
    /// Only elements whose `class` mentions a content keyword qualify.
    pub needs_content_class: bool,
}

pub const CONTENT_TIERS: &[ContentTier] = &[
    ContentTier {
        name: "paragraphs",
        selector: "p",
        min_chars: 15,
        needs_content_class: false,
    },
    ContentTier {
        name: "content-containers",
        selector: "div[class]",
        min_chars: 30,
        needs_content_class: true,
    },
    ContentTier {
        name: "subheadings",
        selector: "h2, h3, h4, h5, h6",
        min_chars: 10,
        needs_content_class: false,
    },
    ContentTier {
        name: "list-items",
        selector: "ul > li, ol > li",
        min_chars: 10,
        needs_content_class: false,
    },
    ContentTier {
        name: "spans",
        selector: "span",
        min_chars: 20,
        needs_content_class: false,
    },
    ContentTier {
        name: "sections",
        selector: "section",
        min_chars: 50,
        needs_content_class: false,
    },
    ContentTier {
        name: "nested-articles",
        selector: "article",
        min_chars: 30,
        needs_content_class: false,
    },
];

/// Title candidates on a standalone article page.
pub const PAGE_TITLE_SELECTOR: &str = "h1, h2, .title, .article-title, .post-title";

/// Main content regions on a standalone article page, best first.
pub const PAGE_CONTENT_SELECTORS: &[&str] = &[
    "article",
    ".article-content",
    ".post-content",
    ".entry-content",
    ".content",
    ".main-content",
    ".article-body",
    ".post-body",
];

/// A content region longer than this ends the region search.
pub const PAGE_CONTENT_ENOUGH: usize = 100;

/// Date elements on a standalone article page.
pub const PAGE_DATE_SELECTOR: &str = "time, .date, .published, .post-date, .article-date";

fn compile(raw: &str) -> Selector {
    Selector::parse(raw).unwrap()
}

pub static BLOCKS: Lazy<Vec<Selector>> =
    Lazy::new(|| BLOCK_SELECTORS.iter().map(|s| compile(s)).collect());
pub static TITLE: Lazy<Selector> = Lazy::new(|| compile(TITLE_SELECTOR));
pub static LINK: Lazy<Selector> = Lazy::new(|| compile("a[href]"));
pub static BLOCK_DATE: Lazy<Selector> = Lazy::new(|| compile(BLOCK_DATE_SELECTOR));
pub static TIERS: Lazy<Vec<(ContentTier, Selector)>> = Lazy::new(|| {
    CONTENT_TIERS
        .iter()
        .map(|t| (*t, compile(t.selector)))
        .collect()
});
pub static PAGE_TITLE: Lazy<Selector> = Lazy::new(|| compile(PAGE_TITLE_SELECTOR));
pub static PAGE_CONTENT: Lazy<Vec<Selector>> =
    Lazy::new(|| PAGE_CONTENT_SELECTORS.iter().map(|s| compile(s)).collect());
pub static PAGE_DATE: Lazy<Selector> = Lazy::new(|| compile(PAGE_DATE_SELECTOR));

/// Class names that mark a container as body text.
pub static CONTENT_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)content|text|body|article|post|entry|description|excerpt|summary").unwrap()
});

/// Characters kept in a printed date.
pub static DATE_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s\-/]").unwrap());

/// True when `normalized` (lower-cased, trimmed) is navigation chrome.
pub fn is_stop_title(normalized: &str) -> bool {
    STOP_TITLES.contains(&normalized)
}
