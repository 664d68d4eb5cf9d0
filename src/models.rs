//! Data models for harvested articles and pipeline results.
//!
//! This module defines the core data structures used throughout the crate:
//! - [`Article`]: One extracted article (heuristics or model fallback)
//! - [`StrategyKind`]: Which retrieval strategy produced a page
//! - [`Fetched`]: A page of HTML together with the strategy that served it
//! - [`PipelineResult`]: The structured record returned by [`crate::pipeline::Pipeline::run`]
//!
//! The result types serialize with snake_case keys; that JSON is what the
//! surrounding API layer hands to its clients.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Prefix shared by every placeholder `resume` the summarizer assigns.
pub const SUMMARY_UNAVAILABLE: &str = "summary unavailable";

/// A single article extracted from a listing page.
///
/// Articles are created by the heuristic extractor or the model fallback,
/// receive a `resume` once from the summarizer, and are dropped when the
/// request ends.
///
/// # Invariants
///
/// Every article that leaves the pipeline has `content` longer than 30
/// characters and a `title` of at least 10 characters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Article {
    /// Headline text.
    pub title: String,
    /// Absolute permalink, or the listing page URL when the block had none.
    pub url: String,
    /// Assembled body text.
    pub content: String,
    /// Publication date as printed on the page, lightly cleaned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Short model-written summary, or a placeholder explaining its absence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume: Option<String>,
}

impl Article {
    /// Returns true when `resume` holds a real summary rather than a placeholder.
    pub fn has_summary(&self) -> bool {
        self.resume
            .as_deref()
            .map(|r| !r.trim().is_empty() && !r.starts_with(SUMMARY_UNAVAILABLE))
            .unwrap_or(false)
    }

    /// Lower-cased, trimmed title used as the run-scoped dedup key.
    pub fn dedup_key(&self) -> String {
        normalize_title(&self.title)
    }
}

/// Normalize a title for duplicate detection.
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// The four interchangeable ways of obtaining a page's HTML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Third-party scraping API that renders the page for us.
    Proxy,
    /// Plain HTTP GET with retry and backoff.
    Direct,
    /// Headless Chromium driven over CDP by `chromiumoxide`.
    Chromium,
    /// Headless Chrome driven by the `headless_chrome` crate.
    Headless,
}

impl StrategyKind {
    /// Default attempt order when no hint is given.
    pub const DEFAULT_ORDER: [StrategyKind; 4] = [
        StrategyKind::Proxy,
        StrategyKind::Direct,
        StrategyKind::Chromium,
        StrategyKind::Headless,
    ];

    /// Stable lowercase name, used in logs and `method_used`.
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Proxy => "proxy",
            StrategyKind::Direct => "direct",
            StrategyKind::Chromium => "chromium",
            StrategyKind::Headless => "headless",
        }
    }

    /// Browser strategies spawn a rendering process for every call.
    pub fn is_browser(&self) -> bool {
        matches!(self, StrategyKind::Chromium | StrategyKind::Headless)
    }

    /// Build an attempt order that starts with `hint` and keeps the rest of
    /// `base` in place. An unparseable hint leaves `base` untouched.
    pub fn order_with_hint(hint: &str, base: &[StrategyKind]) -> Vec<StrategyKind> {
        let mut order = base.to_vec();
        if let Ok(first) = hint.parse::<StrategyKind>() {
            order.retain(|k| *k != first);
            order.insert(0, first);
        }
        order
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    /// Accepts the canonical names plus the engine names callers tend to use
    /// (`scrapedo`, `requests`, `playwright`, `selenium`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "proxy" | "scrapedo" | "scrape.do" => Ok(StrategyKind::Proxy),
            "direct" | "requests" | "http" => Ok(StrategyKind::Direct),
            "chromium" | "playwright" | "browser-a" => Ok(StrategyKind::Chromium),
            "headless" | "selenium" | "browser-b" => Ok(StrategyKind::Headless),
            other => Err(format!("unknown retrieval strategy: {other}")),
        }
    }
}

/// A page of HTML and the strategy that retrieved it.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// Rendered or raw HTML document.
    pub html: String,
    /// Strategy that succeeded.
    pub strategy: StrategyKind,
}

/// The structured record returned for every pipeline run.
///
/// `success` is false only when no HTML could be obtained for the very
/// first page; every other outcome, including zero articles, is a success
/// with an explanatory `feedback`.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub success: bool,
    pub articles: Vec<Article>,
    pub total_articles: usize,
    /// Strategy that served the first page, optionally suffixed with
    /// `+ia-fallback`.
    pub method_used: String,
    pub domain: String,
    pub feedback: String,
    #[serde(serialize_with = "serialize_seconds")]
    pub processing_time: Duration,
    pub articles_with_summaries: usize,
}

impl PipelineResult {
    /// Assemble a result, deriving the counters from `articles`.
    pub fn new(
        success: bool,
        articles: Vec<Article>,
        method_used: String,
        domain: String,
        feedback: String,
        processing_time: Duration,
    ) -> Self {
        let articles_with_summaries = articles.iter().filter(|a| a.has_summary()).count();
        Self {
            success,
            total_articles: articles.len(),
            articles,
            method_used,
            domain,
            feedback: feedback.trim().to_string(),
            processing_time,
            articles_with_summaries,
        }
    }
}

fn serialize_seconds<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format!("{:.2}s", d.as_secs_f64()))
}
