//! Heuristic article extraction from listing pages.
//!
//! # Pipeline per page
//!
//! 1. Every block matching one of [`selectors::BLOCK_SELECTORS`] becomes a
//!    candidate (at most `limit` per selector, each element once).
//! 2. A candidate needs a heading title of at least ten characters that is
//!    not navigation chrome and has not been seen earlier in the run.
//! 3. Its body is assembled from the content tiers in [`content`].
//! 4. Thin bodies (under 100 characters) with their own permalink trigger a
//!    secondary fetch of that permalink through the non-browser strategies.
//! 5. Articles are kept only when the final body exceeds 30 characters.
//!
//! Parsing is synchronous and finishes before any network call, so no
//! `scraper::Html` is held across an await point.

pub mod article_page;
pub mod content;
pub mod selectors;

use crate::fetch::RetrievalChain;
use crate::models::{Article, StrategyKind, normalize_title};
use crate::utils::char_len;
use content::{assemble_content, block_date, block_link, block_title};
use scraper::Html;
use selectors::{BLOCKS, MIN_CONTENT_CHARS, MIN_TITLE_CHARS, SECONDARY_FETCH_BELOW, is_stop_title};
use std::collections::HashSet;
use tracing::{debug, info, instrument};
use url::Url;

/// A block that passed the title checks, before its content is judged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    pub url: String,
    pub content: String,
    pub date: Option<String>,
}

/// Why a title was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleReject {
    TooShort,
    StopWord,
    Duplicate,
}

/// Extractor holding the run-scoped set of seen titles.
///
/// One instance lives for one pipeline run; dropping it forgets every title.
#[derive(Debug, Default)]
pub struct ArticleExtractor {
    seen_titles: HashSet<String>,
}

impl ArticleExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a title and, when accepted, register it as seen.
    pub fn admit_title(&mut self, title: &str) -> Result<(), TitleReject> {
        if char_len(title.trim()) < MIN_TITLE_CHARS {
            return Err(TitleReject::TooShort);
        }
        let key = normalize_title(title);
        if is_stop_title(&key) {
            return Err(TitleReject::StopWord);
        }
        if !self.seen_titles.insert(key) {
            return Err(TitleReject::Duplicate);
        }
        Ok(())
    }

    /// Register a title without checks. Returns false if it was already seen.
    fn claim(&mut self, title: &str) -> bool {
        self.seen_titles.insert(normalize_title(title))
    }

    pub fn has_seen(&self, title: &str) -> bool {
        self.seen_titles.contains(&normalize_title(title))
    }

    /// Collect title-checked candidates from one listing page.
    pub fn candidates(&mut self, html: &str, page_url: &Url, per_selector_cap: usize) -> Vec<Candidate> {
        let document = Html::parse_document(html);
        let mut visited = HashSet::new();
        let mut out = Vec::new();

        for selector in BLOCKS.iter() {
            for block in document.select(selector).take(per_selector_cap) {
                if !visited.insert(block.id()) {
                    continue;
                }
                let Some(title) = block_title(&block) else {
                    continue;
                };
                if let Err(reason) = self.admit_title(&title) {
                    debug!(%title, ?reason, "Rejected block title");
                    continue;
                }
                out.push(Candidate {
                    url: block_link(&block, page_url),
                    content: assemble_content(block, &title),
                    date: block_date(&block),
                    title,
                });
            }
        }
        out
    }

    /// Extract up to `limit` articles from one listing page.
    ///
    /// `chain` and `order` serve the secondary fetch of thin articles; browser
    /// strategies are never used for it.
    #[instrument(level = "info", skip_all, fields(url = %page_url, limit = limit))]
    pub async fn extract(
        &mut self,
        html: &str,
        page_url: &Url,
        limit: usize,
        chain: &RetrievalChain,
        order: &[StrategyKind],
    ) -> Vec<Article> {
        let mut articles = Vec::new();
        if limit == 0 {
            return articles;
        }

        let candidates = self.candidates(html, page_url, limit);
        let found = candidates.len();

        for mut candidate in candidates {
            if articles.len() >= limit {
                break;
            }

            if char_len(&candidate.content) < SECONDARY_FETCH_BELOW && candidate.url != page_url.as_str() {
                self.enrich_from_permalink(&mut candidate, chain, order).await;
            }

            if char_len(&candidate.content) <= MIN_CONTENT_CHARS {
                debug!(title = %candidate.title, chars = char_len(&candidate.content), "Rejected thin article");
                continue;
            }

            articles.push(Article {
                title: candidate.title,
                url: candidate.url,
                content: candidate.content,
                date: candidate.date,
                resume: None,
            });
        }

        info!(candidates = found, accepted = articles.len(), "Extracted articles");
        articles
    }

    async fn enrich_from_permalink(
        &mut self,
        candidate: &mut Candidate,
        chain: &RetrievalChain,
        order: &[StrategyKind],
    ) {
        let fetched = match chain.fetch_without_browsers(&candidate.url, order).await {
            Ok(f) => f,
            Err(e) => {
                debug!(url = %candidate.url, error = %e, "Secondary fetch failed");
                return;
            }
        };

        let page = article_page::parse_article_page(&fetched.html, &candidate.title);
        if char_len(&page.content) > char_len(&candidate.content) {
            candidate.content = page.content;
        }
        if let Some(title) = page.title {
            if char_len(&title) > char_len(&candidate.title) && self.claim(&title) {
                candidate.title = title;
            }
        }
        if candidate.date.is_none() {
            candidate.date = page.date;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::chain::tests::FakeStrategy;
    use std::sync::Arc;

    const PAGE: &str = "https://site.test/news";

    fn url() -> Url {
        Url::parse(PAGE).unwrap()
    }

    fn body(n: usize) -> String {
        format!("<p>{}</p>", "Detailed reporting on the matter. ".repeat(n))
    }

    #[tokio::test]
    async fn test_extracts_blocks_with_links_and_dates() {
        let html = format!(
            r#"<html><body>
            <article><h2>First headline of the day</h2><a href="/a/1">read</a>
              <span class="date">2024-01-02</span>{}</article>
            <div class="post"><h3>Second headline of the day</h3>{}</div>
            </body></html>"#,
            body(5),
            body(5)
        );
        let mut ex = ArticleExtractor::new();
        let articles = ex
            .extract(&html, &url(), 10, &RetrievalChain::default(), &StrategyKind::DEFAULT_ORDER)
            .await;
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].url, "https://site.test/a/1");
        assert_eq!(articles[0].date.as_deref(), Some("2024-01-02"));
        assert_eq!(articles[1].url, PAGE);
        assert!(articles.iter().all(|a| a.resume.is_none()));
    }

    #[tokio::test]
    async fn test_stop_word_title_rejected_regardless_of_content() {
        let html = format!(
            r#"<article><h2>   NAVIGATION   </h2>{}</article>"#,
            body(20)
        );
        let mut ex = ArticleExtractor::new();
        let articles = ex
            .extract(&html, &url(), 10, &RetrievalChain::default(), &StrategyKind::DEFAULT_ORDER)
            .await;
        assert!(articles.is_empty());
    }

    #[test]
    fn test_admit_title_rules() {
        let mut ex = ArticleExtractor::new();
        assert_eq!(ex.admit_title("Too short"), Err(TitleReject::TooShort));
        assert_eq!(ex.admit_title("Navigation"), Err(TitleReject::StopWord));
        assert_eq!(ex.admit_title("A proper headline"), Ok(()));
        assert_eq!(ex.admit_title("  a PROPER headline "), Err(TitleReject::Duplicate));
        assert!(ex.has_seen("A Proper Headline"));
    }

    #[tokio::test]
    async fn test_dedup_across_pages_of_one_run() {
        let html = format!(r#"<article><h2>Same story everywhere</h2>{}</article>"#, body(3));
        let mut ex = ArticleExtractor::new();
        let chain = RetrievalChain::default();
        let first = ex.extract(&html, &url(), 10, &chain, &StrategyKind::DEFAULT_ORDER).await;
        let second = ex.extract(&html, &url(), 10, &chain, &StrategyKind::DEFAULT_ORDER).await;
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_thin_block_rejected_without_permalink() {
        let html = r#"<article><h2>Headline without a body</h2><p>Too little text.</p></article>"#;
        let mut ex = ArticleExtractor::new();
        let articles = ex
            .extract(html, &url(), 10, &RetrievalChain::default(), &StrategyKind::DEFAULT_ORDER)
            .await;
        assert!(articles.is_empty());
    }

    #[tokio::test]
    async fn test_secondary_fetch_fills_thin_article() {
        let listing = r#"<article><h2>Council approves budget</h2><a href="/story">more</a><p>Short teaser only.</p></article>"#;
        let story = r#"<html><body><h1>Council approves the 2025 municipal budget</h1>
            <time>2025-01-15</time>
            <article><p>The council approved the budget late on Tuesday after a long debate.</p>
            <p>Spending on schools rises while road maintenance stays flat for the year.</p></article>
            </body></html>"#;
        let direct = Arc::new(FakeStrategy::serving(
            StrategyKind::Direct,
            &[("https://site.test/story", story)],
        ));
        let chromium = Arc::new(FakeStrategy::empty(StrategyKind::Chromium));
        let chain = RetrievalChain::new(vec![direct.clone(), chromium.clone()]);

        let mut ex = ArticleExtractor::new();
        let articles = ex.extract(listing, &url(), 10, &chain, &StrategyKind::DEFAULT_ORDER).await;

        assert_eq!(articles.len(), 1);
        let a = &articles[0];
        assert_eq!(a.title, "Council approves the 2025 municipal budget");
        assert!(a.content.contains("road maintenance"));
        assert_eq!(a.date.as_deref(), Some("2025-01-15"));
        assert_eq!(direct.calls(), 1);
        assert_eq!(chromium.calls(), 0);
    }

    #[tokio::test]
    async fn test_limit_is_respected() {
        let blocks: String = (0..8)
            .map(|i| format!("<article><h2>Headline number {i} today</h2>{}</article>", body(3)))
            .collect();
        let mut ex = ArticleExtractor::new();
        let articles = ex
            .extract(&blocks, &url(), 3, &RetrievalChain::default(), &StrategyKind::DEFAULT_ORDER)
            .await;
        assert_eq!(articles.len(), 3);
    }
}
