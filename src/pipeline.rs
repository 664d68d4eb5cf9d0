//! The harvesting pipeline: retrieval, extraction, pagination, model
//! fallback and summaries for one listing URL.
//!
//! # Flow
//!
//! ```text
//! run(url) ─▶ Fetching(page 1..=5) ─▶ Extracting ─┬─▶ next page? ─▶ Fetching
//!                                                 └─▶ FallbackCheck ─▶ Summarizing ─▶ Done
//! ```
//!
//! The loop ends when the article limit is reached, no next page exists, the
//! next page was already visited, a page cannot be retrieved, or five pages
//! have been read. [`Pipeline::run`] always returns a [`PipelineResult`];
//! `success` is false only when the first page could not be retrieved.

use crate::api::{AskAsync, ModelPair};
use crate::config::{PipelineConfig, RunConfig};
use crate::error::{FetchError, ParseError};
use crate::extract::ArticleExtractor;
use crate::fallback::AiFallbackExtractor;
use crate::fetch::{DirectFetch, ProxyFetch, RetrievalChain, RetrievalStrategy};
use crate::models::{Article, PipelineResult, StrategyKind};
use crate::paginate::PaginationWalker;
use crate::rate::RateBudget;
use crate::summarize::AiSummarizer;
use itertools::Itertools;
use scraper::Html;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Suffix appended to `method_used` when articles came from the model.
pub const FALLBACK_SUFFIX: &str = "+ia-fallback";

/// Prepend `https://` when `raw` has no http(s) scheme.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Host part of `url`, or `"unknown"`.
pub fn domain_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

/// One configured pipeline. Cheap to share by reference; every call to
/// [`Pipeline::run`] keeps its own accumulator and dedup set.
pub struct Pipeline<M> {
    config: PipelineConfig,
    chain: RetrievalChain,
    walker: PaginationWalker,
    fallback: AiFallbackExtractor,
    models: Option<ModelPair<M>>,
}

impl<M> std::fmt::Debug for Pipeline<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("chain", &self.chain)
            .field("order", &self.config.strategy_order)
            .field("models", &self.models.is_some())
            .finish()
    }
}

impl<M> Pipeline<M>
where
    M: AskAsync<Response = String>,
{
    pub fn new(config: PipelineConfig, chain: RetrievalChain, models: Option<ModelPair<M>>) -> Self {
        let fallback = AiFallbackExtractor::new(config.fallback_excerpt_chars);
        Self {
            config,
            chain,
            walker: PaginationWalker::new(),
            fallback,
            models,
        }
    }

    /// Build the strategy chain from settings. Browser strategies are
    /// included when their cargo feature is enabled.
    pub fn from_config(config: PipelineConfig, models: Option<ModelPair<M>>) -> Result<Self, FetchError> {
        let budget = Arc::new(RateBudget::new(config.min_delay()));
        let mut strategies: Vec<Arc<dyn RetrievalStrategy>> = vec![
            Arc::new(ProxyFetch::from_config(&config)?),
            Arc::new(DirectFetch::from_config(&config, Arc::clone(&budget))?),
        ];
        #[cfg(feature = "chromium")]
        strategies.push(Arc::new(crate::fetch::ChromiumFetch::from_config(
            &config,
            Arc::clone(&budget),
        )));
        #[cfg(feature = "headless-chrome")]
        strategies.push(Arc::new(crate::fetch::HeadlessChromeFetch::from_config(
            &config,
            Arc::clone(&budget),
        )));

        let chain = RetrievalChain::new(strategies);
        info!(strategies = ?chain.kinds(), min_delay_ms = config.min_delay_ms, "Pipeline ready");
        Ok(Self::new(config, chain, models))
    }

    fn next_page(&self, html: &str, current: &Url) -> Option<Url> {
        let document = Html::parse_document(html);
        self.walker.next_page(&document, current)
    }

    /// Harvest articles from `url`.
    ///
    /// `method_hint` moves one strategy to the front of the retrieval order;
    /// `max_articles` is clamped into `[1, 100]`.
    #[instrument(level = "info", skip_all, fields(url = %url, method = %method_hint, max_articles = max_articles))]
    pub async fn run(
        &self,
        url: &str,
        method_hint: &str,
        max_articles: i64,
        max_summaries: usize,
    ) -> PipelineResult {
        let t0 = Instant::now();
        let limits = RunConfig::new(max_articles, max_summaries);
        let normalized = normalize_url(url);
        let domain = domain_of(&normalized);
        let order = StrategyKind::order_with_hint(method_hint, &self.config.strategy_order);
        debug!(?order, ?limits, "Starting run");

        let start = match Url::parse(&normalized) {
            Ok(u) => u,
            Err(source) => {
                let err = ParseError::BaseUrl {
                    url: normalized.clone(),
                    source,
                };
                warn!(error = %err, "Rejected target URL");
                return PipelineResult::new(
                    false,
                    Vec::new(),
                    "none".to_string(),
                    domain,
                    format!("Unable to retrieve site content: {err}"),
                    t0.elapsed(),
                );
            }
        };

        let mut extractor = ArticleExtractor::new();
        let mut articles: Vec<Article> = Vec::new();
        let mut notes: Vec<String> = Vec::new();
        let mut visited: HashSet<Url> = HashSet::new();
        let mut first_html: Option<String> = None;
        let mut method: Option<StrategyKind> = None;
        let mut pages = 0usize;
        let mut current = Some(start.clone());

        while let Some(page_url) = current.take() {
            if pages >= limits.max_pages {
                debug!(pages, "Page limit reached");
                break;
            }
            if !visited.insert(page_url.clone()) {
                debug!(url = %page_url, "Page already visited; stopping");
                break;
            }
            pages += 1;

            let fetched = match self.chain.fetch(page_url.as_str(), &order).await {
                Ok(f) => f,
                Err(e) if pages == 1 => {
                    return PipelineResult::new(
                        false,
                        Vec::new(),
                        "none".to_string(),
                        domain,
                        format!("Unable to retrieve site content: {}", e.last_message()),
                        t0.elapsed(),
                    );
                }
                Err(e) => {
                    notes.push(format!(
                        "Page {pages} could not be retrieved ({}); kept the articles already found.",
                        e.last_message()
                    ));
                    break;
                }
            };
            method.get_or_insert(fetched.strategy);

            let remaining = limits.max_articles.saturating_sub(articles.len());
            let found = extractor
                .extract(&fetched.html, &page_url, remaining, &self.chain, &order)
                .await;
            info!(page = pages, url = %page_url, found = found.len(), "Page processed");
            articles.extend(found);

            if articles.len() < limits.max_articles {
                current = self.next_page(&fetched.html, &page_url);
            }
            if first_html.is_none() {
                first_html = Some(fetched.html);
            }
        }

        let mut method_used = method.map(|k| k.to_string()).unwrap_or_else(|| "none".to_string());

        if articles.is_empty() {
            if let Some(html) = first_html.as_deref() {
                self.run_fallback(html, &start, &mut extractor, &limits, &mut articles, &mut method_used, &mut notes)
                    .await;
            }
        }

        if articles.is_empty() {
            notes.push("No articles could be extracted from the page.".to_string());
        } else {
            notes.insert(
                0,
                format!(
                    "Extracted {} article(s) from {} page(s) using {}.",
                    articles.len(),
                    pages,
                    method_used
                ),
            );
        }

        let summarizer = AiSummarizer::new(limits.max_summaries, self.config.summary_pacing());
        summarizer
            .summarize(self.models.as_ref().map(|m| &m.summarize), &mut articles)
            .await;

        let result = PipelineResult::new(
            true,
            articles,
            method_used,
            domain,
            notes.iter().join(" "),
            t0.elapsed(),
        );
        info!(
            total = result.total_articles,
            summaries = result.articles_with_summaries,
            method = %result.method_used,
            elapsed_ms = result.processing_time.as_millis() as u64,
            "Run finished"
        );
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_fallback(
        &self,
        html: &str,
        page_url: &Url,
        extractor: &mut ArticleExtractor,
        limits: &RunConfig,
        articles: &mut Vec<Article>,
        method_used: &mut String,
        notes: &mut Vec<String>,
    ) {
        let Some(models) = self.models.as_ref() else {
            notes.push("Heuristics found no articles and no model is configured for the AI fallback.".to_string());
            return;
        };

        match self
            .fallback
            .extract(&models.extract, html, page_url, extractor, limits.max_articles)
            .await
        {
            Ok(found) if !found.is_empty() => {
                method_used.push_str(FALLBACK_SUFFIX);
                notes.push(format!(
                    "Heuristics found no articles; the AI fallback extracted {}.",
                    found.len()
                ));
                *articles = found;
            }
            Ok(_) => notes.push("The AI fallback found no usable articles.".to_string()),
            Err(e) => notes.push(format!("The AI fallback failed: {e}.")),
        }
    }
}
