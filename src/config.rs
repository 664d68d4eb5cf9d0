//! Pipeline configuration.
//!
//! Two layers:
//! - [`PipelineConfig`]: long-lived settings (timeouts, strategy order, proxy
//!   credentials, pacing), optionally loaded from a YAML file. Every field has
//!   a default so a partial file is valid.
//! - [`RunConfig`]: per-request limits, clamped at the boundary.

use crate::models::StrategyKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Pages walked per run. Not configurable.
pub const MAX_PAGES: usize = 5;
/// Lower bound for `max_articles`.
pub const MIN_ARTICLES: usize = 1;
/// Upper bound for `max_articles`.
pub const MAX_ARTICLES: usize = 100;
/// Used when `max_articles` is missing or not a number.
pub const DEFAULT_MAX_ARTICLES: usize = 20;
/// Default number of articles that get a model summary.
pub const DEFAULT_MAX_SUMMARIES: usize = 10;

/// Minimum length a proxy token needs before it is considered configured.
const MIN_PROXY_TOKEN_LEN: usize = 11;

/// Long-lived pipeline settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Default retrieval order; a run's method hint moves one entry first.
    pub strategy_order: Vec<StrategyKind>,
    /// Scraping API endpoint.
    pub proxy_endpoint: String,
    /// Scraping API token.
    pub proxy_token: Option<String>,
    /// Extra query parameters sent to the scraping API (e.g. `render=true`).
    pub proxy_params: BTreeMap<String, String>,
    pub proxy_timeout_secs: u64,
    pub direct_timeout_secs: u64,
    /// Attempts made by direct HTTP before it gives up.
    pub direct_retries: u32,
    /// Linear backoff unit between direct attempts.
    pub direct_backoff_ms: u64,
    pub browser_timeout_secs: u64,
    /// Settle delay after navigation before the DOM is read.
    pub browser_settle_ms: u64,
    /// Minimum spacing between outbound requests.
    pub min_delay_ms: u64,
    pub max_summaries: usize,
    /// Pause between successive summarization calls.
    pub summary_pacing_ms: u64,
    /// Characters of page HTML handed to the fallback extractor.
    pub fallback_excerpt_chars: usize,
    /// Chat template used for the fallback extractor.
    pub extract_template: String,
    /// Chat template used for summaries.
    pub summary_template: String,
    /// Retries for a single model call.
    pub model_retries: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            strategy_order: StrategyKind::DEFAULT_ORDER.to_vec(),
            proxy_endpoint: "https://api.scrape.do/".to_string(),
            proxy_token: None,
            proxy_params: BTreeMap::new(),
            proxy_timeout_secs: 60,
            direct_timeout_secs: 10,
            direct_retries: 3,
            direct_backoff_ms: 1500,
            browser_timeout_secs: 15,
            browser_settle_ms: 2000,
            min_delay_ms: 500,
            max_summaries: DEFAULT_MAX_SUMMARIES,
            summary_pacing_ms: 500,
            fallback_excerpt_chars: 10_000,
            extract_template: "harvest_extract".to_string(),
            summary_template: "harvest_summary".to_string(),
            model_retries: 2,
        }
    }
}

impl PipelineConfig {
    /// Load settings from a YAML file.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_yaml_str(&raw)?;
        info!(order = ?config.strategy_order, "Loaded pipeline settings");
        Ok(config)
    }

    /// Parse settings from YAML text. Empty text yields the defaults.
    pub fn from_yaml_str(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// The proxy token, if one long enough to be real is configured.
    pub fn usable_proxy_token(&self) -> Option<&str> {
        self.proxy_token
            .as_deref()
            .map(str::trim)
            .filter(|t| t.len() >= MIN_PROXY_TOKEN_LEN)
    }

    pub fn proxy_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_timeout_secs)
    }

    pub fn direct_timeout(&self) -> Duration {
        Duration::from_secs(self.direct_timeout_secs)
    }

    pub fn browser_timeout(&self) -> Duration {
        Duration::from_secs(self.browser_timeout_secs)
    }

    pub fn browser_settle(&self) -> Duration {
        Duration::from_millis(self.browser_settle_ms)
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn summary_pacing(&self) -> Duration {
        Duration::from_millis(self.summary_pacing_ms)
    }
}

/// Per-request limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    /// Always within `[MIN_ARTICLES, MAX_ARTICLES]`.
    pub max_articles: usize,
    /// Always [`MAX_PAGES`].
    pub max_pages: usize,
    pub max_summaries: usize,
}

impl RunConfig {
    pub fn new(max_articles: i64, max_summaries: usize) -> Self {
        Self {
            max_articles: clamp_max_articles(max_articles),
            max_pages: MAX_PAGES,
            max_summaries,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ARTICLES as i64, DEFAULT_MAX_SUMMARIES)
    }
}

/// Clamp a requested article count into `[1, 100]`.
pub fn clamp_max_articles(requested: i64) -> usize {
    requested.clamp(MIN_ARTICLES as i64, MAX_ARTICLES as i64) as usize
}

/// Coerce raw caller input into an article count.
///
/// Numbers are clamped into `[1, 100]`; anything that is not an integer
/// becomes [`DEFAULT_MAX_ARTICLES`].
pub fn parse_max_articles(raw: &str) -> usize {
    match raw.trim().parse::<i64>() {
        Ok(n) => clamp_max_articles(n),
        Err(_) => {
            debug!(raw, "Non-numeric max_articles; using default");
            DEFAULT_MAX_ARTICLES
        }
    }
}
