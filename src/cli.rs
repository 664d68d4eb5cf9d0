//! Command-line interface definitions for News Harvest.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Credentials can be provided via command-line flags or environment variables.

use clap::Parser;

/// Command-line arguments for one harvesting run.
///
/// # Examples
///
/// ```sh
/// # Print the result as JSON on stdout
/// news_harvest example.com/news
///
/// # Prefer direct HTTP, keep 50 articles, write the result to disk
/// news_harvest https://example.com/blog -m direct -n 50 -j ./results
///
/// # Heuristics only, no model calls
/// news_harvest example.com --no-ai
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Listing page to harvest; `https://` is assumed when no scheme is given
    pub url: String,

    /// Retrieval strategy to try first (proxy, direct, chromium, headless)
    #[arg(short, long, default_value = "")]
    pub method: String,

    /// Maximum number of articles (clamped to 1..=100; non-numeric means 20)
    #[arg(short = 'n', long, default_value = "20")]
    pub max_articles: String,

    /// Number of articles that get a model summary
    #[arg(long)]
    pub max_summaries: Option<usize>,

    /// Minimum spacing between outbound requests, in milliseconds
    #[arg(long)]
    pub min_delay_ms: Option<u64>,

    /// Optional path to a pipeline settings YAML file
    #[arg(short, long)]
    pub settings: Option<String>,

    /// Optional path to the language model config.yaml file
    #[arg(short = 'c', long)]
    pub llm_config: Option<String>,

    /// Skip the model fallback and summaries
    #[arg(long)]
    pub no_ai: bool,

    /// Output directory for the JSON result (stdout when omitted)
    #[arg(short, long)]
    pub json_output_dir: Option<String>,

    /// Scraping API token
    #[arg(long, env = "SCRAPEDO_API_KEY")]
    pub proxy_token: Option<String>,
}
