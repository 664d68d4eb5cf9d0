//! # News Harvest
//!
//! Command-line driver for the harvesting pipeline: fetches one listing
//! page (and up to four following pages), extracts articles, optionally asks
//! a language model for summaries, and prints or stores the result as JSON.
//!
//! ## Usage
//!
//! ```sh
//! news_harvest example.com/news -n 30 -j ./results
//! ```
//!
//! ## Configuration
//!
//! - `--settings settings.yaml`: timeouts, strategy order, proxy endpoint
//!   and pacing (every key optional)
//! - `--llm-config config.yaml`: `awful_aj` client configuration; the
//!   `harvest_extract` and `harvest_summary` templates are loaded from the
//!   `awful_aj` template directory
//! - `SCRAPEDO_API_KEY`: scraping API token

use clap::Parser;
use news_harvest::api::load_models;
use news_harvest::config::parse_max_articles;
use news_harvest::outputs::json;
use news_harvest::utils::ensure_writable_dir;
use news_harvest::{Pipeline, PipelineConfig};
use std::error::Error;
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;

use cli::Cli;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    info!("news_harvest starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(url = %args.url, method = %args.method, ?args.json_output_dir, "Parsed CLI arguments");

    // ---- Load settings ----
    let mut settings = match args.settings.as_deref() {
        Some(path) => PipelineConfig::from_yaml_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(token) = args.proxy_token.clone() {
        settings.proxy_token = Some(token);
    }
    if let Some(ms) = args.min_delay_ms {
        settings.min_delay_ms = ms;
    }
    if settings.usable_proxy_token().is_none() {
        info!("No usable scraping API token; proxy strategy will be skipped");
    }
    let max_summaries = args.max_summaries.unwrap_or(settings.max_summaries);

    // ---- Load models ----
    let models = if args.no_ai {
        info!("Model features disabled by --no-ai");
        None
    } else {
        match load_models(
            args.llm_config.as_deref(),
            &settings.extract_template,
            &settings.summary_template,
            settings.model_retries,
        )
        .await
        {
            Ok(models) => Some(models),
            Err(e) => {
                warn!(error = %e, "Failed to load model configuration; continuing without AI features");
                None
            }
        }
    };

    // ---- Run ----
    let pipeline = Pipeline::from_config(settings, models)?;
    let max_articles = parse_max_articles(&args.max_articles) as i64;
    let result = pipeline
        .run(&args.url, &args.method, max_articles, max_summaries)
        .await;

    if !result.success {
        warn!(feedback = %result.feedback, "Run produced no content");
    }

    // ---- Output ----
    match args.json_output_dir.as_deref() {
        Some(dir) => {
            ensure_writable_dir(dir).await?;
            let path = json::write_result(&result, dir).await?;
            info!(path = %path.display(), "Result written");
        }
        None => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    info!(
        articles = result.total_articles,
        summaries = result.articles_with_summaries,
        processing_time = ?result.processing_time,
        "news_harvest finished"
    );
    Ok(())
}
