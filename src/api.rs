//! Language-model access with exponential backoff retry logic.
//!
//! This module is the only place that talks to the model. Both the fallback
//! extractor and the summarizer go through [`AskAsync`], so tests can swap
//! the real client for a scripted one.
//!
//! # Architecture
//!
//! - [`AskAsync`]: Core trait defining async model interaction
//! - [`AwfulJadeModel`]: Owns an `awful_aj` configuration and chat template
//!   and calls `awful_aj::api::ask`
//! - [`RetryAsk`]: Decorator that adds retry logic to any `AskAsync` implementation
//!
//! # Retry Strategy
//!
//! - Exponential backoff from a base delay, doubling per attempt
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use crate::error::ModelError;
use crate::utils::truncate_for_log;
use awful_aj::api::ask;
use awful_aj::{config, config::AwfulJadeConfig, config_dir, template, template::ChatTemplate};
use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Trait for async model interaction.
///
/// Implementors send a prompt to a language model and return its reply.
pub trait AskAsync {
    /// The type of response returned by the model.
    type Response;

    /// Send `text` to the model and receive a response.
    async fn ask(&self, text: &str) -> Result<Self::Response, ModelError>;
}

/// Upper bound of the random delay added to each backoff.
const JITTER_MS: u64 = 250;

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
///
/// Every [`ModelError`] is retried; the last one is returned once
/// `max_retries` retries have failed.
pub struct RetryAsk<T> {
    /// The underlying client to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Create a new retry wrapper around an existing [`AskAsync`] implementation.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let model = AwfulJadeModel::load(None, "harvest_summary").await?;
    /// let retrying = RetryAsk::new(model, 2, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync + fmt::Debug,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all, fields(max_retries = self.max_retries))]
    async fn ask(&self, text: &str) -> Result<Self::Response, ModelError> {
        let t0 = Instant::now();
        let mut failures = 0usize;

        loop {
            let err = match self.inner.ask(text).await {
                Ok(resp) => return Ok(resp),
                Err(e) => e,
            };
            failures += 1;

            if failures > self.max_retries {
                error!(
                    failures,
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    error = %err,
                    "Model call failed; retries exhausted"
                );
                return Err(err);
            }

            let delay = self.backoff(failures);
            warn!(failures, ?delay, error = %err, "Model call failed; backing off");
            sleep(delay).await;
        }
    }
}

impl<T> RetryAsk<T> {
    /// Delay before retry number `failures` (1-based): doubling from
    /// `base_delay`, capped at `max_delay`, plus up to 250 ms of jitter.
    fn backoff(&self, failures: usize) -> StdDuration {
        let exp = u32::try_from(failures.saturating_sub(1)).unwrap_or(u32::MAX);
        let factor = 2u32.checked_pow(exp).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        delay + StdDuration::from_millis(rng().random_range(0..=JITTER_MS))
    }
}

/// A language model reached through `awful_aj` with one chat template.
///
/// The template carries the system prompt; the text passed to
/// [`AskAsync::ask`] is the user turn.
pub struct AwfulJadeModel {
    config: AwfulJadeConfig,
    template: ChatTemplate,
    template_name: String,
}

impl fmt::Debug for AwfulJadeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwfulJadeModel")
            .field("template", &self.template_name)
            .finish()
    }
}

impl AwfulJadeModel {
    pub fn new(config: AwfulJadeConfig, template: ChatTemplate, template_name: impl Into<String>) -> Self {
        Self {
            config,
            template,
            template_name: template_name.into(),
        }
    }

    /// Load the client configuration and a named chat template.
    ///
    /// `config_path` defaults to `config.yaml` in the `awful_aj` config
    /// directory.
    #[instrument(level = "info", skip_all, fields(template = %template_name))]
    pub async fn load(config_path: Option<&str>, template_name: &str) -> Result<Self, ModelError> {
        let path = match config_path {
            Some(p) => p.to_string(),
            None => {
                let conf_file = config_dir()
                    .map_err(|e| ModelError::Config(e.to_string()))?
                    .join("config.yaml");
                conf_file
                    .to_str()
                    .ok_or_else(|| ModelError::Config("config path is not valid UTF-8".to_string()))?
                    .to_string()
            }
        };

        let config = config::load_config(&path).map_err(|e| ModelError::Config(e.to_string()))?;
        let template = template::load_template(template_name)
            .await
            .map_err(|e| ModelError::Template(e.to_string()))?;
        info!(config_path = %path, "Loaded model configuration and template");

        Ok(Self::new(config, template, template_name))
    }
}

impl AskAsync for AwfulJadeModel {
    type Response = String;

    #[instrument(level = "info", skip_all, fields(template = %self.template_name))]
    async fn ask(&self, text: &str) -> Result<Self::Response, ModelError> {
        let t0 = Instant::now();
        let res = ask(&self.config, text.to_string(), &self.template, None, None).await;
        let dt = t0.elapsed();

        match res {
            Ok(reply) => {
                debug!(
                    elapsed_ms = dt.as_millis() as u128,
                    reply = %truncate_for_log(&reply, 200),
                    "Model replied"
                );
                Ok(reply)
            }
            Err(e) => {
                warn!(elapsed_ms = dt.as_millis() as u128, error = %e, "API call failed");
                Err(ModelError::Call(e.to_string()))
            }
        }
    }
}

/// The model stack used by the pipeline: one template for fallback
/// extraction, one for summaries, both behind retries.
#[derive(Debug)]
pub struct ModelPair<M> {
    pub extract: M,
    pub summarize: M,
}

/// Load both templates and wrap each model in [`RetryAsk`].
#[instrument(level = "info", skip_all)]
pub async fn load_models(
    config_path: Option<&str>,
    extract_template: &str,
    summary_template: &str,
    retries: usize,
) -> Result<ModelPair<RetryAsk<AwfulJadeModel>>, ModelError> {
    let extract = AwfulJadeModel::load(config_path, extract_template).await?;
    let summarize = AwfulJadeModel::load(config_path, summary_template).await?;
    Ok(ModelPair {
        extract: RetryAsk::new(extract, retries, StdDuration::from_secs(1)),
        summarize: RetryAsk::new(summarize, retries, StdDuration::from_secs(1)),
    })
}
