//! Error taxonomy for the harvesting pipeline.
//!
//! None of these cross the [`crate::pipeline::Pipeline::run`] boundary: each
//! is recovered by the stage that produces it and, at worst, becomes a line
//! of `feedback` in the returned [`crate::models::PipelineResult`].

use crate::models::StrategyKind;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single retrieval strategy.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("proxy error: {0}")]
    Proxy(String),

    #[error("empty response body")]
    EmptyBody,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Every strategy in a chain failed.
#[derive(Debug, Error)]
#[error("all retrieval strategies failed ({}): {}", .attempts.len(), describe_last(.attempts))]
pub struct ChainError {
    /// Attempts in the order they were made.
    pub attempts: Vec<(StrategyKind, FetchError)>,
}

impl ChainError {
    /// The last attempt's strategy and error, if any strategy was attempted.
    pub fn last(&self) -> Option<&(StrategyKind, FetchError)> {
        self.attempts.last()
    }

    /// Human readable form of the last attempt.
    pub fn last_message(&self) -> String {
        describe_last(&self.attempts)
    }
}

fn describe_last(attempts: &[(StrategyKind, FetchError)]) -> String {
    match attempts.last() {
        Some((kind, err)) => format!("{kind}: {err}"),
        None => "no retrieval strategy enabled".to_string(),
    }
}

/// Failure talking to the language model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model call failed: {0}")]
    Call(String),

    #[error("model configuration error: {0}")]
    Config(String),

    #[error("chat template error: {0}")]
    Template(String),
}

/// A model reply that no parsing tier could turn into articles.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelParseError {
    #[error("no JSON article array found in model response")]
    Unparseable,
}

/// The model fallback produced nothing usable.
#[derive(Debug, Error)]
pub enum FallbackError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Parse(#[from] ModelParseError),
}

/// A document that could not be processed structurally.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid base URL {url}: {source}")]
    BaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}
