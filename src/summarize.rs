//! Short model-written summaries for extracted articles.
//!
//! Summarization never fails the run. Each article that cannot be summarized
//! gets a placeholder `resume` starting with
//! [`crate::models::SUMMARY_UNAVAILABLE`] that explains why.

use crate::api::AskAsync;
use crate::models::Article;
use crate::utils::{char_len, truncate_chars, truncate_for_log};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

pub const INSUFFICIENT_CONTENT: &str = "summary unavailable (insufficient content)";
pub const TECHNICAL_ERROR: &str = "summary unavailable (technical error)";
pub const LIMIT_REACHED: &str = "summary unavailable (processing limit reached)";
pub const INVALID_RESPONSE: &str = "summary unavailable (invalid AI response)";
pub const NOT_CONFIGURED: &str = "summary unavailable (AI service not configured)";

/// Content shorter than this is not sent to the model.
const MIN_CONTENT_CHARS: usize = 50;
/// Characters of content included in a prompt.
const PROMPT_CONTENT_CHARS: usize = 800;
/// Cleaned replies this short or shorter are rejected.
const MIN_SUMMARY_CHARS: usize = 10;
/// Longer summaries are cut and given an ellipsis.
const MAX_SUMMARY_CHARS: usize = 350;

static LEAD_IN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(here is a summary[^:]*:|here's a summary[^:]*:|summary\s*:|voici un résumé[^:]*:|résumé\s*:)\s*",
    )
    .unwrap()
});
static TOPIC_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(this text is about|this article is about|the article discusses|it is about|ce texte parle de|il s'agit de|l'article traite de)\s*",
    )
    .unwrap()
});

/// Strip boilerplate openings from a model reply.
pub fn clean_summary(reply: &str) -> String {
    let s = LEAD_IN.replace(reply.trim(), "");
    let s = TOPIC_PHRASE.replace(s.trim(), "");
    s.trim().to_string()
}

/// Cut a cleaned summary to the display length.
pub fn clip_summary(summary: &str) -> String {
    if char_len(summary) > MAX_SUMMARY_CHARS {
        format!("{}...", truncate_chars(summary, MAX_SUMMARY_CHARS))
    } else {
        summary.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct AiSummarizer {
    max_summaries: usize,
    pacing: Duration,
}

impl AiSummarizer {
    pub fn new(max_summaries: usize, pacing: Duration) -> Self {
        Self {
            max_summaries,
            pacing,
        }
    }

    pub fn build_prompt(article: &Article) -> String {
        format!(
            "Summarize the following article in 2 to 3 sentences. Start directly with the facts \
             and do not open with phrases such as \"This text is about\" or \"Here is a summary\".\n\n\
             Title: {}\n\n{}",
            article.title,
            truncate_chars(&article.content, PROMPT_CONTENT_CHARS)
        )
    }

    /// Attach a `resume` to every article lacking one.
    ///
    /// The first `max_summaries` articles are sent to `model` (one call at a
    /// time, `pacing` apart); the rest get [`LIMIT_REACHED`]. Without a model
    /// every article gets [`NOT_CONFIGURED`].
    #[instrument(level = "info", skip_all, fields(articles = articles.len(), max = self.max_summaries))]
    pub async fn summarize<M>(&self, model: Option<&M>, articles: &mut [Article])
    where
        M: AskAsync<Response = String>,
    {
        let Some(model) = model else {
            for article in articles.iter_mut().filter(|a| a.resume.is_none()) {
                article.resume = Some(NOT_CONFIGURED.to_string());
            }
            info!("No model configured; summaries skipped");
            return;
        };

        let mut calls = 0usize;
        for (idx, article) in articles.iter_mut().enumerate() {
            if article.resume.is_some() {
                continue;
            }
            if idx >= self.max_summaries {
                article.resume = Some(LIMIT_REACHED.to_string());
                continue;
            }
            if char_len(&article.content) < MIN_CONTENT_CHARS {
                article.resume = Some(INSUFFICIENT_CONTENT.to_string());
                continue;
            }

            if calls > 0 {
                sleep(self.pacing).await;
            }
            calls += 1;
            article.resume = Some(self.summarize_one(model, article).await);
        }

        info!(calls, "Summaries attached");
    }

    async fn summarize_one<M>(&self, model: &M, article: &Article) -> String
    where
        M: AskAsync<Response = String>,
    {
        match model.ask(&Self::build_prompt(article)).await {
            Ok(reply) => {
                let cleaned = clean_summary(&reply);
                if char_len(&cleaned) > MIN_SUMMARY_CHARS {
                    clip_summary(&cleaned)
                } else {
                    debug!(title = %article.title, reply = %truncate_for_log(&reply, 80), "Summary too short");
                    INVALID_RESPONSE.to_string()
                }
            }
            Err(e) => {
                warn!(title = %article.title, error = %e, "Summary call failed");
                TECHNICAL_ERROR.to_string()
            }
        }
    }
}
