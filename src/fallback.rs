//! Model-assisted extraction for pages the heuristics could not read.
//!
//! The model receives a bounded excerpt of the first page's HTML and is asked
//! for a JSON array of articles. Its reply is parsed in three tiers:
//!
//! 1. the whole reply as JSON (a bare array, or an object with `articles`)
//! 2. the array inside a fenced code block
//! 3. the first array literal found anywhere in the text
//!
//! Whatever survives parsing is held to the same rules as heuristic results:
//! title checks and run-scoped dedup through the shared
//! [`ArticleExtractor`], and a body longer than 30 characters.

use crate::api::AskAsync;
use crate::error::{FallbackError, ModelParseError};
use crate::extract::ArticleExtractor;
use crate::extract::content::clean_date;
use crate::extract::selectors::MIN_CONTENT_CHARS;
use crate::models::Article;
use crate::utils::{char_len, normalize_text, truncate_chars, truncate_for_log};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

static FENCED_ARRAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(\[.*?\])\s*```").unwrap());

/// One article as the model describes it. Every field is optional; `null`
/// and non-string scalars are tolerated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RawArticle {
    #[serde(deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(deserialize_with = "lenient_string")]
    pub url: String,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub date: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub content: String,
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(scalar_text(Value::deserialize(d)?).unwrap_or_default())
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(scalar_text(Value::deserialize(d)?).filter(|s| !s.trim().is_empty()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Reply {
    List(Vec<Value>),
    Wrapped { articles: Vec<Value> },
}

/// Keep the object elements of a candidate array. An array holding values
/// but no objects at all (`[1]`, `["a"]`) is not an article list.
fn articles_from(values: Vec<Value>) -> Option<Vec<RawArticle>> {
    if !values.is_empty() && !values.iter().any(Value::is_object) {
        return None;
    }
    let total = values.len();
    let list: Vec<RawArticle> = values
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect();
    if list.len() < total {
        debug!(dropped = total - list.len(), "Skipped malformed entries in model reply");
    }
    Some(list)
}

/// Parse a model reply into raw articles.
///
/// Never panics; a reply that no tier understands is
/// [`ModelParseError::Unparseable`].
pub fn parse_model_articles(reply: &str) -> Result<Vec<RawArticle>, ModelParseError> {
    let text = reply.trim();

    if let Ok(parsed) = serde_json::from_str::<Reply>(text) {
        let values = match parsed {
            Reply::List(list) => list,
            Reply::Wrapped { articles } => articles,
        };
        if let Some(list) = articles_from(values) {
            return Ok(list);
        }
    }

    if let Some(caps) = FENCED_ARRAY.captures(text) {
        if let Some(list) = serde_json::from_str::<Vec<Value>>(&caps[1])
            .ok()
            .and_then(articles_from)
        {
            debug!("Parsed model reply from fenced block");
            return Ok(list);
        }
    }

    for (idx, _) in text.match_indices('[') {
        let mut stream = serde_json::Deserializer::from_str(&text[idx..]).into_iter::<Vec<Value>>();
        if let Some(list) = stream.next().and_then(Result::ok).and_then(articles_from) {
            debug!(offset = idx, "Parsed model reply from embedded array");
            return Ok(list);
        }
    }

    Err(ModelParseError::Unparseable)
}

#[derive(Debug, Clone)]
pub struct AiFallbackExtractor {
    excerpt_chars: usize,
}

impl Default for AiFallbackExtractor {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl AiFallbackExtractor {
    pub fn new(excerpt_chars: usize) -> Self {
        Self { excerpt_chars }
    }

    pub fn build_prompt(&self, html: &str) -> String {
        format!(
            "Extract every news or blog article listed in the HTML below.\n\
             Reply with a JSON array only. Each element must be an object with the keys \
             \"title\", \"url\", \"date\" and \"content\". Use null when the date is unknown \
             and put the article's visible text or teaser in \"content\". Do not add commentary.\n\n\
             HTML:\n{}",
            truncate_chars(html, self.excerpt_chars)
        )
    }

    /// Ask `model` for the articles on a page and admit the usable ones.
    #[instrument(level = "info", skip_all, fields(url = %page_url, limit = limit))]
    pub async fn extract<M>(
        &self,
        model: &M,
        html: &str,
        page_url: &Url,
        extractor: &mut ArticleExtractor,
        limit: usize,
    ) -> Result<Vec<Article>, FallbackError>
    where
        M: AskAsync<Response = String>,
    {
        let t0 = Instant::now();
        let reply = model.ask(&self.build_prompt(html)).await?;
        let raw = parse_model_articles(&reply).inspect_err(|_| {
            warn!(reply = %truncate_for_log(&reply, 300), "Model reply held no article array");
        })?;

        let proposed = raw.len();
        let articles: Vec<Article> = raw
            .into_iter()
            .filter_map(|r| admit(r, page_url, extractor))
            .take(limit)
            .collect();

        info!(
            proposed,
            accepted = articles.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Model fallback finished"
        );
        Ok(articles)
    }
}

fn admit(raw: RawArticle, page_url: &Url, extractor: &mut ArticleExtractor) -> Option<Article> {
    let title = normalize_text(&raw.title);
    let content = normalize_text(&raw.content);

    if char_len(&content) <= MIN_CONTENT_CHARS {
        debug!(%title, "Fallback article too thin");
        return None;
    }
    if let Err(reason) = extractor.admit_title(&title) {
        debug!(%title, ?reason, "Fallback article title rejected");
        return None;
    }

    let url = Some(raw.url.trim())
        .filter(|u| !u.is_empty())
        .and_then(|u| page_url.join(u).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|u| u.to_string())
        .unwrap_or_else(|| page_url.to_string());

    Some(Article {
        title,
        url,
        content,
        date: raw.date.as_deref().and_then(clean_date),
        resume: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::ScriptedModel;

    const ARRAY: &str = r#"[{"title":"Harbour reopens after storm","url":"/news/harbour","date":"2024-02-01","content":"The harbour reopened on Thursday after a week of repairs to the docks."}]"#;

    fn expected() -> Vec<RawArticle> {
        vec![RawArticle {
            title: "Harbour reopens after storm".to_string(),
            url: "/news/harbour".to_string(),
            date: Some("2024-02-01".to_string()),
            content: "The harbour reopened on Thursday after a week of repairs to the docks.".to_string(),
        }]
    }

    #[test]
    fn test_bare_fenced_and_embedded_forms_agree() {
        let bare = parse_model_articles(ARRAY).unwrap();
        let fenced = parse_model_articles(&format!("```json\n{ARRAY}\n```")).unwrap();
        let embedded = parse_model_articles(&format!(
            "Sure! Here are the articles I found: {ARRAY} Let me know if you need more."
        ))
        .unwrap();
        assert_eq!(bare, expected());
        assert_eq!(fenced, bare);
        assert_eq!(embedded, bare);
    }

    #[test]
    fn test_wrapped_object_form() {
        let reply = format!(r#"{{"articles": {ARRAY}}}"#);
        assert_eq!(parse_model_articles(&reply).unwrap(), expected());
    }

    #[test]
    fn test_embedded_array_skips_earlier_brackets() {
        let reply = format!("Found [1] result in the page: {ARRAY}");
        assert_eq!(parse_model_articles(&reply).unwrap(), expected());
    }

    #[test]
    fn test_null_and_numeric_fields_are_tolerated() {
        let reply = r#"Here you go:
[
  {"title": "Harbour reopens after storm", "url": null, "date": null, "content": "The harbour reopened on Thursday after a week of repairs."},
  {"title": "Second story with a real link", "url": "/b", "date": 2024, "content": "Another body that is comfortably long enough to keep."},
  "stray string",
  {"title": 42, "url": ["not", "a", "string"], "content": null}
]"#;
        let list = parse_model_articles(reply).unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].url, "");
        assert_eq!(list[0].date, None);
        assert_eq!(list[1].url, "/b");
        assert_eq!(list[1].date.as_deref(), Some("2024"));
        assert_eq!(list[2].title, "42");
        assert_eq!(list[2].url, "");
        assert_eq!(list[2].content, "");
    }

    #[test]
    fn test_empty_array_means_no_articles() {
        assert_eq!(parse_model_articles("[]").unwrap(), Vec::new());
    }

    #[tokio::test]
    async fn test_null_url_falls_back_to_page_url() {
        let reply = r#"[{"title":"Harbour reopens after storm","url":null,"date":null,"content":"The harbour reopened on Thursday after a week of repairs to the docks."}]"#;
        let model = ScriptedModel::new([Ok(reply)]);
        let page = Url::parse("https://site.test/listing").unwrap();
        let articles = AiFallbackExtractor::default()
            .extract(&model, "<html></html>", &page, &mut ArticleExtractor::new(), 10)
            .await
            .unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url, "https://site.test/listing");
        assert_eq!(articles[0].date, None);
    }

    #[test]
    fn test_unparseable_reply() {
        assert_eq!(
            parse_model_articles("I could not find any articles, sorry."),
            Err(ModelParseError::Unparseable)
        );
        assert_eq!(parse_model_articles(""), Err(ModelParseError::Unparseable));
    }

    #[test]
    fn test_prompt_excerpt_is_bounded() {
        let fallback = AiFallbackExtractor::new(50);
        let prompt = fallback.build_prompt(&"x".repeat(500));
        assert!(prompt.ends_with(&"x".repeat(50)));
        assert!(!prompt.contains(&"x".repeat(51)));
    }

    #[tokio::test]
    async fn test_extract_applies_acceptance_rules() {
        let reply = r#"```json
[
  {"title": "Harbour reopens after storm", "url": "/news/harbour", "date": "2024-02-01", "content": "The harbour reopened on Thursday after a week of repairs to the docks."},
  {"title": "Menu", "url": "/", "content": "Home, About, Contact, and every other navigation entry."},
  {"title": "A headline with no body", "url": "/x", "content": "tiny"},
  {"title": "harbour REOPENS after storm", "url": "/dup", "content": "Duplicate of the first story with different casing entirely."}
]
```"#;
        let model = ScriptedModel::new([Ok(reply)]);
        let page = Url::parse("https://site.test/listing").unwrap();
        let mut extractor = ArticleExtractor::new();

        let articles = AiFallbackExtractor::default()
            .extract(&model, "<html></html>", &page, &mut extractor, 10)
            .await
            .unwrap();

        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url, "https://site.test/news/harbour");
        assert_eq!(articles[0].date.as_deref(), Some("2024-02-01"));
        assert!(extractor.has_seen("Harbour reopens after storm"));
    }

    #[tokio::test]
    async fn test_extract_reports_model_failure() {
        let model = ScriptedModel::new([Err("upstream 500")]);
        let page = Url::parse("https://site.test/").unwrap();
        let err = AiFallbackExtractor::default()
            .extract(&model, "<html></html>", &page, &mut ArticleExtractor::new(), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, FallbackError::Model(_)));
    }

    #[tokio::test]
    async fn test_extract_reports_unparseable_reply() {
        let model = ScriptedModel::new([Ok("no JSON here")]);
        let page = Url::parse("https://site.test/").unwrap();
        let err = AiFallbackExtractor::default()
            .extract(&model, "<html></html>", &page, &mut ArticleExtractor::new(), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, FallbackError::Parse(ModelParseError::Unparseable)));
    }
}
