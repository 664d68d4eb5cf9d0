//! Retrieval through a third-party scraping API.
//!
//! The API takes the target as a `url` query parameter alongside an access
//! token and answers either with the raw page or with a JSON envelope whose
//! `html` field carries it.

use super::{RetrievalStrategy, classify_reqwest};
use crate::config::PipelineConfig;
use crate::error::FetchError;
use crate::models::StrategyKind;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument};
use urlencoding::encode;

#[derive(Debug, Clone)]
pub struct ProxyFetch {
    client: Client,
    endpoint: String,
    token: Option<String>,
    params: BTreeMap<String, String>,
    timeout: Duration,
}

impl ProxyFetch {
    pub fn new(
        endpoint: impl Into<String>,
        token: Option<String>,
        params: BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token,
            params,
            timeout,
        })
    }

    /// Build from pipeline settings. A token that is too short to be real is
    /// treated as absent.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, FetchError> {
        Self::new(
            config.proxy_endpoint.clone(),
            config.usable_proxy_token().map(str::to_string),
            config.proxy_params.clone(),
            config.proxy_timeout(),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    /// Full API request URL for `target`.
    fn request_url(&self, token: &str, target: &str) -> String {
        let sep = if self.endpoint.contains('?') { '&' } else { '?' };
        let mut out = format!(
            "{}{}token={}&url={}",
            self.endpoint,
            sep,
            encode(token),
            encode(target)
        );
        for (k, v) in &self.params {
            out.push('&');
            out.push_str(&encode(k));
            out.push('=');
            out.push_str(&encode(v));
        }
        out
    }
}

/// Pull the page out of an API response body.
pub(crate) fn decode_body(content_type: Option<&str>, body: String) -> Result<String, FetchError> {
    let is_json = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false);
    if !is_json {
        return Ok(body);
    }

    let value: Value = serde_json::from_str(&body)
        .map_err(|e| FetchError::Proxy(format!("malformed JSON envelope: {e}")))?;
    value
        .get("html")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| FetchError::Proxy("JSON envelope without an `html` field".to_string()))
}

#[async_trait]
impl RetrievalStrategy for ProxyFetch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Proxy
    }

    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let token = self
            .token
            .as_deref()
            .ok_or(FetchError::NotConfigured("proxy token"))?;

        let resp = self
            .client
            .get(self.request_url(token, url))
            .send()
            .await
            .map_err(|e| classify_reqwest(e, self.timeout))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp
            .text()
            .await
            .map_err(|e| classify_reqwest(e, self.timeout))?;
        debug!(bytes = body.len(), content_type = ?content_type, "Proxy responded");

        decode_body(content_type.as_deref(), body)
    }
}
