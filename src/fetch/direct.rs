//! Plain HTTP retrieval with identity rotation, pacing and linear backoff.

use super::{RetrievalStrategy, classify_reqwest};
use crate::config::PipelineConfig;
use crate::error::FetchError;
use crate::models::StrategyKind;
use crate::rate::RateBudget;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone)]
pub struct DirectFetch {
    client: Client,
    budget: Arc<RateBudget>,
    attempts: u32,
    backoff: Duration,
    timeout: Duration,
}

impl DirectFetch {
    pub fn new(
        budget: Arc<RateBudget>,
        attempts: u32,
        backoff: Duration,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            budget,
            attempts: attempts.max(1),
            backoff,
            timeout,
        })
    }

    pub fn from_config(config: &PipelineConfig, budget: Arc<RateBudget>) -> Result<Self, FetchError> {
        Self::new(
            budget,
            config.direct_retries,
            Duration::from_millis(config.direct_backoff_ms),
            config.direct_timeout(),
        )
    }

    async fn get_once(&self, url: &str) -> Result<String, FetchError> {
        self.budget.wait_turn().await;
        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, self.budget.user_agent())
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9,fr;q=0.8")
            .send()
            .await
            .map_err(|e| classify_reqwest(e, self.timeout))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        resp.text()
            .await
            .map_err(|e| classify_reqwest(e, self.timeout))
    }
}

#[async_trait]
impl RetrievalStrategy for DirectFetch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Direct
    }

    /// Up to `attempts` GETs; attempt `n` that fails waits `backoff * n`
    /// before the next one.
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut last_err = FetchError::EmptyBody;

        for attempt in 1..=self.attempts {
            match self.get_once(url).await {
                Ok(body) => {
                    debug!(attempt, bytes = body.len(), "Direct fetch succeeded");
                    return Ok(body);
                }
                Err(e) => {
                    warn!(attempt, max = self.attempts, error = %e, "Direct fetch attempt failed");
                    last_err = e;
                    if attempt < self.attempts {
                        sleep(self.backoff * attempt).await;
                    }
                }
            }
        }

        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::test_server::{Canned, serve};
    use std::time::Instant;

    fn direct(attempts: u32) -> DirectFetch {
        DirectFetch::new(
            Arc::new(RateBudget::new(Duration::from_millis(1))),
            attempts,
            Duration::from_millis(20),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let (base, mut requests) = serve(vec![
            Canned::html(500, "oops"),
            Canned::html(503, "busy"),
            Canned::html(200, "<html>finally</html>"),
        ])
        .await;

        let start = Instant::now();
        let html = direct(3).fetch(&format!("{base}/news")).await.unwrap();
        assert_eq!(html, "<html>finally</html>");
        // backoff of 20ms then 40ms
        assert!(start.elapsed() >= Duration::from_millis(60));

        for _ in 0..3 {
            let line = requests.recv().await.unwrap();
            assert!(line.starts_with("GET /news"));
        }
    }

    #[tokio::test]
    async fn test_gives_up_after_attempts() {
        let (base, _requests) = serve(vec![
            Canned::html(500, "a"),
            Canned::html(502, "b"),
        ])
        .await;
        let err = direct(2).fetch(&format!("{base}/")).await.unwrap_err();
        assert!(matches!(err, FetchError::Status(502)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_http_error() {
        // nothing listens on the discard port
        let err = direct(1).fetch("http://127.0.0.1:9/").await.unwrap_err();
        assert!(matches!(err, FetchError::Http(_)));
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        assert_eq!(direct(0).attempts, 1);
    }
}
