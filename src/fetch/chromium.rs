//! Headless Chromium retrieval over the DevTools protocol (`chromiumoxide`).
//!
//! Each call launches its own browser process, renders one page and shuts
//! the process down again. [`BrowserSession`] owns the process and its CDP
//! handler task; it is closed explicitly on the normal path and from `Drop`
//! when the future is cancelled or a step fails early.

use super::RetrievalStrategy;
use crate::config::PipelineConfig;
use crate::error::FetchError;
use crate::models::StrategyKind;
use crate::rate::RateBudget;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone)]
pub struct ChromiumFetch {
    budget: Arc<RateBudget>,
    timeout: Duration,
    settle: Duration,
}

impl ChromiumFetch {
    pub fn new(budget: Arc<RateBudget>, timeout: Duration, settle: Duration) -> Self {
        Self {
            budget,
            timeout,
            settle,
        }
    }

    pub fn from_config(config: &PipelineConfig, budget: Arc<RateBudget>) -> Self {
        Self::new(budget, config.browser_timeout(), config.browser_settle())
    }
}

fn browser_err(e: impl std::fmt::Display) -> FetchError {
    FetchError::Browser(e.to_string())
}

/// A running browser plus the task pumping its CDP event stream.
struct BrowserSession {
    browser: Option<Browser>,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    async fn launch(user_agent: &str, request_timeout: Duration) -> Result<Self, FetchError> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(request_timeout)
            .args(vec![
                "--disable-dev-shm-usage".to_string(),
                "--disable-gpu".to_string(),
                format!("--user-agent={user_agent}"),
            ])
            .build()
            .map_err(browser_err)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(browser_err)?;
        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        Ok(Self {
            browser: Some(browser),
            handler,
        })
    }
}

/// A launched rendering context that must be shut down after use.
trait PageRenderer {
    async fn render(&self, url: &str, settle: Duration) -> Result<String, FetchError>;
    async fn close(self);
}

/// Render `url` within `limit`, then close `session` on every outcome.
async fn render_and_close<S: PageRenderer>(
    session: S,
    url: &str,
    settle: Duration,
    limit: Duration,
) -> Result<String, FetchError> {
    let rendered = timeout(limit, session.render(url, settle)).await;
    session.close().await;
    rendered.unwrap_or(Err(FetchError::Timeout(limit)))
}

impl PageRenderer for BrowserSession {
    async fn render(&self, url: &str, settle: Duration) -> Result<String, FetchError> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| FetchError::Browser("browser already closed".to_string()))?;

        let page = browser.new_page("about:blank").await.map_err(browser_err)?;
        page.goto(url).await.map_err(browser_err)?;
        page.wait_for_navigation().await.map_err(browser_err)?;
        sleep(settle).await;
        let html = page.content().await.map_err(browser_err)?;

        if let Err(e) = page.close().await {
            debug!(error = %e, "Page close failed");
        }
        Ok(html)
    }

    async fn close(mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                debug!(error = %e, "Browser close failed");
            }
            if let Err(e) = browser.wait().await {
                debug!(error = %e, "Browser wait failed");
            }
        }
        self.handler.abort();
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
        if let Some(mut browser) = self.browser.take() {
            warn!("Browser session dropped without close; shutting it down in background");
            if let Ok(rt) = tokio::runtime::Handle::try_current() {
                rt.spawn(async move {
                    let _ = browser.close().await;
                    let _ = browser.wait().await;
                });
            }
        }
    }
}

#[async_trait]
impl RetrievalStrategy for ChromiumFetch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Chromium
    }

    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.budget.wait_turn().await;
        let user_agent = self.budget.user_agent();

        let session = timeout(self.timeout, BrowserSession::launch(user_agent, self.timeout))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;

        render_and_close(session, url, self.settle, self.timeout + self.settle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_from_config_uses_browser_timings() {
        let config = PipelineConfig {
            browser_timeout_secs: 7,
            browser_settle_ms: 250,
            ..PipelineConfig::default()
        };
        let fetch = ChromiumFetch::from_config(&config, Arc::new(RateBudget::default()));
        assert_eq!(fetch.kind(), StrategyKind::Chromium);
        assert_eq!(fetch.timeout, Duration::from_secs(7));
        assert_eq!(fetch.settle, Duration::from_millis(250));
    }

    #[test]
    fn test_browser_errors_are_wrapped() {
        let err = browser_err("launch failed");
        assert_eq!(err.to_string(), "browser error: launch failed");
    }

    struct StubSession {
        outcome: Result<&'static str, &'static str>,
        delay: Duration,
        closed: Arc<AtomicBool>,
    }

    impl StubSession {
        fn new(outcome: Result<&'static str, &'static str>, delay: Duration) -> (Self, Arc<AtomicBool>) {
            let closed = Arc::new(AtomicBool::new(false));
            let session = Self {
                outcome,
                delay,
                closed: Arc::clone(&closed),
            };
            (session, closed)
        }
    }

    impl PageRenderer for StubSession {
        async fn render(&self, _url: &str, _settle: Duration) -> Result<String, FetchError> {
            sleep(self.delay).await;
            self.outcome.map(str::to_string).map_err(browser_err)
        }

        async fn close(self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_session_closed_after_render() {
        let (session, closed) = StubSession::new(Ok("<html>ok</html>"), Duration::ZERO);
        let html = render_and_close(session, "https://site.test/", Duration::ZERO, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(html, "<html>ok</html>");
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_session_closed_when_render_fails() {
        let (session, closed) = StubSession::new(Err("navigation failed"), Duration::ZERO);
        let err = render_and_close(session, "https://site.test/", Duration::ZERO, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Browser(_)));
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_session_closed_when_render_times_out() {
        let (session, closed) = StubSession::new(Ok("late"), Duration::from_secs(30));
        let err = render_and_close(session, "https://site.test/", Duration::ZERO, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout(d) if d == Duration::from_millis(20)));
        assert!(closed.load(Ordering::SeqCst));
    }
}
