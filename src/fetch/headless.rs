//! Headless Chrome retrieval through the synchronous `headless_chrome` crate.
//!
//! The driver blocks, so each render runs on the blocking pool. The
//! `Browser` value owns the Chrome process; it is dropped on every return
//! path of [`render_blocking`], which terminates the process. A fetch that
//! runs over budget still waits for that drop before reporting the timeout.

use super::RetrievalStrategy;
use crate::config::PipelineConfig;
use crate::error::FetchError;
use crate::models::StrategyKind;
use crate::rate::RateBudget;
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone)]
pub struct HeadlessChromeFetch {
    budget: Arc<RateBudget>,
    timeout: Duration,
    settle: Duration,
}

impl HeadlessChromeFetch {
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

fn render_blocking(
    url: &str,
    user_agent: &str,
    page_timeout: Duration,
    settle: Duration,
) -> Result<String, FetchError> {
    let ua_arg = format!("--user-agent={user_agent}");
    let options = LaunchOptions::default_builder()
        .headless(true)
        .sandbox(false)
        .idle_browser_timeout(page_timeout + settle)
        .args(vec![
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-gpu"),
            OsStr::new("--no-first-run"),
            OsStr::new(&ua_arg),
        ])
        .build()
        .map_err(browser_err)?;

    let browser = Browser::new(options).map_err(browser_err)?;
    let tab = browser.new_tab().map_err(browser_err)?;
    tab.set_default_timeout(page_timeout);
    tab.set_user_agent(user_agent, None, None)
        .map_err(browser_err)?;
    tab.navigate_to(url).map_err(browser_err)?;
    tab.wait_until_navigated().map_err(browser_err)?;
    std::thread::sleep(settle);
    let html = tab.get_content().map_err(browser_err)?;

    if let Err(e) = tab.close(true) {
        debug!(error = %e, "Tab close failed");
    }
    Ok(html)
}

#[async_trait]
impl RetrievalStrategy for HeadlessChromeFetch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Headless
    }

    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.budget.wait_turn().await;
        let user_agent = self.budget.user_agent();
        let (page_timeout, settle) = (self.timeout, self.settle);
        let target = url.to_string();

        // launch + navigation + settle, with headroom for process start-up
        let budget = page_timeout * 2 + settle;
        run_blocking(budget, move || {
            render_blocking(&target, user_agent, page_timeout, settle)
        })
        .await
    }
}

/// Run `render` on the blocking pool and wait at most `budget` for it.
///
/// On timeout the task is still awaited: `render` owns the browser, and the
/// call must not return while that process is alive.
async fn run_blocking<F>(budget: Duration, render: F) -> Result<String, FetchError>
where
    F: FnOnce() -> Result<String, FetchError> + Send + 'static,
{
    let mut task = tokio::task::spawn_blocking(render);
    match timeout(budget, &mut task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(browser_err(join)),
        Err(_) => {
            warn!(budget_ms = budget.as_millis() as u64, "Render over budget; waiting for browser teardown");
            if let Err(join) = task.await {
                debug!(error = %join, "Render task ended abnormally");
            }
            Err(FetchError::Timeout(budget))
        }
    }
}
