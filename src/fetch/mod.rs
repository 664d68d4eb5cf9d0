//! Page retrieval strategies and the fallback chain that drives them.
//!
//! Every way of getting a page's HTML implements [`RetrievalStrategy`]. The
//! [`chain::RetrievalChain`] holds them as an ordered list and folds over
//! the attempts, returning the first success.
//!
//! # Strategies
//!
//! | Kind | Module | Mechanism | Timeout |
//! |------|--------|-----------|---------|
//! | `proxy` | [`proxy`] | Third-party scraping API | 60s |
//! | `direct` | [`direct`] | `reqwest` GET, 3 attempts, linear backoff | 10s per attempt |
//! | `chromium` | `chromium` | `chromiumoxide` headless Chromium (feature `chromium`) | 15s |
//! | `headless` | `headless` | `headless_chrome` (feature `headless-chrome`) | 15s |
//!
//! Browser strategies launch a fresh browser per call and tear it down on
//! every exit path.

use crate::error::FetchError;
use crate::models::StrategyKind;
use async_trait::async_trait;
use std::time::Duration;

pub mod chain;
pub mod direct;
pub mod proxy;

#[cfg(feature = "chromium")]
pub mod chromium;
#[cfg(feature = "headless-chrome")]
pub mod headless;

pub use chain::RetrievalChain;
pub use direct::DirectFetch;
pub use proxy::ProxyFetch;

#[cfg(feature = "chromium")]
pub use chromium::ChromiumFetch;
#[cfg(feature = "headless-chrome")]
pub use headless::HeadlessChromeFetch;

/// One way of obtaining a page's HTML.
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    /// Which strategy this is.
    fn kind(&self) -> StrategyKind;

    /// Retrieve the HTML behind `url`.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Map a `reqwest` failure, keeping timeouts distinguishable.
pub(crate) fn classify_reqwest(e: reqwest::Error, timeout: Duration) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(timeout)
    } else {
        FetchError::Http(e)
    }
}
