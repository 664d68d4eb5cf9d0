//! Ordered fallback across retrieval strategies.

use super::RetrievalStrategy;
use crate::error::{ChainError, FetchError};
use crate::models::{Fetched, StrategyKind};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Ordered list of strategies. A fetch walks a requested order and stops at
/// the first strategy that returns a non-empty document.
#[derive(Clone, Default)]
pub struct RetrievalChain {
    strategies: Vec<Arc<dyn RetrievalStrategy>>,
}

impl std::fmt::Debug for RetrievalChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalChain")
            .field("strategies", &self.kinds())
            .finish()
    }
}

impl RetrievalChain {
    pub fn new(strategies: Vec<Arc<dyn RetrievalStrategy>>) -> Self {
        Self { strategies }
    }

    /// Kinds available, in registration order.
    pub fn kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    fn get(&self, kind: StrategyKind) -> Option<&Arc<dyn RetrievalStrategy>> {
        self.strategies.iter().find(|s| s.kind() == kind)
    }

    /// Try each strategy in `order` until one yields HTML.
    ///
    /// Kinds in `order` without a registered strategy are skipped. Fails only
    /// when every attempted strategy failed.
    #[instrument(level = "info", skip_all, fields(%url))]
    pub async fn fetch(&self, url: &str, order: &[StrategyKind]) -> Result<Fetched, ChainError> {
        self.attempt(url, order).await.inspect_err(|err| {
            error!(error = %err, "All retrieval strategies failed");
        })
    }

    /// Like [`RetrievalChain::fetch`] but never launches a browser. Used for
    /// per-article secondary fetches, where exhaustion is routine.
    #[instrument(level = "debug", skip_all, fields(%url))]
    pub async fn fetch_without_browsers(
        &self,
        url: &str,
        order: &[StrategyKind],
    ) -> Result<Fetched, ChainError> {
        let order: Vec<StrategyKind> = order.iter().copied().filter(|k| !k.is_browser()).collect();
        self.attempt(url, &order).await.inspect_err(|err| {
            debug!(error = %err, "No non-browser strategy could retrieve the page");
        })
    }

    async fn attempt(&self, url: &str, order: &[StrategyKind]) -> Result<Fetched, ChainError> {
        let mut attempts: Vec<(StrategyKind, FetchError)> = Vec::new();

        for &kind in order {
            let Some(strategy) = self.get(kind) else {
                debug!(strategy = %kind, "Strategy not available; skipping");
                continue;
            };

            let t0 = Instant::now();
            match strategy.fetch(url).await {
                Ok(html) if !html.trim().is_empty() => {
                    info!(
                        strategy = %kind,
                        bytes = html.len(),
                        elapsed_ms = t0.elapsed().as_millis() as u64,
                        "Retrieved page"
                    );
                    return Ok(Fetched { html, strategy: kind });
                }
                Ok(_) => {
                    warn!(strategy = %kind, "Strategy returned an empty document");
                    attempts.push((kind, FetchError::EmptyBody));
                }
                Err(e) => {
                    warn!(
                        strategy = %kind,
                        elapsed_ms = t0.elapsed().as_millis() as u64,
                        error = %e,
                        "Strategy failed; trying next"
                    );
                    attempts.push((kind, e));
                }
            }
        }

        Err(ChainError { attempts })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Strategy double: serves canned pages by URL, or always fails.
    pub(crate) struct FakeStrategy {
        pub kind: StrategyKind,
        pub pages: HashMap<String, String>,
        pub fail_with: Option<u16>,
        pub calls: AtomicUsize,
        pub seen: Mutex<Vec<String>>,
    }

    impl FakeStrategy {
        pub fn serving<U, H>(kind: StrategyKind, pages: &[(U, H)]) -> Self
        where
            U: AsRef<str>,
            H: AsRef<str>,
        {
            Self {
                pages: pages
                    .iter()
                    .map(|(u, h)| (u.as_ref().to_string(), h.as_ref().to_string()))
                    .collect(),
                ..Self::empty(kind)
            }
        }

        /// Serves nothing: every URL is a 404.
        pub fn empty(kind: StrategyKind) -> Self {
            Self {
                kind,
                pages: HashMap::new(),
                fail_with: None,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(kind: StrategyKind, status: u16) -> Self {
            Self {
                fail_with: Some(status),
                ..Self::empty(kind)
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RetrievalStrategy for FakeStrategy {
        fn kind(&self) -> StrategyKind {
            self.kind
        }

        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(url.to_string());
            if let Some(status) = self.fail_with {
                return Err(FetchError::Status(status));
            }
            self.pages.get(url).cloned().ok_or(FetchError::Status(404))
        }
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let proxy = Arc::new(FakeStrategy::failing(StrategyKind::Proxy, 502));
        let direct = Arc::new(FakeStrategy::serving(
            StrategyKind::Direct,
            &[("https://a.test/", "<html>ok</html>")],
        ));
        let chromium = Arc::new(FakeStrategy::serving(
            StrategyKind::Chromium,
            &[("https://a.test/", "<html>browser</html>")],
        ));
        let chain = RetrievalChain::new(vec![proxy.clone(), direct.clone(), chromium.clone()]);

        let fetched = chain
            .fetch("https://a.test/", &StrategyKind::DEFAULT_ORDER)
            .await
            .unwrap();
        assert_eq!(fetched.strategy, StrategyKind::Direct);
        assert_eq!(fetched.html, "<html>ok</html>");
        assert_eq!(proxy.calls(), 1);
        assert_eq!(chromium.calls(), 0);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_every_attempt() {
        let chain = RetrievalChain::new(vec![
            Arc::new(FakeStrategy::failing(StrategyKind::Proxy, 500)),
            Arc::new(FakeStrategy::failing(StrategyKind::Direct, 503)),
        ]);
        let err = chain
            .fetch("https://a.test/", &StrategyKind::DEFAULT_ORDER)
            .await
            .unwrap_err();
        assert_eq!(err.attempts.len(), 2);
        assert_eq!(err.last_message(), "direct: HTTP status 503");
    }

    #[tokio::test]
    async fn test_empty_document_counts_as_failure() {
        let chain = RetrievalChain::new(vec![
            Arc::new(FakeStrategy::serving(
                StrategyKind::Proxy,
                &[("https://a.test/", "   ")],
            )),
            Arc::new(FakeStrategy::serving(
                StrategyKind::Direct,
                &[("https://a.test/", "<p>real</p>")],
            )),
        ]);
        let fetched = chain
            .fetch("https://a.test/", &StrategyKind::DEFAULT_ORDER)
            .await
            .unwrap();
        assert_eq!(fetched.strategy, StrategyKind::Direct);
    }

    #[tokio::test]
    async fn test_order_is_respected() {
        let proxy = Arc::new(FakeStrategy::serving(
            StrategyKind::Proxy,
            &[("https://a.test/", "proxy")],
        ));
        let direct = Arc::new(FakeStrategy::serving(
            StrategyKind::Direct,
            &[("https://a.test/", "direct")],
        ));
        let chain = RetrievalChain::new(vec![proxy.clone(), direct.clone()]);
        let order = StrategyKind::order_with_hint("direct", &StrategyKind::DEFAULT_ORDER);
        let fetched = chain.fetch("https://a.test/", &order).await.unwrap();
        assert_eq!(fetched.html, "direct");
        assert_eq!(proxy.calls(), 0);
    }

    #[tokio::test]
    async fn test_secondary_fetch_skips_browsers() {
        let chromium = Arc::new(FakeStrategy::serving(
            StrategyKind::Chromium,
            &[("https://a.test/p", "rendered")],
        ));
        let direct = Arc::new(FakeStrategy::failing(StrategyKind::Direct, 500));
        let chain = RetrievalChain::new(vec![direct.clone(), chromium.clone()]);
        let err = chain
            .fetch_without_browsers("https://a.test/p", &StrategyKind::DEFAULT_ORDER)
            .await
            .unwrap_err();
        assert_eq!(err.attempts.len(), 1);
        assert_eq!(chromium.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_registered_strategy() {
        let chain = RetrievalChain::default();
        let err = chain
            .fetch("https://a.test/", &StrategyKind::DEFAULT_ORDER)
            .await
            .unwrap_err();
        assert!(err.attempts.is_empty());
        assert_eq!(err.last_message(), "no retrieval strategy enabled");
    }

    /// Records the level of every event emitted while installed.
    struct Levels(Arc<Mutex<Vec<tracing::Level>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for Levels {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
            self.0.lock().unwrap().push(*event.metadata().level());
        }
    }

    #[tokio::test]
    async fn test_secondary_exhaustion_is_not_an_error() {
        use tracing_subscriber::layer::SubscriberExt;

        let levels = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(Levels(Arc::clone(&levels)));
        let _guard = tracing::subscriber::set_default(subscriber);

        let chain = RetrievalChain::new(vec![
            Arc::new(FakeStrategy::failing(StrategyKind::Proxy, 404)),
            Arc::new(FakeStrategy::failing(StrategyKind::Direct, 404)),
        ]);

        let err = chain
            .fetch_without_browsers("https://a.test/gone", &StrategyKind::DEFAULT_ORDER)
            .await
            .unwrap_err();
        assert_eq!(err.attempts.len(), 2);
        assert!(!levels.lock().unwrap().contains(&tracing::Level::ERROR));

        chain
            .fetch("https://a.test/gone", &StrategyKind::DEFAULT_ORDER)
            .await
            .unwrap_err();
        assert!(levels.lock().unwrap().contains(&tracing::Level::ERROR));
    }
}
