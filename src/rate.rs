//! Outbound request pacing and client identity rotation.
//!
//! A [`RateBudget`] is owned by one [`crate::pipeline::Pipeline`] and shared
//! with its strategies through an `Arc`. The time of the last request sits
//! behind an async mutex that is held across the pacing sleep, so callers
//! sharing a budget are serialized and never closer than `min_delay`.

use rand::rng;
use rand::seq::IndexedRandom;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

/// Browser identities rotated across outbound requests.
pub const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:124.0) Gecko/20100101 Firefox/124.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_3 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1",
];

#[derive(Debug)]
pub struct RateBudget {
    min_delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateBudget {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_request: Mutex::new(None),
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Wait until at least `min_delay` has passed since the previous request,
    /// then record now as the latest request. Returns the time spent waiting.
    pub async fn wait_turn(&self) -> Duration {
        let mut last = self.last_request.lock().await;
        let mut waited = Duration::ZERO;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_delay {
                waited = self.min_delay - elapsed;
                debug!(wait_ms = waited.as_millis() as u64, "Pacing outbound request");
                sleep(waited).await;
            }
        }
        *last = Some(Instant::now());
        waited
    }

    /// Pick a client identity from the pool.
    pub fn user_agent(&self) -> &'static str {
        USER_AGENTS.choose(&mut rng()).copied().unwrap_or(USER_AGENTS[0])
    }
}

impl Default for RateBudget {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_first_request_does_not_wait() {
        let budget = RateBudget::new(Duration::from_secs(5));
        let waited = budget.wait_turn().await;
        assert_eq!(waited, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_second_request_is_spaced() {
        let budget = RateBudget::new(Duration::from_millis(60));
        let start = Instant::now();
        budget.wait_turn().await;
        budget.wait_turn().await;
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_concurrent_callers_are_serialized() {
        let budget = Arc::new(RateBudget::new(Duration::from_millis(40)));
        let start = Instant::now();
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let budget = Arc::clone(&budget);
                tokio::spawn(async move { budget.wait_turn().await })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }
        // three requests need two full gaps between them
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[test]
    fn test_user_agent_comes_from_pool() {
        let budget = RateBudget::default();
        for _ in 0..20 {
            assert!(USER_AGENTS.contains(&budget.user_agent()));
        }
    }
}
