use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};
use tokio::sync::Mutex;
use tokio::time::Instant;

/// In-memory sliding-window rate limiter (for single-instance deployments).
/// Each key holds the timestamps of its hits inside the current window.
#[derive(Clone, Default)]
pub struct RateLimitState {
    entries: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
}

impl RateLimitState {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record a hit for `key` and check it against `max_requests` per
    /// `window_secs`. Returns the remaining allowance, or Err(retry_after)
    /// when the window is full. A rejected hit is not recorded.
    pub async fn check(
        &self,
        key: &str,
        max_requests: u32,
        window_secs: u64,
    ) -> Result<u32, Duration> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let window = Duration::from_secs(window_secs);

        let hits = entries.entry(key.to_string()).or_default();
        while let Some(oldest) = hits.front() {
            if now.duration_since(*oldest) >= window {
                hits.pop_front();
            } else {
                break;
            }
        }

        if hits.len() as u32 >= max_requests {
            let retry_after = hits
                .front()
                .map(|oldest| window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(window);
            return Err(retry_after);
        }

        hits.push_back(now);
        Ok(max_requests.saturating_sub(hits.len() as u32))
    }

    /// Drop keys whose newest hit has left the window.
    pub async fn cleanup(&self, window_secs: u64) {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let window = Duration::from_secs(window_secs);

        entries.retain(|_, hits| {
            hits.back()
                .map(|last| now.duration_since(*last) < window)
                .unwrap_or(false)
        });
    }
}

/// Purge idle limiter keys every 5 minutes.
pub fn spawn_cleanup_worker(limiter: RateLimitState, window_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            limiter.cleanup(window_secs).await;
            tracing::debug!("Rate limiter cleanup pass complete");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: u32 = 5;
    const WINDOW: u64 = 60;

    #[tokio::test]
    async fn allows_under_the_limit() {
        let limiter = RateLimitState::new();

        for i in 0..MAX {
            let result = limiter.check("login:marta", MAX, WINDOW).await;
            assert!(result.is_ok(), "request {} should be allowed", i + 1);
        }
    }

    #[tokio::test]
    async fn blocks_over_the_limit() {
        let limiter = RateLimitState::new();

        for _ in 0..MAX {
            let _ = limiter.check("login:marta", MAX, WINDOW).await;
        }

        let result = limiter.check("login:marta", MAX, WINDOW).await;
        assert!(result.is_err(), "request over the limit should be blocked");
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = RateLimitState::new();

        for _ in 0..MAX {
            let _ = limiter.check("login:marta", MAX, WINDOW).await;
        }

        let result = limiter.check("login:ola", MAX, WINDOW).await;
        assert!(result.is_ok(), "a different key has its own window");
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides_rather_than_resets() {
        let limiter = RateLimitState::new();

        // Two early hits, three late ones.
        for _ in 0..2 {
            let _ = limiter.check("login:marta", MAX, WINDOW).await;
        }
        tokio::time::advance(Duration::from_secs(30)).await;
        for _ in 0..3 {
            let _ = limiter.check("login:marta", MAX, WINDOW).await;
        }
        assert!(limiter.check("login:marta", MAX, WINDOW).await.is_err());

        // 31s later the two early hits have left the window, the three
        // late ones have not: exactly two slots free.
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(limiter.check("login:marta", MAX, WINDOW).await.is_ok());
        assert!(limiter.check("login:marta", MAX, WINDOW).await.is_ok());
        assert!(limiter.check("login:marta", MAX, WINDOW).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_tracks_the_oldest_hit() {
        let limiter = RateLimitState::new();

        for _ in 0..MAX {
            let _ = limiter.check("login:marta", MAX, WINDOW).await;
        }
        tokio::time::advance(Duration::from_secs(20)).await;

        let retry_after = limiter
            .check("login:marta", MAX, WINDOW)
            .await
            .expect_err("should be limited");
        assert_eq!(retry_after, Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_drops_idle_keys_only() {
        let limiter = RateLimitState::new();

        let _ = limiter.check("login:idle", MAX, WINDOW).await;
        tokio::time::advance(Duration::from_secs(WINDOW + 1)).await;
        let _ = limiter.check("login:fresh", MAX, WINDOW).await;

        limiter.cleanup(WINDOW).await;

        let entries = limiter.entries.lock().await;
        assert!(!entries.contains_key("login:idle"));
        assert!(entries.contains_key("login:fresh"));
    }
}
