//! Per-client admission control.
//!
//! Fixed windows, not sliding ones: a client gets `max_requests` per window and
//! the count starts over on the first request after the window ends.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, interval};

use crate::error::WriteError;
use crate::metrics::TRACKED_CLIENTS;

/// Limit applied to every client key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitRule {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

impl Default for RateLimitRule {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(60))
    }
}

/// Backing store for rate limit counters.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Records one request for `key`; returns whether it is admitted.
    async fn check_and_increment(&self, key: &str) -> Result<bool, WriteError>;

    /// Short backend name for health output.
    fn backend(&self) -> &'static str;
}

// Window state for one client
#[derive(Debug, Clone, Copy)]
pub struct ClientWindow {
    pub count: u32,
    pub reset_at: Instant,
}

/// Process-local store. Not shared between instances and lost on restart.
pub struct InMemoryRateLimitStore {
    rule: RateLimitRule,
    windows: DashMap<String, ClientWindow>,
}

impl InMemoryRateLimitStore {
    pub fn new(rule: RateLimitRule) -> Self {
        Self {
            rule,
            windows: DashMap::new(),
        }
    }

    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();

        // the entry guard holds the shard lock, so read-modify-write is atomic per key
        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert(ClientWindow {
                count: 0,
                reset_at: now + self.rule.window,
            });

        // window over (or brand new)? start a fresh one
        if entry.count == 0 || now >= entry.reset_at {
            entry.count = 1;
            entry.reset_at = now + self.rule.window;
            return true;
        }

        if entry.count < self.rule.max_requests {
            entry.count += 1;
            return true;
        }

        false
    }

    /// Drops every window that has already ended. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows.retain(|_, window| window.reset_at > now);
        let removed = before.saturating_sub(self.windows.len());
        TRACKED_CLIENTS.set(self.windows.len() as f64);
        removed
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    #[cfg(test)]
    pub fn window(&self, key: &str) -> Option<ClientWindow> {
        self.windows.get(key).map(|entry| *entry)
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn check_and_increment(&self, key: &str) -> Result<bool, WriteError> {
        let allowed = self.check(key);
        TRACKED_CLIENTS.set(self.windows.len() as f64);
        Ok(allowed)
    }

    fn backend(&self) -> &'static str {
        "in-memory"
    }
}

// Sweeper - drops finished windows so idle clients don't pile up
pub async fn sweeper(store: Arc<InMemoryRateLimitStore>, every: Duration) {
    let mut interval = interval(every);

    tracing::info!(interval = ?every, "rate limit sweeper started");

    loop {
        interval.tick().await;

        let removed = store.purge_expired();
        if removed > 0 {
            tracing::debug!(removed, remaining = store.tracked_clients(), "purged rate limit windows");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn store() -> InMemoryRateLimitStore {
        InMemoryRateLimitStore::new(RateLimitRule::default())
    }

    #[tokio::test(start_paused = true)]
    async fn admits_up_to_the_limit_then_rejects() {
        let store = store();
        for attempt in 1..=10 {
            assert!(
                store.check_and_increment("10.0.0.1").await.unwrap(),
                "attempt {attempt} should be admitted"
            );
        }
        assert!(!store.check_and_increment("10.0.0.1").await.unwrap());
        assert!(!store.check_and_increment("10.0.0.1").await.unwrap());
        assert_eq!(store.window("10.0.0.1").unwrap().count, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn clients_are_counted_separately() {
        let store = store();
        for _ in 0..10 {
            store.check("10.0.0.1");
        }
        assert!(!store.check("10.0.0.1"));
        assert!(store.check("10.0.0.2"));
        assert_eq!(store.window("10.0.0.2").unwrap().count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn window_resets_after_it_elapses() {
        let store = store();
        for _ in 0..10 {
            store.check("client");
        }
        assert!(!store.check("client"));

        advance(Duration::from_secs(59)).await;
        assert!(!store.check("client"));

        advance(Duration::from_millis(1_001)).await;
        assert!(store.check("client"));
        assert_eq!(store.window("client").unwrap().count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_requests_do_not_extend_the_window() {
        let store = store();
        for _ in 0..10 {
            store.check("client");
        }
        let reset_at = store.window("client").unwrap().reset_at;

        advance(Duration::from_secs(30)).await;
        assert!(!store.check("client"));
        assert_eq!(store.window("client").unwrap().reset_at, reset_at);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_only_finished_windows() {
        let store = store();
        store.check("old");
        advance(Duration::from_secs(45)).await;
        store.check("fresh");
        advance(Duration::from_secs(20)).await;

        assert_eq!(store.purge_expired(), 1);
        assert!(store.window("old").is_none());
        assert!(store.window("fresh").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_purges_on_its_interval() {
        let store = Arc::new(store());
        store.check("a");
        store.check("b");
        assert_eq!(store.tracked_clients(), 2);

        tokio::spawn(sweeper(store.clone(), Duration::from_secs(30)));
        tokio::task::yield_now().await;
        assert_eq!(store.tracked_clients(), 2);

        // windows end at 60s; the 90s tick is the first to see them expired
        advance(Duration::from_secs(91)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(store.tracked_clients(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_rule_is_honoured() {
        let store = InMemoryRateLimitStore::new(RateLimitRule::new(2, Duration::from_secs(5)));
        assert!(store.check("k"));
        assert!(store.check("k"));
        assert!(!store.check("k"));
        advance(Duration::from_secs(5)).await;
        assert!(store.check("k"));
    }
}
