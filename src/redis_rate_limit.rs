//! Redis-backed rate limit store, shared by every proxy instance.

use async_trait::async_trait;
use redis::Script;

use crate::error::WriteError;
use crate::rate_limit::{RateLimitRule, RateLimitStore};

// Counter starts its TTL on the first hit of a window; the key disappearing is the reset.
const CHECK_AND_INCREMENT_SCRIPT: &str = r#"
local key = KEYS[1]
local window_ms = tonumber(ARGV[1])

local count = redis.call('INCR', key)
local ttl = redis.call('PTTL', key)

if ttl < 0 then
  redis.call('PEXPIRE', key, window_ms)
end

return count
"#;

// Redis counts every hit, rejected ones included; the first `max_requests` of a window pass.
pub fn admits(count: u64, rule: &RateLimitRule) -> bool {
    count <= u64::from(rule.max_requests)
}

#[derive(Clone)]
pub struct RedisRateLimitStore {
    client: redis::Client,
    key_prefix: String,
    rule: RateLimitRule,
}

impl RedisRateLimitStore {
    pub fn new(client: redis::Client, key_prefix: impl Into<String>, rule: RateLimitRule) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
            rule,
        }
    }

    fn key_for(&self, key: &str) -> String {
        format!("{}:{key}", self.key_prefix)
    }

    fn window_millis(&self) -> u64 {
        u64::try_from(self.rule.window.as_millis())
            .unwrap_or(u64::MAX)
            .max(1)
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn check_and_increment(&self, key: &str) -> Result<bool, WriteError> {
        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| {
                WriteError::StoreUnavailable(format!("failed to connect to redis: {error}"))
            })?;

        let count: u64 = Script::new(CHECK_AND_INCREMENT_SCRIPT)
            .key(self.key_for(key))
            .arg(self.window_millis())
            .invoke_async(&mut connection)
            .await
            .map_err(|error| {
                WriteError::StoreUnavailable(format!("failed to record rate limit hit: {error}"))
            })?;

        Ok(admits(count, &self.rule))
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn store(window: Duration) -> RedisRateLimitStore {
        let client = redis::Client::open("redis://127.0.0.1:6379").unwrap();
        RedisRateLimitStore::new(client, "write-proxy:ratelimit", RateLimitRule::new(10, window))
    }

    #[test]
    fn keys_are_namespaced() {
        let store = store(Duration::from_secs(60));
        assert_eq!(store.key_for("203.0.113.9"), "write-proxy:ratelimit:203.0.113.9");
    }

    #[test]
    fn window_is_expressed_in_milliseconds() {
        assert_eq!(store(Duration::from_secs(60)).window_millis(), 60_000);
        assert_eq!(store(Duration::ZERO).window_millis(), 1);
    }

    #[test]
    fn reports_redis_backend() {
        assert_eq!(store(Duration::from_secs(60)).backend(), "redis");
    }

    #[test]
    fn admits_exactly_max_requests_per_window() {
        let rule = RateLimitRule::default();
        assert!(admits(1, &rule));
        assert!(admits(10, &rule));
        assert!(!admits(11, &rule));
        assert!(!admits(12, &rule));
    }

    // Needs a live server: REDIS_URL=redis://127.0.0.1:6379 cargo test
    #[tokio::test]
    async fn eleventh_hit_is_rejected_and_window_expires() {
        let Ok(url) = std::env::var("REDIS_URL") else {
            return;
        };
        let client = redis::Client::open(url.as_str()).unwrap();
        let prefix = format!(
            "write-proxy:test:{}:{}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        );
        let store = RedisRateLimitStore::new(
            client.clone(),
            prefix,
            RateLimitRule::new(10, Duration::from_secs(60)),
        );

        for attempt in 1..=10 {
            assert!(
                store.check_and_increment("198.51.100.1").await.unwrap(),
                "attempt {attempt} should be admitted"
            );
        }
        assert!(!store.check_and_increment("198.51.100.1").await.unwrap());

        let mut connection = client.get_multiplexed_async_connection().await.unwrap();
        let key = store.key_for("198.51.100.1");
        let pttl: i64 = redis::cmd("PTTL")
            .arg(&key)
            .query_async(&mut connection)
            .await
            .unwrap();
        assert!(pttl > 0 && pttl <= 60_000, "pttl was {pttl}");

        let _: () = redis::cmd("DEL")
            .arg(&key)
            .query_async(&mut connection)
            .await
            .unwrap();
    }
}
