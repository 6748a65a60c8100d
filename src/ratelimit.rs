//! Fixed-window rate limiting backed by the shared store.
//!
//! Counters live at `ratelimit:{scope}:{client}` with a TTL equal to
//! the window. The first hit creates the counter and arms the expiry;
//! once the count passes the quota the remaining TTL becomes the
//! client's retry-after. Windows do not slide, so a burst can span a
//! window boundary; acceptable for abuse control on a personal site.

use thiserror::Error;

use crate::store::{KvStore, StoreError, StoreResult};

/// Requests allowed per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub limit: u32,
    pub window_secs: u64,
}

impl Quota {
    pub const fn new(limit: u32, window_secs: u64) -> Self {
        Self { limit, window_secs }
    }

    /// Parse `"limit/window_secs"`, e.g. `"3/3600"`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (limit, window) = raw.split_once('/')?;
        let limit: u32 = limit.trim().parse().ok()?;
        let window_secs: u64 = window.trim().parse().ok()?;
        if limit == 0 || window_secs == 0 {
            return None;
        }
        Some(Self::new(limit, window_secs))
    }
}

/// Rate limiting outcome
#[derive(Debug, Clone, Error)]
pub enum RateLimitError {
    #[error("Rate limit exceeded for {scope}")]
    Exceeded { scope: String, retry_after_secs: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Shared fixed-window limiter.
#[derive(Clone)]
pub struct RateLimiter {
    kv: std::sync::Arc<dyn KvStore>,
}

impl RateLimiter {
    pub fn new(kv: std::sync::Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Record one hit for `client` in `scope` and enforce the quota.
    pub async fn check(
        &self,
        scope: &str,
        client: &str,
        quota: Quota,
    ) -> Result<(), RateLimitError> {
        let key = format!("ratelimit:{}:{}", scope, client);
        let count = self.kv.incr(&key).await?;

        if count == 1 {
            // New window; arm the expiry.
            self.kv.expire(&key, quota.window_secs).await?;
        }

        if count > i64::from(quota.limit) {
            let retry_after_secs = self.retry_after(&key, quota).await?;
            return Err(RateLimitError::Exceeded {
                scope: scope.to_string(),
                retry_after_secs,
            });
        }
        Ok(())
    }

    /// Remaining window for an exhausted counter.
    ///
    /// A counter that lost its TTL (expiry raced the INCR) reports the
    /// full window rather than an unbounded wait.
    async fn retry_after(&self, key: &str, quota: Quota) -> StoreResult<u64> {
        Ok(self
            .kv
            .ttl(key)
            .await?
            .unwrap_or(quota.window_secs)
            .min(quota.window_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    const QUOTA: Quota = Quota::new(3, 60);

    #[tokio::test]
    async fn test_allows_up_to_quota_then_blocks() {
        let limiter = RateLimiter::new(Arc::new(MemoryStore::new()));

        for _ in 0..3 {
            limiter.check("contact", "1.2.3.4", QUOTA).await.unwrap();
        }

        let err = limiter.check("contact", "1.2.3.4", QUOTA).await.unwrap_err();
        match err {
            RateLimitError::Exceeded {
                scope,
                retry_after_secs,
            } => {
                assert_eq!(scope, "contact");
                assert!(retry_after_secs >= 1 && retry_after_secs <= 60);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_clients_and_scopes_are_independent() {
        let limiter = RateLimiter::new(Arc::new(MemoryStore::new()));

        for _ in 0..3 {
            limiter.check("contact", "1.2.3.4", QUOTA).await.unwrap();
        }

        // Different client, same scope.
        limiter.check("contact", "5.6.7.8", QUOTA).await.unwrap();
        // Same client, different scope.
        limiter.check("vote", "1.2.3.4", QUOTA).await.unwrap();
    }

    #[test]
    fn test_quota_parse() {
        assert_eq!(Quota::parse("3/3600"), Some(Quota::new(3, 3600)));
        assert_eq!(Quota::parse(" 5 / 60 "), Some(Quota::new(5, 60)));
        assert_eq!(Quota::parse("0/60"), None);
        assert_eq!(Quota::parse("5"), None);
        assert_eq!(Quota::parse("a/b"), None);
    }
}
