//! Result Cache — content-addressed, TTL + capacity-bounded mapping from a
//! text fingerprint to a prior analysis result.
//!
//! Backed by `moka`'s async cache, which gives us TTL expiry and
//! size-bounded eviction (an LRU-ish policy under the hood) without having
//! to hand-roll sweep/evict bookkeeping. The cache is intentionally
//! process-local and non-durable — nothing here survives a restart.

use std::time::Duration;

use moka::future::Cache as MokaCache;
use serde_json::Value;

/// Two-operation content-addressed cache: `get` and `put`.
#[derive(Clone)]
pub struct ResultCache {
    inner: MokaCache<String, Value>,
}

impl ResultCache {
    /// Build a cache that holds at most `capacity` entries, each expiring
    /// `ttl` after it was written.
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let inner = MokaCache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { inner }
    }

    /// Look up a cached analysis result by fingerprint. Returns `None` on a
    /// miss or if the entry has expired.
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.inner.get(key).await
    }

    /// Store an analysis result under its fingerprint, resetting its TTL.
    pub async fn put(&self, key: String, value: Value) {
        self.inner.insert(key, value).await;
    }
}

/// Fingerprint a canonicalized text blob as used for the cache key.
///
/// SHA-256 is used purely for content addressing, not as a security
/// primitive — any collision-resistant digest would do.
pub fn fingerprint(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_then_get_returns_value() {
        let cache = ResultCache::new(10, Duration::from_secs(60));
        let key = fingerprint("hello world");
        assert!(cache.get(&key).await.is_none());
        cache.put(key.clone(), json!({"summary": "s"})).await;
        assert_eq!(cache.get(&key).await, Some(json!({"summary": "s"})));
    }

    #[tokio::test]
    async fn ttl_expires_entries() {
        let cache = ResultCache::new(10, Duration::from_millis(20));
        let key = fingerprint("expires soon");
        cache.put(key.clone(), json!({"summary": "s"})).await;
        assert!(cache.get(&key).await.is_some());
        tokio::time::sleep(Duration::from_millis(120)).await;
        cache.inner.run_pending_tasks().await;
        assert!(cache.get(&key).await.is_none());
    }

    #[test]
    fn fingerprint_is_deterministic_and_content_sensitive() {
        let a = fingerprint("same text");
        let b = fingerprint("same text");
        let c = fingerprint("different text");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
