//! # Response Cache
//!
//! Short-TTL memoization of idempotent upstream reads, keyed by request
//! signature. Entries are owned exclusively by the cache and never served
//! past their expiry.

use dashmap::DashMap;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// TTL cache for upstream responses
#[derive(Debug)]
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Look up an unexpired entry. Expired entries are evicted on access.
    pub fn get(&self, key: &str) -> Option<Value> {
        let hit = match self.entries.get(key) {
            Some(entry) => {
                if entry.expires_at > Instant::now() {
                    Some(entry.value.clone())
                } else {
                    None
                }
            }
            None => return None,
        };

        if hit.is_none() {
            self.entries.remove(key);
            debug!(cache_key = %key, "Cache entry expired - evicted");
        }

        hit
    }

    /// Store a response under the configured TTL
    pub fn insert(&self, key: String, value: Value) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Explicitly drop an entry
    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop all expired entries
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hit_within_ttl() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.insert("GET /repos/a/b".to_string(), json!({"id": 1}));
        assert_eq!(cache.get("GET /repos/a/b"), Some(json!({"id": 1})));
    }

    #[test]
    fn test_expired_entry_never_served() {
        let cache = ResponseCache::new(Duration::from_millis(0));
        cache.insert("GET /repos/a/b".to_string(), json!({"id": 1}));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("GET /repos/a/b"), None);
        // Evicted on access
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.insert("k".to_string(), json!(1));
        cache.invalidate("k");
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_purge_expired() {
        let cache = ResponseCache::new(Duration::from_millis(0));
        cache.insert("a".to_string(), json!(1));
        cache.insert("b".to_string(), json!(2));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.purge_expired(), 2);
        assert!(cache.is_empty());
    }
}
