//! In-process read-through response cache.
//!
//! Endpoints that tolerate staleness (profiles, rollups, leaderboards)
//! memoize their serialized JSON bodies here under short fixed TTLs.
//! Entries are reaped lazily on read; nothing is invalidated on write.

use dashmap::DashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let hit = self.entries.get(key)?;
        if hit.expires_at <= Instant::now() {
            drop(hit);
            self.entries.remove(key);
            return None;
        }
        Some(hit.value.clone())
    }

    pub fn put(&self, key: impl Into<String>, value: serde_json::Value, ttl: Duration) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_returns_fresh_entry() {
        let cache = ResponseCache::new();
        cache.put("k", json!({"a": 1}), Duration::from_secs(60));
        assert_eq!(cache.get("k"), Some(json!({"a": 1})));
    }

    #[test]
    fn test_expired_entry_is_dropped() {
        let cache = ResponseCache::new();
        cache.put("k", json!(1), Duration::from_secs(0));
        assert_eq!(cache.get("k"), None);
        // The reap removed the entry entirely.
        assert!(cache.entries.get("k").is_none());
    }

    #[test]
    fn test_miss_on_unknown_key() {
        let cache = ResponseCache::new();
        assert_eq!(cache.get("absent"), None);
    }
}
