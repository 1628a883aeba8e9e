//! In-memory cache layer for reducing API calls
//!
//! Provides TTL-based caching for fetched indicator observations.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Cache entry with TTL
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    fn new(value: T, ttl_secs: i64) -> Self {
        Self {
            value,
            expires_at: Utc::now() + Duration::seconds(ttl_secs),
        }
    }

    fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Keyed TTL cache, cheap to clone (shared storage)
#[derive(Debug, Clone)]
pub struct TtlCache<T> {
    entries: Arc<RwLock<HashMap<String, CacheEntry<T>>>>,
    /// Default TTL in seconds
    default_ttl: i64,
}

impl<T: Clone> Default for TtlCache<T> {
    fn default() -> Self {
        Self::new(60)
    }
}

impl<T: Clone> TtlCache<T> {
    pub fn new(default_ttl_secs: i64) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            default_ttl: default_ttl_secs,
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.default_ttl
    }

    pub fn insert(&self, key: &str, value: T) {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    pub fn insert_with_ttl(&self, key: &str, value: T, ttl_secs: i64) {
        let mut cache = self.entries.write();
        cache.insert(key.to_string(), CacheEntry::new(value, ttl_secs));
    }

    /// Get a value (None if expired or not found)
    pub fn get(&self, key: &str) -> Option<T> {
        let cache = self.entries.read();
        cache.get(key).and_then(|entry| {
            if entry.is_expired() {
                None
            } else {
                Some(entry.value.clone())
            }
        })
    }

    /// Get multiple values at once, skipping misses
    pub fn get_many(&self, keys: &[String]) -> HashMap<String, T> {
        let cache = self.entries.read();
        keys.iter()
            .filter_map(|key| {
                cache
                    .get(key)
                    .filter(|entry| !entry.is_expired())
                    .map(|entry| (key.clone(), entry.value.clone()))
            })
            .collect()
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.write().remove(key);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Clear expired entries
    pub fn cleanup(&self) {
        let mut cache = self.entries.write();
        cache.retain(|_, entry| !entry.is_expired());
    }

    pub fn stats(&self) -> CacheStats {
        let cache = self.entries.read();
        let total = cache.len();
        let expired = cache.values().filter(|e| e.is_expired()).count();
        CacheStats {
            total_entries: total,
            expired_entries: expired,
            valid_entries: total - expired,
        }
    }
}

impl<T: Clone + Send + Sync + 'static> TtlCache<T> {
    /// Start background cleanup task
    pub fn start_cleanup_task(&self, interval_secs: u64) {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                cache.cleanup();
                tracing::debug!("Cache cleanup completed");
            }
        });
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub valid_entries: usize,
}
