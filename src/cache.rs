//! TTL cache shielding upstream APIs from redundant calls
//!
//! Entries expire a fixed time after insertion and are evicted lazily when
//! a read finds them stale. There is no background sweep and no size bound;
//! the key space is small (one entry per coin, per source, per window).

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Default time-to-live applied by [`TtlCache::set`]
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Concurrent key/value store with per-entry expiry.
///
/// Concurrent writes to the same key race; the last write wins.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// TTL applied to entries stored through [`TtlCache::set`]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a live entry, evicting it if it has expired
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Re-check under the write lock: a writer may have refreshed it meanwhile.
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key) {
            if !entry.is_expired(Instant::now()) {
                return Some(entry.value.clone());
            }
            entries.remove(key);
            tracing::trace!(key = %key, "Evicted expired cache entry");
        }
        None
    }

    /// Store a value under the cache-wide TTL
    pub async fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.ttl).await;
    }

    /// Store a value with an explicit TTL, overwriting any existing entry
    pub async fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.into(), entry);
    }

    /// Whether a live entry exists for the key
    pub async fn has(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    /// Number of stored entries, including expired ones not yet evicted
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
