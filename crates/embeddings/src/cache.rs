//! Bounded in-memory LRU+TTL cache for embedding vectors (spec §4.2).
//!
//! Keyed by the exact input string. A hit still counts as a touch for LRU
//! purposes but is discarded once its entry has aged past the configured
//! TTL, so a stale vector is never served.

use lru::LruCache;
use reconcile_core::config::EmbeddingCacheConfig;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct CacheEntry {
    vector: Vec<f32>,
    inserted_at: Instant,
}

pub struct EmbeddingCache {
    inner: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl EmbeddingCache {
    pub fn new(config: &EmbeddingCacheConfig) -> Self {
        let capacity = config.max_entries.clamp(1, 1_000_000);
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl: Duration::from_secs(config.ttl_seconds),
        }
    }

    pub async fn get(&self, text: &str) -> Option<Vec<f32>> {
        let mut cache = self.inner.lock().await;
        let expired = cache
            .get(text)
            .map(|entry| entry.inserted_at.elapsed() > self.ttl)
            .unwrap_or(false);
        if expired {
            cache.pop(text);
            return None;
        }
        cache.get(text).map(|entry| entry.vector.clone())
    }

    pub async fn insert(&self, text: String, vector: Vec<f32>) {
        let mut cache = self.inner.lock().await;
        cache.put(
            text,
            CacheEntry {
                vector,
                inserted_at: Instant::now(),
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
