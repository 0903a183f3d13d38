//! Embedding generation for the semantic retrieval channel (spec §4.2).
//!
//! Wraps an [`EmbeddingProvider`] with an optional bounded LRU+TTL cache and
//! graceful degradation: a persistent provider failure is reported to the
//! caller as "unavailable" rather than failing the whole reconciliation
//! request, so the hybrid blender can fall back to trigram-only scoring.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use reconcile_core::config::EmbeddingConfig;
use reconcile_core::error::Result;
use std::sync::Arc;
use tracing::warn;

mod api_provider;
mod cache;
pub mod error;
mod mock_provider;
pub mod provider;

pub use api_provider::OpenAiEmbeddingProvider;
pub use error::EmbeddingError;
pub use mock_provider::MockEmbeddingProvider;
pub use provider::EmbeddingProvider;

use cache::EmbeddingCache;

/// Coordinates a provider and its cache, and absorbs provider failures.
pub struct EmbeddingManager {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Option<EmbeddingCache>,
}

impl EmbeddingManager {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: &EmbeddingConfig) -> Self {
        let cache = config.cache.enabled.then(|| EmbeddingCache::new(&config.cache));
        Self { provider, cache }
    }

    /// Builds a manager from configuration, using the real OpenAI-compatible
    /// provider. Tests construct an [`EmbeddingManager::new`] with a
    /// [`MockEmbeddingProvider`] directly instead.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let provider = Arc::new(OpenAiEmbeddingProvider::new(config)?);
        Ok(Self::new(provider, config))
    }

    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    /// Embeds one mention, consulting and populating the cache.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(text).await {
                return Ok(hit);
            }
        }
        let vector = self.provider.embed(text).await?;
        if let Some(cache) = &self.cache {
            cache.insert(text.to_string(), vector.clone()).await;
        }
        Ok(vector)
    }

    /// Embeds one mention, degrading to `None` on provider failure instead
    /// of propagating the error. The semantic channel treats `None` as
    /// unavailable and the hybrid blender scores on trigram alone (spec §7).
    pub async fn embed_or_degrade(&self, text: &str) -> Option<Vec<f32>> {
        match self.embed(text).await {
            Ok(vector) => Some(vector),
            Err(err) if err.is_recoverable() => {
                warn!(error = %err, "semantic channel unavailable, degrading to trigram-only");
                None
            }
            Err(err) => {
                warn!(error = %err, "unexpected embedding error, degrading to trigram-only");
                None
            }
        }
    }

    /// Embeds a batch, serving cache hits directly and sending only misses
    /// to the provider in one logical call. Result order matches input order.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let Some(cache) = &self.cache else {
            return self.provider.embed_batch(texts).await;
        };

        let mut out: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut miss_indices = Vec::new();
        let mut miss_texts = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            match cache.get(text).await {
                Some(vector) => out.push(Some(vector)),
                None => {
                    out.push(None);
                    miss_indices.push(i);
                    miss_texts.push(text.clone());
                }
            }
        }

        if !miss_texts.is_empty() {
            let fetched = self.provider.embed_batch(&miss_texts).await?;
            for (idx, (text, vector)) in miss_indices.into_iter().zip(miss_texts.into_iter().zip(fetched)) {
                cache.insert(text, vector.clone()).await;
                out[idx] = Some(vector);
            }
        }

        Ok(out.into_iter().map(|v| v.unwrap_or_default()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile_core::config::EmbeddingCacheConfig;

    fn cached_config() -> EmbeddingConfig {
        EmbeddingConfig {
            cache: EmbeddingCacheConfig {
                enabled: true,
                ttl_seconds: 3600,
                max_entries: 100,
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn embed_populates_and_reuses_cache() {
        let provider = Arc::new(MockEmbeddingProvider::new(4));
        let manager = EmbeddingManager::new(provider, &cached_config());

        let first = manager.embed("a mention").await.unwrap();
        let second = manager.embed("a mention").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(manager.dimension(), 4);
    }

    #[tokio::test]
    async fn embed_or_degrade_never_panics_on_success() {
        let provider = Arc::new(MockEmbeddingProvider::new(4));
        let manager = EmbeddingManager::new(provider, &EmbeddingConfig::default());
        assert!(manager.embed_or_degrade("x").await.is_some());
    }

    #[tokio::test]
    async fn embed_batch_preserves_order_without_cache() {
        let provider = Arc::new(MockEmbeddingProvider::new(2));
        let manager = EmbeddingManager::new(provider, &EmbeddingConfig::default());
        let texts = vec!["a".to_string(), "b".to_string()];
        let out = manager.embed_batch(&texts).await.unwrap();
        assert_eq!(out.len(), 2);
    }
}
