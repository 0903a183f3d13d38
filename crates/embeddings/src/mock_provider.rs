//! Deterministic mock embedding provider for tests.

use crate::provider::EmbeddingProvider;
use async_trait::async_trait;
use reconcile_core::error::Result;

/// Returns a fixed-dimension zero vector for every input. Used in unit and
/// integration tests that exercise the hybrid blender without a live API.
pub struct MockEmbeddingProvider {
    dimension: usize,
}

impl MockEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.0; self.dimension])
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![0.0; self.dimension]).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embed_returns_configured_dimension() {
        let provider = MockEmbeddingProvider::new(768);
        let v = provider.embed("some mention text").await.unwrap();
        assert_eq!(v.len(), 768);
        assert_eq!(provider.dimension(), 768);
    }

    #[tokio::test]
    async fn embed_batch_preserves_count() {
        let provider = MockEmbeddingProvider::new(8);
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let out = provider.embed_batch(&texts).await.unwrap();
        assert_eq!(out.len(), 3);
    }
}
