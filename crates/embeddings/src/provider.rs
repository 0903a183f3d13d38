//! Trait definition for embedding providers (spec §4.2).

use async_trait::async_trait;
use reconcile_core::error::Result;

/// Pure function `embed(text) -> vector` (spec §4.2). Implementations own
/// their own retry policy; callers never retry themselves.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single mention. The input is the raw mention text, not the
    /// normalized form, to preserve signal the embedding model relies on.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts in one logical call. Implementations may
    /// internally sub-batch; the result vector has exactly one entry per
    /// input, in the same order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Dimensionality of vectors this provider produces (spec §4.2: 768).
    fn dimension(&self) -> usize;
}
