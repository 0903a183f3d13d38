//! OpenAI-compatible API embedding provider (spec §4.2).

use crate::{error::EmbeddingError, provider::EmbeddingProvider};
use async_openai::types::{CreateEmbeddingRequest, EmbeddingInput};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use reconcile_core::config::EmbeddingConfig;
use reconcile_core::error::Result;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub struct OpenAiEmbeddingProvider {
    client: Client<OpenAIConfig>,
    model: String,
    dimension: usize,
    max_retries: usize,
}

impl OpenAiEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let mut openai_config = OpenAIConfig::new();
        if let Some(base_url) = &config.api_base_url {
            openai_config = openai_config.with_api_base(base_url);
        }
        if let Some(api_key) = &config.api_key {
            openai_config = openai_config.with_api_key(api_key);
        }

        info!(model = %config.model, dimension = config.dimension, "initializing embedding provider");

        Ok(Self {
            client: Client::with_config(openai_config),
            model: config.model.clone(),
            dimension: config.dimension,
            max_retries: config.max_retries,
        })
    }

    /// Single request with bounded exponential backoff (spec §4.2: "Retries
    /// on transient transport failure up to a bounded count with exponential
    /// backoff"). Never panics; on persistent failure the caller degrades
    /// the semantic channel rather than failing the whole request.
    async fn request_with_retry(&self, texts: Vec<String>) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut attempt = 0usize;
        loop {
            let request = CreateEmbeddingRequest {
                model: self.model.clone(),
                input: EmbeddingInput::StringArray(texts.clone()),
                encoding_format: None,
                dimensions: None,
                user: None,
            };

            match self.client.embeddings().create(request).await {
                Ok(response) => {
                    let mut sorted: Vec<(usize, Vec<f32>)> = response
                        .data
                        .into_iter()
                        .map(|e| (e.index as usize, e.embedding))
                        .collect();
                    sorted.sort_by_key(|(idx, _)| *idx);

                    let mut out = Vec::with_capacity(sorted.len());
                    for (_, embedding) in sorted {
                        if embedding.len() != self.dimension {
                            return Err(EmbeddingError::DimensionMismatch {
                                expected: self.dimension,
                                got: embedding.len(),
                            });
                        }
                        out.push(embedding);
                    }
                    return Ok(out);
                }
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    error!(error = %e, attempt, "embedding request failed, retrying");
                    let backoff_secs = (1u64 << attempt.min(6)).min(30);
                    warn!(backoff_secs, attempt, max_retries = self.max_retries, "backing off");
                    tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                }
                Err(e) => {
                    return Err(EmbeddingError::InferenceError(format!(
                        "embedding request failed after {} attempts: {e}",
                        self.max_retries
                    )));
                }
            }
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut results = self
            .request_with_retry(vec![text.to_string()])
            .await
            .map_err(reconcile_core::error::Error::from)?;
        results.pop().ok_or_else(|| {
            reconcile_core::error::Error::embedding("provider returned no vector for single text")
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = texts.len(), "embedding batch");
        self.request_with_retry(texts.to_vec())
            .await
            .map_err(reconcile_core::error::Error::from)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
