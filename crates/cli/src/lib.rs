//! Library interface for the reconciliation service CLI.
//!
//! Exposes the engine-wiring helper for integration testing while keeping
//! argument parsing and command dispatch in `main.rs`.

use anyhow::{Context, Result};
use reconcile_core::config::Config;
use reconcile_embeddings::EmbeddingManager;
use reconcile_engine::ReconciliationEngine;
use reconcile_llm_rerank::{CompletionRerankProvider, RerankProvider};
use reconcile_storage::{AuthorityStore, PostgresAuthorityStore};
use std::sync::Arc;

/// Connects to the authority database and builds the dependencies a
/// [`ReconciliationEngine`] needs: the storage client, the embedding
/// manager, and the optional LLM rerank provider.
pub async fn build_engine(config: &Config) -> Result<Arc<ReconciliationEngine>> {
    let store: Arc<dyn AuthorityStore> = Arc::new(
        PostgresAuthorityStore::connect(&config.storage)
            .await
            .context("failed to connect to the authority database")?,
    );

    let embeddings = Arc::new(
        EmbeddingManager::from_config(&config.embedding)
            .context("failed to construct embedding provider")?,
    );

    let rerank: Option<Arc<dyn RerankProvider>> = if config.llm_rerank.enabled {
        Some(Arc::new(CompletionRerankProvider::new(&config.llm_rerank)))
    } else {
        None
    };

    Ok(Arc::new(ReconciliationEngine::new(
        config.clone(),
        store,
        embeddings,
        rerank,
    )))
}
