//! Optional LLM rerank stage over the top blended candidates (spec §4.8).
//!
//! Always recoverable: a disabled config, a transport failure, a timeout,
//! or a malformed/invalid model response all fall back to leaving the
//! candidates in their existing blend order rather than failing the
//! reconciliation request.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use reconcile_core::config::LlmRerankConfig;
use reconcile_core::entities::Candidate;
use tracing::warn;

mod completion_provider;
pub mod error;
mod mock_provider;
pub mod provider;

pub use completion_provider::CompletionRerankProvider;
pub use error::LlmRerankError;
pub use mock_provider::MockRerankProvider;
pub use provider::{validate_ranking, RerankProvider, RerankedCandidate};

/// Reranks the top `config.top_n` candidates (clamped to the input length)
/// against `mention`, merging `llm_confidence` back onto the original
/// [`Candidate`]s and leaving the rest untouched. On any failure the input
/// order is returned unchanged; this function never fails.
pub async fn rerank_top_candidates(
    provider: &dyn RerankProvider,
    config: &LlmRerankConfig,
    mention: &str,
    candidates: Vec<Candidate>,
) -> Vec<(Candidate, Option<f64>)> {
    if !config.enabled || candidates.is_empty() {
        return candidates.into_iter().map(|c| (c, None)).collect();
    }

    let split_at = config.top_n.min(candidates.len());
    let (head, tail) = candidates.split_at(split_at);
    let head = head.to_vec();
    let tail = tail.to_vec();

    match provider.rerank(mention, &head).await {
        Ok(ranked) => {
            let confidences: std::collections::HashMap<i64, f64> =
                ranked.iter().map(|r| (r.id, r.llm_confidence)).collect();
            let mut by_id: std::collections::HashMap<i64, Candidate> =
                head.into_iter().map(|c| (c.id, c)).collect();

            let mut reordered: Vec<(Candidate, Option<f64>)> = ranked
                .into_iter()
                .filter_map(|r| {
                    by_id.remove(&r.id).map(|c| (c, confidences.get(&r.id).copied()))
                })
                .collect();
            reordered.extend(tail.into_iter().map(|c| (c, None)));
            reordered
        }
        Err(err) => {
            warn!(error = %err, "llm rerank unavailable, keeping blend order");
            head.into_iter()
                .chain(tail)
                .map(|c| (c, None))
                .collect()
        }
    }
}
