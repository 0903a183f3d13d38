//! Trait and shared validation for LLM-based rerank providers (spec §4.8).

use async_trait::async_trait;
use reconcile_core::entities::Candidate;
use reconcile_core::error::Result;

/// A candidate re-scored by the model. `llm_confidence` is independent of
/// `blend` and is merged into the response candidate alongside it; the
/// model never drops or invents ids (spec §4.8, §9 Open Question: rerank
/// preserves cardinality).
#[derive(Debug, Clone, PartialEq)]
pub struct RerankedCandidate {
    pub id: i64,
    pub llm_confidence: f64,
}

#[async_trait]
pub trait RerankProvider: Send + Sync {
    /// Scores `candidates` against `mention` and returns one entry per
    /// input candidate, in descending confidence order. Implementations
    /// must validate the model's output against [`validate_ranking`]
    /// before returning; a validation failure is a recoverable error the
    /// caller absorbs by keeping blend order (spec §7).
    async fn rerank(&self, mention: &str, candidates: &[Candidate]) -> Result<Vec<RerankedCandidate>>;
}

/// Checks that `ranked` is exactly a permutation of `candidates`' ids: same
/// cardinality, no duplicates, no ids outside the input set (spec §4.8).
pub fn validate_ranking(candidates: &[Candidate], ranked: &[RerankedCandidate]) -> std::result::Result<(), String> {
    if ranked.len() != candidates.len() {
        return Err(format!(
            "expected {} ranked candidates, got {}",
            candidates.len(),
            ranked.len()
        ));
    }

    let input_ids: std::collections::BTreeSet<i64> = candidates.iter().map(|c| c.id).collect();
    let mut seen = std::collections::BTreeSet::new();
    for entry in ranked {
        if !input_ids.contains(&entry.id) {
            return Err(format!("ranking contains unknown id {}", entry.id));
        }
        if !seen.insert(entry.id) {
            return Err(format!("ranking contains duplicate id {}", entry.id));
        }
    }
    Ok(())
}
