//! Deterministic mock rerank provider for tests: returns candidates in
//! their existing blend order with `llm_confidence` mirroring `blend`.

use crate::provider::{RerankProvider, RerankedCandidate};
use async_trait::async_trait;
use reconcile_core::entities::Candidate;
use reconcile_core::error::Result;

pub struct MockRerankProvider;

#[async_trait]
impl RerankProvider for MockRerankProvider {
    async fn rerank(&self, _mention: &str, candidates: &[Candidate]) -> Result<Vec<RerankedCandidate>> {
        Ok(candidates
            .iter()
            .map(|c| RerankedCandidate {
                id: c.id,
                llm_confidence: c.blend,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile_core::entities::CandidateMetadata;

    #[tokio::test]
    async fn mirrors_blend_order_and_cardinality() {
        let candidates = vec![
            Candidate {
                id: 1,
                label: "a".to_string(),
                trgm_sim: 0.5,
                sem_sim: 0.5,
                blend: 0.9,
                metadata: CandidateMetadata::default(),
            },
            Candidate {
                id: 2,
                label: "b".to_string(),
                trgm_sim: 0.3,
                sem_sim: 0.3,
                blend: 0.4,
                metadata: CandidateMetadata::default(),
            },
        ];
        let provider = MockRerankProvider;
        let ranked = provider.rerank("mention", &candidates).await.unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].llm_confidence, 0.9);
    }
}
