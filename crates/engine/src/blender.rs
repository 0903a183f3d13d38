//! Hybrid blender (spec §4.5): merges a trigram channel and a semantic
//! channel by id, scores with a weighted sum, and sorts by the single total
//! order every candidate list in this crate uses.

use reconcile_core::entities::{Candidate, CandidateMetadata};
use reconcile_storage::SearchHit;
use std::collections::BTreeMap;
use tracing::warn;

struct MergedRow {
    label: String,
    trgm: Option<f64>,
    sem: Option<f64>,
}

/// Unions `trgm_hits` and `sem_hits` by id, scores `blend = alpha *
/// coalesce(trgm, 0) + (1 - alpha) * coalesce(sem, 0)`, sorts `(blend desc,
/// label asc)`, and truncates to `k_final`.
///
/// A label disagreement between the two channels for the same id is a data
/// integrity error (spec §4.5, §7 `Internal`): the row is dropped and a
/// warning logged rather than failing the whole sub-query.
pub fn blend(
    trgm_hits: Vec<SearchHit>,
    sem_hits: Vec<SearchHit>,
    alpha: f64,
    k_final: usize,
) -> Vec<Candidate> {
    let mut merged: BTreeMap<i64, MergedRow> = BTreeMap::new();

    for hit in trgm_hits {
        merged
            .entry(hit.id)
            .or_insert_with(|| MergedRow { label: hit.label.clone(), trgm: None, sem: None })
            .trgm = Some(hit.score);
    }

    let mut dropped = false;
    for hit in sem_hits {
        match merged.get_mut(&hit.id) {
            Some(row) if row.label != hit.label => {
                warn!(
                    id = hit.id,
                    trgm_label = %row.label,
                    sem_label = %hit.label,
                    "dropping candidate: trigram and semantic channels disagree on label for the same id"
                );
                dropped = true;
                row.sem = None;
                row.trgm = None;
            }
            Some(row) => row.sem = Some(hit.score),
            None => {
                merged.insert(hit.id, MergedRow { label: hit.label, trgm: None, sem: Some(hit.score) });
            }
        }
    }
    let _ = dropped;

    let mut candidates: Vec<Candidate> = merged
        .into_iter()
        .filter(|(_, row)| row.trgm.is_some() || row.sem.is_some())
        .map(|(id, row)| {
            let trgm_sim = row.trgm.unwrap_or(0.0);
            let sem_sim = row.sem.unwrap_or(0.0);
            Candidate {
                id,
                label: row.label,
                trgm_sim,
                sem_sim,
                blend: alpha * trgm_sim + (1.0 - alpha) * sem_sim,
                metadata: CandidateMetadata::default(),
            }
        })
        .collect();

    Candidate::sort_by_rank(&mut candidates);
    candidates.truncate(k_final);
    candidates
}
