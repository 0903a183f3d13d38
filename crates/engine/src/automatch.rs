//! Auto-match decision (spec §4.7): a sub-query's top candidate is an
//! auto-match iff its `blend` clears the configured threshold AND its
//! margin over the runner-up clears the configured margin.

use reconcile_core::entities::Candidate;

/// `candidates` must already be sorted `(blend desc, label asc)`.
pub fn is_auto_match(candidates: &[Candidate], threshold: f64, margin: f64) -> bool {
    let Some(top) = candidates.first() else {
        return false;
    };
    if top.blend < threshold {
        return false;
    }
    match candidates.get(1) {
        Some(runner_up) => (top.blend - runner_up.blend) > margin,
        None => true,
    }
}
