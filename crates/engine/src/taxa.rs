//! Taxa orchestrator (spec §4.10): parses a taxon mention into qualifier,
//! rank, and alternatives, dispatches to the genus/species strategies, and
//! enriches species-level candidates with their genus/family/order.

use reconcile_core::config::TaxaConfig;
use reconcile_core::entities::{Candidate, EntityTypeDescriptor};
use reconcile_core::error::Result;
use reconcile_embeddings::EmbeddingManager;
use reconcile_storage::AuthorityStore;

const QUALIFIER_TOKENS: &[&str] = &["cf.", "aff.", "?"];
const INDETERMINATE_TOKENS: &[&str] = &["sp.", "spp.", "indet."];

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLevel {
    /// Single genus token, or a genus flagged indeterminate (`Quercus sp.`).
    Genus { genus: String, indeterminate: bool },
    /// `{genus} {specific epithet} [author...]`.
    Species { genus: String, epithet: String, author: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMention {
    pub qualifier: Option<String>,
    pub alternatives: Vec<String>,
    pub level: ParsedLevel,
}

/// Parses a raw taxon mention (spec §4.10 "parsing"):
/// 1. strip/detect a leading or trailing qualifier (`cf.`, `aff.`, `?`),
/// 2. split the remainder on `/` for alternative genus identifications,
/// 3. tokenize and classify rank (genus vs. species) per alternative.
///
/// Only the first alternative's rank governs dispatch; a split mention is
/// assumed to name alternative genera at the same rank (spec §4.10 "split").
pub fn parse_mention(mention: &str) -> ParsedMention {
    let trimmed = mention.trim();

    let mut qualifier = None;
    let mut remainder = trimmed.to_string();
    for q in QUALIFIER_TOKENS {
        if let Some(stripped) = strip_qualifier_token(&remainder, q) {
            qualifier = Some((*q).to_string());
            remainder = stripped;
            break;
        }
    }

    if remainder.contains('/') {
        let alternatives: Vec<String> = remainder
            .split('/')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let level = classify(&alternatives[0]);
        return ParsedMention { qualifier, alternatives, level };
    }

    let level = classify(&remainder);
    ParsedMention { qualifier, alternatives: vec![remainder], level }
}

fn strip_qualifier_token(text: &str, token: &str) -> Option<String> {
    let lower = text.to_lowercase();
    let token_lower = token.to_lowercase();
    if let Some(rest) = lower.strip_prefix(&token_lower) {
        return Some(text[text.len() - rest.len()..].trim().to_string());
    }
    if let Some(rest) = lower.strip_suffix(&token_lower) {
        return Some(text[..rest.len()].trim().to_string());
    }
    None
}

fn classify(text: &str) -> ParsedLevel {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    match tokens.len() {
        0 => ParsedLevel::Genus { genus: String::new(), indeterminate: false },
        1 => ParsedLevel::Genus { genus: tokens[0].to_string(), indeterminate: false },
        _ => {
            let second_lower = tokens[1].to_lowercase();
            if tokens.len() == 2 && INDETERMINATE_TOKENS.contains(&second_lower.as_str()) {
                ParsedLevel::Genus { genus: tokens[0].to_string(), indeterminate: true }
            } else {
                let author = if tokens.len() > 2 { Some(tokens[2..].join(" ")) } else { None };
                ParsedLevel::Species {
                    genus: tokens[0].to_string(),
                    epithet: tokens[1].to_string(),
                    author,
                }
            }
        }
    }
}

/// Dispatches a parsed mention against the genus and species strategies,
/// applying cascade, qualifier dampening, and split-identification union
/// (spec §4.10 "dispatch").
#[allow(clippy::too_many_arguments)]
pub async fn orchestrate(
    store: &dyn AuthorityStore,
    embeddings: &EmbeddingManager,
    genus_type: &EntityTypeDescriptor,
    species_type: &EntityTypeDescriptor,
    parsed: &ParsedMention,
    limit: usize,
    alpha: f64,
    k_trgm: usize,
    k_sem: usize,
    config: &TaxaConfig,
) -> Result<Vec<Candidate>> {
    let mut candidates = if parsed.alternatives.len() > 1 {
        dispatch_split(store, embeddings, genus_type, species_type, parsed, limit, alpha, k_trgm, k_sem, config).await?
    } else {
        dispatch_single(store, embeddings, genus_type, species_type, &parsed.level, limit, alpha, k_trgm, k_sem, config).await?
    };

    if let Some(qualifier) = &parsed.qualifier {
        for candidate in &mut candidates {
            candidate.blend *= config.qualifier_dampening;
            candidate.metadata.uncertainty = Some(qualifier.clone());
        }
        Candidate::sort_by_rank(&mut candidates);
    }

    Ok(candidates)
}

#[allow(clippy::too_many_arguments)]
async fn dispatch_single(
    store: &dyn AuthorityStore,
    embeddings: &EmbeddingManager,
    genus_type: &EntityTypeDescriptor,
    species_type: &EntityTypeDescriptor,
    level: &ParsedLevel,
    limit: usize,
    alpha: f64,
    k_trgm: usize,
    k_sem: usize,
    config: &TaxaConfig,
) -> Result<Vec<Candidate>> {
    match level {
        ParsedLevel::Genus { genus, .. } => {
            let mut candidates =
                search_entity(store, embeddings, genus_type, genus, limit, alpha, k_trgm, k_sem).await?;
            for c in &mut candidates {
                c.metadata.rank = Some("genus".to_string());
                c.metadata.genus = Some(genus.clone());
            }
            Ok(candidates)
        }
        ParsedLevel::Species { genus, epithet, .. } => {
            let query = format!("{genus} {epithet}");
            let mut candidates =
                search_entity(store, embeddings, species_type, &query, limit, alpha, k_trgm, k_sem).await?;

            let top_blend = candidates.first().map(|c| c.blend).unwrap_or(0.0);
            if top_blend < config.cascade_threshold {
                let mut cascaded =
                    search_entity(store, embeddings, genus_type, genus, limit, alpha, k_trgm, k_sem).await?;
                for c in &mut cascaded {
                    c.metadata.matched_at = Some("genus".to_string());
                    c.metadata.original_level = Some("species".to_string());
                    c.metadata.rank = Some("genus".to_string());
                    c.metadata.genus = Some(genus.clone());
                }
                candidates = cascaded;
            } else {
                for c in &mut candidates {
                    c.metadata.matched_at = Some("species".to_string());
                    c.metadata.rank = Some("species".to_string());
                    c.metadata.genus = Some(genus.clone());
                    c.metadata.species = Some(epithet.clone());
                }
                enrich_hierarchy(store, genus_type, &mut candidates, genus).await;
            }
            Ok(candidates)
        }
    }
}

/// Attaches genus/family/order to species candidates via a single lookup of
/// the genus row (spec §4.10 "hierarchy enrichment"). A failed or missing
/// lookup leaves candidates with the rank/genus/species tags already set,
/// just without family/order.
async fn enrich_hierarchy(
    store: &dyn AuthorityStore,
    genus_type: &EntityTypeDescriptor,
    candidates: &mut [Candidate],
    genus: &str,
) {
    let hierarchy = match store.fetch_by_label(genus_type, genus).await {
        Ok(row) => row,
        Err(e) => {
            tracing::warn!(genus, error = %e, "taxon hierarchy lookup failed; keeping candidates unenriched");
            return;
        }
    };
    let Some(row) = hierarchy else {
        return;
    };
    let family = row.secondary_fields.get("family").and_then(|v| v.as_str()).map(str::to_string);
    let order = row.secondary_fields.get("order").and_then(|v| v.as_str()).map(str::to_string);
    for c in candidates.iter_mut() {
        c.metadata.family = family.clone();
        c.metadata.order = order.clone();
    }
}

#[allow(clippy::too_many_arguments)]
async fn dispatch_split(
    store: &dyn AuthorityStore,
    embeddings: &EmbeddingManager,
    genus_type: &EntityTypeDescriptor,
    species_type: &EntityTypeDescriptor,
    parsed: &ParsedMention,
    limit: usize,
    alpha: f64,
    k_trgm: usize,
    k_sem: usize,
    config: &TaxaConfig,
) -> Result<Vec<Candidate>> {
    let per_alt_limit = (limit / 2).max(1);
    let mut union = Vec::new();
    for alt in &parsed.alternatives {
        let level = classify(alt);
        let mut hits = dispatch_single(
            store, embeddings, genus_type, species_type, &level, per_alt_limit, alpha, k_trgm, k_sem, config,
        )
        .await?;
        for h in &mut hits {
            h.metadata.split_identification = Some(parsed.alternatives.join("/"));
        }
        union.extend(hits);
    }
    Candidate::sort_by_rank(&mut union);
    union.truncate(limit);
    Ok(union)
}

async fn search_entity(
    store: &dyn AuthorityStore,
    embeddings: &EmbeddingManager,
    entity_type: &EntityTypeDescriptor,
    query: &str,
    limit: usize,
    alpha: f64,
    k_trgm: usize,
    k_sem: usize,
) -> Result<Vec<Candidate>> {
    let norm_query = reconcile_core::normalize::normalize(query);
    let trgm_hits = store.trigram_search(entity_type, &norm_query, k_trgm).await?;
    let sem_hits = match embeddings.embed_or_degrade(query).await {
        Some(vector) => store.semantic_search(entity_type, &vector, k_sem).await?,
        None => Vec::new(),
    };
    Ok(crate::blender::blend(trgm_hits, sem_hits, alpha, limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_token_is_genus() {
        let parsed = parse_mention("Quercus");
        assert_eq!(parsed.level, ParsedLevel::Genus { genus: "Quercus".into(), indeterminate: false });
        assert!(parsed.qualifier.is_none());
    }

    #[test]
    fn genus_sp_is_indeterminate_genus() {
        let parsed = parse_mention("Quercus sp.");
        assert_eq!(parsed.level, ParsedLevel::Genus { genus: "Quercus".into(), indeterminate: true });
    }

    #[test]
    fn two_tokens_is_species() {
        let parsed = parse_mention("Quercus robur");
        assert_eq!(
            parsed.level,
            ParsedLevel::Species { genus: "Quercus".into(), epithet: "robur".into(), author: None }
        );
    }

    #[test]
    fn trailing_author_is_captured() {
        let parsed = parse_mention("Quercus robur L.");
        match parsed.level {
            ParsedLevel::Species { author, .. } => assert_eq!(author.as_deref(), Some("L.")),
            _ => panic!("expected species"),
        }
    }

    #[test]
    fn leading_qualifier_is_stripped() {
        let parsed = parse_mention("cf. Quercus robur");
        assert_eq!(parsed.qualifier.as_deref(), Some("cf."));
        assert_eq!(
            parsed.level,
            ParsedLevel::Species { genus: "Quercus".into(), epithet: "robur".into(), author: None }
        );
    }

    #[test]
    fn split_identification_yields_two_alternatives() {
        let parsed = parse_mention("Quercus/Fagus robur");
        assert_eq!(parsed.alternatives, vec!["Quercus", "Fagus robur"]);
    }

    use reconcile_core::config::EmbeddingConfig;
    use reconcile_core::entities::{AuthorityRow, PropertyValue};
    use reconcile_embeddings::{EmbeddingManager, MockEmbeddingProvider};
    use reconcile_storage::MockAuthorityStore;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn genus_descriptor() -> EntityTypeDescriptor {
        EntityTypeDescriptor {
            name: "genus".to_string(),
            display_name: "Genus".to_string(),
            table: "tbl_taxa_genus".to_string(),
            id_column: "genus_id".to_string(),
            label_column: "genus_name".to_string(),
            secondary_fields: vec!["family".to_string(), "order".to_string()],
            properties: vec![],
            location_type_ids: None,
        }
    }

    fn species_descriptor() -> EntityTypeDescriptor {
        EntityTypeDescriptor {
            name: "species".to_string(),
            display_name: "Species".to_string(),
            table: "tbl_taxa_species".to_string(),
            id_column: "species_id".to_string(),
            label_column: "species_name".to_string(),
            secondary_fields: vec![],
            properties: vec![],
            location_type_ids: None,
        }
    }

    fn row(id: i64, label: &str) -> AuthorityRow {
        AuthorityRow {
            id,
            label: label.to_string(),
            norm_label: reconcile_core::normalize::normalize(label),
            secondary_fields: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn species_match_is_tagged_with_rank_genus_species_and_hierarchy() {
        let mut genus_row = row(1, "Acer");
        genus_row
            .secondary_fields
            .insert("family".to_string(), PropertyValue::String("Sapindaceae".to_string()));
        genus_row
            .secondary_fields
            .insert("order".to_string(), PropertyValue::String("Sapindales".to_string()));

        let store = MockAuthorityStore::new()
            .with_rows("genus", vec![genus_row])
            .with_rows("species", vec![row(10, "Acer platanoides")]);
        let embeddings = Arc::new(EmbeddingManager::new(Arc::new(MockEmbeddingProvider::new(4)), &EmbeddingConfig::default()));
        let config = TaxaConfig::default();

        let parsed = parse_mention("Acer platanoides L.");
        let candidates = orchestrate(
            &store,
            &embeddings,
            &genus_descriptor(),
            &species_descriptor(),
            &parsed,
            10,
            0.5,
            30,
            30,
            &config,
        )
        .await
        .unwrap();

        assert!(!candidates.is_empty());
        let top = &candidates[0];
        assert_eq!(top.metadata.rank.as_deref(), Some("species"));
        assert_eq!(top.metadata.matched_at.as_deref(), Some("species"));
        assert_eq!(top.metadata.genus.as_deref(), Some("Acer"));
        assert_eq!(top.metadata.species.as_deref(), Some("platanoides"));
        assert_eq!(top.metadata.family.as_deref(), Some("Sapindaceae"));
        assert_eq!(top.metadata.order.as_deref(), Some("Sapindales"));
    }

    #[tokio::test]
    async fn indeterminate_genus_is_tagged_with_rank_genus() {
        let store = MockAuthorityStore::new().with_rows("genus", vec![row(1, "Acer")]);
        let embeddings = Arc::new(EmbeddingManager::new(Arc::new(MockEmbeddingProvider::new(4)), &EmbeddingConfig::default()));
        let config = TaxaConfig::default();

        let parsed = parse_mention("Acer sp.");
        let candidates = orchestrate(
            &store,
            &embeddings,
            &genus_descriptor(),
            &species_descriptor(),
            &parsed,
            10,
            0.5,
            30,
            30,
            &config,
        )
        .await
        .unwrap();

        assert!(!candidates.is_empty());
        assert_eq!(candidates[0].metadata.rank.as_deref(), Some("genus"));
        assert_eq!(candidates[0].metadata.genus.as_deref(), Some("Acer"));
    }

    #[tokio::test]
    async fn low_confidence_species_match_cascades_to_genus() {
        let store = MockAuthorityStore::new()
            .with_rows("genus", vec![row(1, "Acer")])
            .with_rows("species", vec![row(10, "Quercus robur")]);
        let embeddings = Arc::new(EmbeddingManager::new(Arc::new(MockEmbeddingProvider::new(4)), &EmbeddingConfig::default()));
        let config = TaxaConfig::default();

        let parsed = parse_mention("Acer nonexistent");
        let candidates = orchestrate(
            &store,
            &embeddings,
            &genus_descriptor(),
            &species_descriptor(),
            &parsed,
            10,
            0.5,
            30,
            30,
            &config,
        )
        .await
        .unwrap();

        assert!(!candidates.is_empty());
        assert_eq!(candidates[0].metadata.matched_at.as_deref(), Some("genus"));
        assert_eq!(candidates[0].metadata.original_level.as_deref(), Some("species"));
        assert_eq!(candidates[0].metadata.rank.as_deref(), Some("genus"));
    }
}
