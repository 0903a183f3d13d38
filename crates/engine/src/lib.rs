//! Reconciliation service façade (spec §4.7): ties the strategy registry,
//! hybrid blender, property-filtered query layer, taxa orchestrator, and
//! optional LLM rerank stage into the eight operations the wire protocol
//! exposes.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod automatch;
pub mod blender;
pub mod property_filter;
pub mod registry;
pub mod taxa;

pub use registry::EntityStrategyRegistry;

use reconcile_core::config::Config;
use reconcile_core::entities::{BibliographicMode, Candidate, EntityTypeDescriptor};
use reconcile_core::entity_id::EntityId;
use reconcile_core::error::{Error, Result};
use reconcile_core::normalize::normalize;
use reconcile_core::search_models::{
    BatchRequest, BatchResponse, EntityTypeRef, EntityTypeSummary, PreviewResponse,
    PreviewTemplate, PropertiesResponse, PropertyConstraint, QueryResult, QuerySpec,
    ResponseCandidate, ServiceMetadata, SuggestEndpoints, SuggestEntityResult, SuggestPropertyResult,
    SuggestTypeResult, ViewTemplate,
};
use reconcile_embeddings::EmbeddingManager;
use reconcile_llm_rerank::{rerank_top_candidates, RerankProvider};
use reconcile_storage::AuthorityStore;
use std::str::FromStr;
use std::sync::Arc;
use taxa::ParsedMention;
use tracing::warn;

/// Name the taxa orchestrator dispatches through; `entities` config must
/// also register `"genus"` and `"species"` descriptors when this entity
/// type is present (spec §4.10).
const TAXON_ENTITY_NAME: &str = "taxon";
const TAXON_GENUS_NAME: &str = "genus";
const TAXON_SPECIES_NAME: &str = "species";

pub struct ReconciliationEngine {
    config: Config,
    store: Arc<dyn AuthorityStore>,
    embeddings: Arc<EmbeddingManager>,
    rerank: Option<Arc<dyn RerankProvider>>,
    registry: EntityStrategyRegistry,
}

impl ReconciliationEngine {
    pub fn new(
        config: Config,
        store: Arc<dyn AuthorityStore>,
        embeddings: Arc<EmbeddingManager>,
        rerank: Option<Arc<dyn RerankProvider>>,
    ) -> Self {
        let registry = EntityStrategyRegistry::new(config.entities.clone());
        Self { config, store, embeddings, rerank, registry }
    }

    /// Splits `"base:mode"` entity type names used to select a bibliographic
    /// search column (spec §4.6 "special cases are bibliographic").
    fn resolve_entity_type(&self, raw: &str) -> Result<(EntityTypeDescriptor, Option<BibliographicMode>)> {
        if let Some((base, mode_str)) = raw.split_once(':') {
            let descriptor = self.registry.get(base)?.clone();
            let mode = BibliographicMode::from_str(mode_str)
                .map_err(|_| Error::invalid_query(format!("unknown bibliographic mode: {mode_str}")))?;
            Ok((descriptor, Some(mode)))
        } else {
            Ok((self.registry.get(raw)?.clone(), None))
        }
    }

    /// Runs every sub-query in `batch` and returns results keyed and ordered
    /// exactly as the request (spec §5, §6, testable property 8). A single
    /// sub-query's failure never aborts the rest of the batch.
    pub async fn reconcile(&self, batch: BatchRequest) -> BatchResponse {
        let mut response = BatchResponse::new();
        for (key, spec) in batch {
            let result = match self.reconcile_one(&spec).await {
                Ok(candidates) => candidates,
                Err(err) => {
                    warn!(key = %key, error = %err, "sub-query failed, returning empty result");
                    QueryResult { result: Vec::new() }
                }
            };
            response.insert(key, result);
        }
        response
    }

    async fn reconcile_one(&self, spec: &QuerySpec) -> Result<QueryResult> {
        let norm_query = normalize(&spec.query);
        if norm_query.is_empty() {
            return Ok(QueryResult { result: Vec::new() });
        }

        let Some(type_name) = &spec.entity_type else {
            return Err(Error::invalid_query("sub-query is missing a 'type'"));
        };
        let (entity_type, bibliographic_mode) = self.resolve_entity_type(type_name)?;
        let effective_type = self.apply_bibliographic_mode(&entity_type, bibliographic_mode);

        let limit = spec.limit.unwrap_or(self.config.default_query_limit).min(self.config.retrieval.k_final);

        let mut candidates = if entity_type.name == TAXON_ENTITY_NAME {
            self.reconcile_taxon(&spec.query, limit).await?
        } else {
            self.reconcile_simple(&effective_type, &spec.query, &norm_query, limit, &spec.properties).await?
        };

        if let Some(provider) = &self.rerank {
            let reranked = rerank_top_candidates(provider.as_ref(), &self.config.llm_rerank, &spec.query, candidates).await;
            candidates = reranked
                .into_iter()
                .map(|(mut c, confidence)| {
                    if let Some(confidence) = confidence {
                        c.metadata.extra.insert("llm_confidence".to_string(), serde_json::json!(confidence));
                    }
                    c
                })
                .collect();
        }

        let is_top_match = automatch::is_auto_match(&candidates, self.config.auto_match.threshold, self.config.auto_match.margin);
        let entity_type_ref = EntityTypeRef { id: entity_type.name.clone(), name: entity_type.display_name.clone() };

        let result: Vec<ResponseCandidate> = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let canonical_id = EntityId { entity_type: entity_type.name.clone(), id: c.id }
                    .to_uri(&self.config.identifier_space);
                let llm_confidence = c
                    .metadata
                    .extra
                    .get("llm_confidence")
                    .and_then(|v| v.as_f64());
                ResponseCandidate::from_candidate(
                    c,
                    canonical_id,
                    entity_type_ref.clone(),
                    i == 0 && is_top_match,
                    llm_confidence,
                )
            })
            .collect();

        Ok(QueryResult { result })
    }

    async fn reconcile_simple(
        &self,
        entity_type: &EntityTypeDescriptor,
        raw_query: &str,
        norm_query: &str,
        limit: usize,
        properties: &[PropertyConstraint],
    ) -> Result<Vec<Candidate>> {
        let trgm_hits = self.store.trigram_search(entity_type, norm_query, self.config.retrieval.k_trgm).await?;
        let sem_hits = match self.embeddings.embed_or_degrade(raw_query).await {
            Some(vector) => self.store.semantic_search(entity_type, &vector, self.config.retrieval.k_sem).await?,
            None => Vec::new(),
        };

        let (trgm_hits, sem_hits) = if properties.is_empty() {
            (trgm_hits, sem_hits)
        } else {
            let trgm_hits = property_filter::prefilter_hits(self.store.as_ref(), entity_type, trgm_hits, properties).await?;
            let sem_hits = property_filter::prefilter_hits(self.store.as_ref(), entity_type, sem_hits, properties).await?;
            (trgm_hits, sem_hits)
        };

        // Location strategies apply their configured `location_type_ids` as
        // an always-on structural restriction, not only when the caller
        // supplies a matching property constraint (spec §4.6).
        let (trgm_hits, sem_hits) = match &entity_type.location_type_ids {
            Some(ids) => (
                restrict_to_location_types(self.store.as_ref(), entity_type, trgm_hits, ids).await?,
                restrict_to_location_types(self.store.as_ref(), entity_type, sem_hits, ids).await?,
            ),
            None => (trgm_hits, sem_hits),
        };

        let candidates = blender::blend(trgm_hits, sem_hits, self.config.retrieval.blend_alpha, self.config.retrieval.k_final);

        if properties.is_empty() {
            let mut candidates = candidates;
            candidates.truncate(limit);
            Ok(candidates)
        } else {
            property_filter::apply_boosts(self.store.as_ref(), entity_type, candidates, properties, &self.config.property_filter)
                .await
                .map(|mut c| {
                    c.truncate(limit);
                    c
                })
        }
    }

    async fn reconcile_taxon(&self, raw_query: &str, limit: usize) -> Result<Vec<Candidate>> {
        let genus_type = self.registry.get(TAXON_GENUS_NAME)?.clone();
        let species_type = self.registry.get(TAXON_SPECIES_NAME)?.clone();
        let parsed: ParsedMention = taxa::parse_mention(raw_query);

        taxa::orchestrate(
            self.store.as_ref(),
            self.embeddings.as_ref(),
            &genus_type,
            &species_type,
            &parsed,
            limit,
            self.config.retrieval.blend_alpha,
            self.config.retrieval.k_trgm,
            self.config.retrieval.k_sem,
            &self.config.taxa,
        )
        .await
    }

    /// Remaps `label_column` to the column a bibliographic mode searches
    /// against; non-bibliographic lookups are returned unchanged.
    fn apply_bibliographic_mode(
        &self,
        entity_type: &EntityTypeDescriptor,
        mode: Option<BibliographicMode>,
    ) -> EntityTypeDescriptor {
        let Some(mode) = mode else {
            return entity_type.clone();
        };
        let column = match mode {
            BibliographicMode::FullReference => "full_reference",
            BibliographicMode::Title => "title",
            BibliographicMode::Authors => "authors",
            BibliographicMode::BugsReference => "bugs_reference",
            BibliographicMode::Word => "word",
            BibliographicMode::StrictWord => "strict_word",
        };
        let mut effective = entity_type.clone();
        effective.label_column = column.to_string();
        effective
    }

    pub async fn get_properties(&self, entity_type: Option<&str>, query: Option<&str>) -> Result<PropertiesResponse> {
        let descriptors: Vec<&EntityTypeDescriptor> = match entity_type {
            Some(name) => vec![self.registry.get(name)?],
            None => self.registry.iter().collect(),
        };
        let query_lower = query.map(str::to_lowercase);
        Ok(descriptors
            .into_iter()
            .flat_map(|d| d.properties.iter())
            .filter(|p| match &query_lower {
                Some(q) => p.name.to_lowercase().contains(q.as_str()) || p.description.to_lowercase().contains(q.as_str()),
                None => true,
            })
            .cloned()
            .collect())
    }

    pub async fn preview(&self, id: &str) -> Result<PreviewResponse> {
        let parsed = EntityId::parse(id, None)?;
        let entity_type = self.registry.get(&parsed.entity_type)?;
        let row = self
            .store
            .get_row(entity_type, parsed.id)
            .await?
            .ok_or_else(|| Error::not_found(format!("no {} row with id {}", entity_type.name, parsed.id)))?;

        Ok(PreviewResponse {
            id: parsed.to_uri(&self.config.identifier_space),
            label: row.label,
            description: None,
            entity_type: entity_type.name.clone(),
            extras: row
                .secondary_fields
                .into_iter()
                .map(|(k, v)| (k, serde_json::to_value(v).unwrap_or(serde_json::Value::Null)))
                .collect(),
        })
    }

    /// Same underlying lookup as [`Self::preview`]; the protocol exposes it
    /// under a second name for inline flyout rendering (spec §4.7).
    pub async fn flyout(&self, id: &str) -> Result<PreviewResponse> {
        self.preview(id).await
    }

    pub async fn suggest_entity(&self, prefix: &str, entity_type: Option<&str>) -> Result<Vec<SuggestEntityResult>> {
        let norm_prefix = normalize(prefix);
        if norm_prefix.is_empty() {
            return Ok(Vec::new());
        }
        let descriptors: Vec<&EntityTypeDescriptor> = match entity_type {
            Some(name) => vec![self.registry.get(name)?],
            None => self.registry.iter().collect(),
        };

        let mut out = Vec::new();
        for descriptor in descriptors {
            let hits = self.store.trigram_search(descriptor, &norm_prefix, self.config.default_query_limit).await?;
            out.extend(hits.into_iter().map(|hit| SuggestEntityResult {
                id: EntityId { entity_type: descriptor.name.clone(), id: hit.id }.to_uri(&self.config.identifier_space),
                name: hit.label,
                entity_type: vec![EntityTypeRef { id: descriptor.name.clone(), name: descriptor.display_name.clone() }],
            }));
        }
        Ok(out)
    }

    pub fn suggest_type(&self, prefix: &str) -> Vec<SuggestTypeResult> {
        self.registry
            .suggest_types(prefix)
            .into_iter()
            .map(|d| SuggestTypeResult { id: d.name.clone(), name: d.display_name.clone() })
            .collect()
    }

    pub fn suggest_property(&self, prefix: &str, entity_type: Option<&str>) -> Result<Vec<SuggestPropertyResult>> {
        let prefix_lower = prefix.to_lowercase();
        let descriptors: Vec<&EntityTypeDescriptor> = match entity_type {
            Some(name) => vec![self.registry.get(name)?],
            None => self.registry.iter().collect(),
        };
        Ok(descriptors
            .into_iter()
            .flat_map(|d| d.properties.iter())
            .filter(|p| p.name.to_lowercase().starts_with(&prefix_lower))
            .map(|p| SuggestPropertyResult { id: p.id.clone(), name: p.name.clone() })
            .collect())
    }

    pub fn metadata(&self) -> ServiceMetadata {
        let base = self.config.identifier_space.trim_end_matches('/');
        ServiceMetadata {
            name: "SEAD entity reconciliation service".to_string(),
            identifier_space: self.config.identifier_space.clone(),
            schema_space: format!("{base}/schema"),
            default_types: self
                .registry
                .iter()
                .map(|d| EntityTypeSummary { id: d.name.clone(), name: d.display_name.clone() })
                .collect(),
            view: ViewTemplate { url: format!("{base}/view?id={{{{id}}}}") },
            preview: PreviewTemplate { url: format!("{base}/preview?id={{{{id}}}}"), width: 320, height: 120 },
            suggest: SuggestEndpoints {
                entity: format!("{base}/suggest/entity"),
                entity_type: format!("{base}/suggest/type"),
                property: format!("{base}/suggest/property"),
            },
        }
    }
}

async fn restrict_to_location_types(
    store: &dyn AuthorityStore,
    entity_type: &EntityTypeDescriptor,
    hits: Vec<reconcile_storage::SearchHit>,
    location_type_ids: &[i64],
) -> Result<Vec<reconcile_storage::SearchHit>> {
    if hits.is_empty() {
        return Ok(hits);
    }
    let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
    let rows = store.get_rows(entity_type, &ids).await?;
    let allowed: std::collections::HashSet<i64> = rows
        .into_iter()
        .filter(|row| {
            row.secondary_fields
                .get("location_type_id")
                .and_then(|v| v.as_f64())
                .map(|v| location_type_ids.contains(&(v as i64)))
                .unwrap_or(false)
        })
        .map(|row| row.id)
        .collect();
    Ok(hits.into_iter().filter(|h| allowed.contains(&h.id)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile_core::config::{Config, EmbeddingConfig, StorageConfig};
    use reconcile_core::entities::{AuthorityRow, PropertyValue};
    use reconcile_embeddings::{EmbeddingManager, MockEmbeddingProvider};
    use reconcile_llm_rerank::MockRerankProvider;
    use reconcile_storage::MockAuthorityStore;
    use std::collections::BTreeMap;

    fn site_descriptor() -> EntityTypeDescriptor {
        EntityTypeDescriptor {
            name: "site".to_string(),
            display_name: "Site".to_string(),
            table: "tbl_locations".to_string(),
            id_column: "location_id".to_string(),
            label_column: "location_name".to_string(),
            secondary_fields: vec![],
            properties: vec![],
            location_type_ids: None,
        }
    }

    fn row(id: i64, label: &str) -> AuthorityRow {
        AuthorityRow {
            id,
            label: label.to_string(),
            norm_label: normalize(label),
            secondary_fields: BTreeMap::new(),
        }
    }

    fn test_config() -> Config {
        Config::builder(StorageConfig::default())
            .embedding(EmbeddingConfig::default())
            .entities(vec![site_descriptor()])
            .build()
    }

    fn build_engine(store: MockAuthorityStore) -> ReconciliationEngine {
        let embeddings = Arc::new(EmbeddingManager::new(Arc::new(MockEmbeddingProvider::new(4)), &EmbeddingConfig::default()));
        ReconciliationEngine::new(test_config(), Arc::new(store), embeddings, None)
    }

    #[tokio::test]
    async fn reconcile_returns_results_in_request_key_order() {
        let store = MockAuthorityStore::new().with_rows("site", vec![row(1, "Uppsala"), row(2, "Stockholm")]);
        let engine = build_engine(store);

        let mut batch = BatchRequest::new();
        batch.insert("b".to_string(), QuerySpec { query: "Stockholm".to_string(), entity_type: Some("site".to_string()), limit: None, properties: vec![] });
        batch.insert("a".to_string(), QuerySpec { query: "Uppsala".to_string(), entity_type: Some("site".to_string()), limit: None, properties: vec![] });

        let response = engine.reconcile(batch).await;
        let keys: Vec<&str> = response.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn unknown_entity_type_yields_empty_result_not_batch_failure() {
        let store = MockAuthorityStore::new();
        let engine = build_engine(store);
        let mut batch = BatchRequest::new();
        batch.insert("x".to_string(), QuerySpec { query: "anything".to_string(), entity_type: Some("nonexistent".to_string()), limit: None, properties: vec![] });
        let response = engine.reconcile(batch).await;
        assert!(response["x"].result.is_empty());
    }

    #[tokio::test]
    async fn empty_query_yields_empty_result() {
        let store = MockAuthorityStore::new().with_rows("site", vec![row(1, "Uppsala")]);
        let engine = build_engine(store);
        let mut batch = BatchRequest::new();
        batch.insert("x".to_string(), QuerySpec { query: "   ".to_string(), entity_type: Some("site".to_string()), limit: None, properties: vec![] });
        let response = engine.reconcile(batch).await;
        assert!(response["x"].result.is_empty());
    }

    #[tokio::test]
    async fn top_candidate_carries_canonical_uri() {
        let store = MockAuthorityStore::new().with_rows("site", vec![row(1, "Uppsala")]);
        let engine = build_engine(store);
        let mut batch = BatchRequest::new();
        batch.insert("x".to_string(), QuerySpec { query: "Uppsala".to_string(), entity_type: Some("site".to_string()), limit: None, properties: vec![] });
        let response = engine.reconcile(batch).await;
        let candidates = &response["x"].result;
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].id.ends_with("/site/1"));
    }

    #[tokio::test]
    async fn metadata_lists_registered_entity_types() {
        let store = MockAuthorityStore::new();
        let engine = build_engine(store);
        let metadata = engine.metadata();
        assert_eq!(metadata.default_types.len(), 1);
        assert_eq!(metadata.default_types[0].id, "site");
    }

    #[test]
    fn suggest_type_filters_by_prefix() {
        let store = MockAuthorityStore::new();
        let engine = build_engine(store);
        let results = engine.suggest_type("si");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "site");
    }

    #[tokio::test]
    async fn preview_not_found_is_an_error() {
        let store = MockAuthorityStore::new();
        let engine = build_engine(store);
        let result = engine.preview(&format!("{}/site/999", engine.config.identifier_space)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn llm_rerank_provider_attaches_confidence() {
        let store = MockAuthorityStore::new().with_rows("site", vec![row(1, "Uppsala"), row(2, "Uppsalla")]);
        let embeddings = Arc::new(EmbeddingManager::new(Arc::new(MockEmbeddingProvider::new(4)), &EmbeddingConfig::default()));
        let mut config = test_config();
        config.llm_rerank.enabled = true;
        let engine = ReconciliationEngine::new(config, Arc::new(store), embeddings, Some(Arc::new(MockRerankProvider)));

        let mut batch = BatchRequest::new();
        batch.insert("x".to_string(), QuerySpec { query: "Uppsala".to_string(), entity_type: Some("site".to_string()), limit: None, properties: vec![] });
        let response = engine.reconcile(batch).await;
        assert!(!response["x"].result.is_empty());
    }

    #[test]
    fn bibliographic_mode_remaps_label_column() {
        let store = MockAuthorityStore::new();
        let mut config = test_config();
        config.entities.push(EntityTypeDescriptor {
            name: "bibliographic_reference".to_string(),
            display_name: "Bibliographic reference".to_string(),
            table: "tbl_dendro_references".to_string(),
            id_column: "biblio_id".to_string(),
            label_column: "full_reference".to_string(),
            secondary_fields: vec![],
            properties: vec![],
            location_type_ids: None,
        });
        let embeddings = Arc::new(EmbeddingManager::new(Arc::new(MockEmbeddingProvider::new(4)), &EmbeddingConfig::default()));
        let engine = ReconciliationEngine::new(config, Arc::new(store), embeddings, None);

        let (descriptor, mode) = engine.resolve_entity_type("bibliographic_reference:title").unwrap();
        assert_eq!(mode, Some(BibliographicMode::Title));
        let effective = engine.apply_bibliographic_mode(&descriptor, mode);
        assert_eq!(effective.label_column, "title");
    }
}
