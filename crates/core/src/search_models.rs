//! Wire-protocol-facing request/response shapes (spec §6).
//!
//! These mirror the reconciliation protocol directly; `entities.rs` holds the
//! engine-internal domain types these are built from.

use crate::entities::{Candidate, CandidateMetadata, PropertyDescriptor, PropertyValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One property constraint attached to a sub-query (`{pid, v}` per spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PropertyConstraint {
    pub pid: String,
    pub v: PropertyValue,
}

/// A single sub-query inside a reconcile batch (spec §3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct QuerySpec {
    pub query: String,
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub properties: Vec<PropertyConstraint>,
}

/// Ordered batch request; insertion order of keys is preserved end to end
/// (spec §3, §5, testable property 8).
pub type BatchRequest = IndexMap<String, QuerySpec>;

/// An `{id, name}` pair identifying an entity type on a candidate (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EntityTypeRef {
    pub id: String,
    pub name: String,
}

/// Protocol-facing candidate shape (spec §6): `score` is `blend * 100`,
/// `match` is the auto-match decision from the reconciliation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ResponseCandidate {
    pub id: String,
    pub name: String,
    pub score: f64,
    #[serde(rename = "match")]
    pub is_match: bool,
    #[serde(rename = "type")]
    pub entity_type: Vec<EntityTypeRef>,
    #[serde(skip_serializing_if = "CandidateMetadata::is_empty", default)]
    pub metadata: CandidateMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_confidence: Option<f64>,
}

impl ResponseCandidate {
    /// Build a protocol candidate from an internal [`Candidate`]; the
    /// auto-match decision and entity type tag are supplied by the caller
    /// since they depend on the whole ranked list and the strategy invoked,
    /// not on any one candidate in isolation.
    pub fn from_candidate(
        candidate: &Candidate,
        canonical_id: String,
        entity_type: EntityTypeRef,
        is_match: bool,
        llm_confidence: Option<f64>,
    ) -> Self {
        Self {
            id: canonical_id,
            name: candidate.label.clone(),
            score: candidate.blend * 100.0,
            is_match,
            entity_type: vec![entity_type],
            metadata: candidate.metadata.clone(),
            llm_confidence,
        }
    }
}

/// Result wrapper for a single sub-query (`{result: [...]}` per spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct QueryResult {
    pub result: Vec<ResponseCandidate>,
}

/// Ordered batch response; keys are exactly the request keys (spec §3,
/// testable property 8).
pub type BatchResponse = IndexMap<String, QueryResult>;

/// `get_properties` result entry.
pub type PropertiesResponse = Vec<PropertyDescriptor>;

/// `preview`/`flyout` structured response (spec §4.6, §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PreviewResponse {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub extras: std::collections::BTreeMap<String, serde_json::Value>,
}

/// Autocomplete candidate (spec §4.7 `suggest_entity`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SuggestEntityResult {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: Vec<EntityTypeRef>,
}

/// Entity-type autocomplete result (spec §4.7 `suggest_type`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SuggestTypeResult {
    pub id: String,
    pub name: String,
}

/// Property autocomplete result (spec §4.7 `suggest_property`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SuggestPropertyResult {
    pub id: String,
    pub name: String,
}

/// Suggest endpoint URL templates exposed in service metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SuggestEndpoints {
    pub entity: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub property: String,
}

/// A single registered entity type as it appears in service metadata
/// (`default_entity-type list with id and display name`, spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EntityTypeSummary {
    pub id: String,
    pub name: String,
}

/// Static service descriptor returned verbatim by `metadata()` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ServiceMetadata {
    pub name: String,
    pub identifier_space: String,
    pub schema_space: String,
    pub default_types: Vec<EntityTypeSummary>,
    pub view: ViewTemplate,
    pub preview: PreviewTemplate,
    pub suggest: SuggestEndpoints,
}

/// `<base>/preview?id={id}` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ViewTemplate {
    pub url: String,
}

/// Inline-flyout preview template with size hints (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PreviewTemplate {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_request_preserves_insertion_order() {
        let mut batch: BatchRequest = IndexMap::new();
        batch.insert(
            "q1".to_string(),
            QuerySpec {
                query: "Stockholm".to_string(),
                entity_type: Some("location".to_string()),
                limit: None,
                properties: vec![],
            },
        );
        batch.insert(
            "q0".to_string(),
            QuerySpec {
                query: "Uppsala".to_string(),
                entity_type: Some("site".to_string()),
                limit: None,
                properties: vec![],
            },
        );
        let keys: Vec<&str> = batch.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["q1", "q0"]);
    }

    #[test]
    fn query_spec_deserializes_protocol_shape() {
        let json = r#"{"query": "Acer platanoides", "type": "taxon", "limit": 5,
                        "properties": [{"pid": "country", "v": "Sweden"}]}"#;
        let spec: QuerySpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.query, "Acer platanoides");
        assert_eq!(spec.entity_type.as_deref(), Some("taxon"));
        assert_eq!(spec.limit, Some(5));
        assert_eq!(spec.properties[0].pid, "country");
    }

    #[test]
    fn response_candidate_score_is_blend_times_100() {
        let candidate = Candidate {
            id: 1,
            label: "Stockholm".to_string(),
            trgm_sim: 0.95,
            sem_sim: 0.95,
            blend: 0.95,
            metadata: CandidateMetadata::default(),
        };
        let response = ResponseCandidate::from_candidate(
            &candidate,
            "https://leibnizsead.se/authority/location/1".to_string(),
            EntityTypeRef {
                id: "location".to_string(),
                name: "Location".to_string(),
            },
            true,
            None,
        );
        assert_eq!(response.score, 95.0);
        assert!(response.is_match);
    }
}
