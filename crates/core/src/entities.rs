//! Domain model for authority records, entity types, and search candidates (spec §3).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::{Display, EnumString};

/// A property value attached to a query or to an authority row's secondary fields.
/// Strings, numbers, and dates are the only property types the system declares
/// (spec §4.9, §6 "Properties descriptor").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Number(f64),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Number(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::String(s) => s.parse().ok(),
        }
    }
}

/// Declared type of a property descriptor (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PropertyType {
    String,
    Number,
    Date,
}

/// One property an entity type's strategy exposes for filtering/boosting (spec §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PropertyDescriptor {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    pub description: String,
}

/// Immutable row read from an authority table (spec §3).
///
/// `norm_label` is a deterministic function of `label` (see
/// [`crate::normalize::normalize`]) and is expected to already be stored
/// alongside the row by the ingestion pipeline the engine does not own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityRow {
    pub id: i64,
    pub label: String,
    pub norm_label: String,
    #[serde(default)]
    pub secondary_fields: BTreeMap<String, PropertyValue>,
}

/// A row from the embedding side-table, keyed by authority row id (spec §3).
/// Every id here is expected to exist in the authority relation; the converse
/// is permitted to fail (rows may simply lack an embedding).
#[derive(Debug, Clone)]
pub struct EmbeddingRow {
    pub id: i64,
    pub embedding: Vec<f32>,
}

/// Flags and auxiliary context attached to a candidate by the taxa orchestrator
/// or the property-filtered query layer (spec §4.9, §4.10).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CandidateMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uncertainty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_identification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genus: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_field: Option<String>,
    /// Catch-all for strategy-specific extras not covered by the named fields above.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl CandidateMetadata {
    pub fn is_empty(&self) -> bool {
        self.matched_at.is_none()
            && self.original_level.is_none()
            && self.uncertainty.is_none()
            && self.split_identification.is_none()
            && self.genus.is_none()
            && self.species.is_none()
            && self.rank.is_none()
            && self.family.is_none()
            && self.order.is_none()
            && self.matched_field.is_none()
            && self.extra.is_empty()
    }
}

/// A scored retrieval candidate (spec §3). Ordered by `blend` descending,
/// stable tie-break by `label` ascending (testable property 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Candidate {
    pub id: i64,
    pub label: String,
    pub trgm_sim: f64,
    pub sem_sim: f64,
    pub blend: f64,
    #[serde(skip_serializing_if = "CandidateMetadata::is_empty", default)]
    pub metadata: CandidateMetadata,
}

impl Candidate {
    /// Total ordering used everywhere candidates are sorted: `blend` descending,
    /// `label` ascending as a stable tie-break (spec §3, §8 property 1).
    pub fn sort_by_rank(candidates: &mut [Candidate]) {
        candidates.sort_by(|a, b| {
            b.blend
                .partial_cmp(&a.blend)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.label.cmp(&b.label))
        });
    }
}

/// Bibliographic search mode (spec §4.6). Selects the column and trigram
/// operator used by the bibliographic-reference strategy; never inferred
/// from input (spec §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BibliographicMode {
    FullReference,
    Title,
    Authors,
    BugsReference,
    Word,
    StrictWord,
}

impl Default for BibliographicMode {
    fn default() -> Self {
        Self::FullReference
    }
}

/// Descriptor for a registered entity type (spec §3, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityTypeDescriptor {
    pub name: String,
    pub display_name: String,
    pub table: String,
    pub id_column: String,
    pub label_column: String,
    #[serde(default)]
    pub secondary_fields: Vec<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDescriptor>,
    /// Pre-applied filter for location-type strategies (spec §4.6).
    #[serde(default)]
    pub location_type_ids: Option<Vec<i64>>,
}
