//! Authority database access (spec §3): a single relational store exposing
//! the trigram channel, the semantic channel, row lookup, and property
//! listing. The curated authority tables are owned by the database this
//! service reconciles against; this crate never creates or migrates them,
//! only the `pg_trgm`/`vector` extensions it depends on.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod error;
mod mock;
mod postgres;

pub use mock::MockAuthorityStore;
pub use postgres::PostgresAuthorityStore;

use async_trait::async_trait;
use reconcile_core::entities::{AuthorityRow, EntityTypeDescriptor, PropertyValue};
use reconcile_core::error::Result;

/// One row surfaced by either search channel, before blending (spec §4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: i64,
    pub label: String,
    pub score: f64,
}

/// Storage-backend contract the hybrid blender and property-filtered query
/// layer are built against. A single implementation (Postgres with
/// `pg_trgm` + `pgvector`) backs production; [`MockAuthorityStore`] backs
/// tests.
#[async_trait]
pub trait AuthorityStore: Send + Sync {
    /// Top `limit` rows by trigram similarity of `norm_query` against
    /// `norm_label`, descending (spec §4.3).
    async fn trigram_search(
        &self,
        entity_type: &EntityTypeDescriptor,
        norm_query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>>;

    /// Top `limit` rows by cosine similarity of `query_vector` against the
    /// embedding side-table, descending (spec §4.4). Returns an empty
    /// vector (not an error) if the entity type has no embeddings.
    async fn semantic_search(
        &self,
        entity_type: &EntityTypeDescriptor,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>>;

    /// Fetches one authority row by id, or `None` if it doesn't exist.
    async fn get_row(&self, entity_type: &EntityTypeDescriptor, id: i64) -> Result<Option<AuthorityRow>>;

    /// Fetches authority rows for a set of ids. Missing ids are silently
    /// dropped from the result rather than erroring (spec §4.7 preview).
    async fn get_rows(&self, entity_type: &EntityTypeDescriptor, ids: &[i64]) -> Result<Vec<AuthorityRow>>;

    /// Distinct values of `property_id` whose text representation starts
    /// with `prefix` (case-insensitive), for autocomplete and for the
    /// properties endpoint (spec §4.9, §6).
    async fn list_property_values(
        &self,
        entity_type: &EntityTypeDescriptor,
        property_id: &str,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<PropertyValue>>;

    /// Fetches the row whose label case-insensitively equals `label`, or
    /// `None` if there isn't one. Used by the taxa orchestrator's hierarchy
    /// enrichment: a single lookup against the genus table to pull a species
    /// candidate's family/order out of the genus row's secondary fields
    /// (spec §4.10).
    async fn fetch_by_label(&self, entity_type: &EntityTypeDescriptor, label: &str) -> Result<Option<AuthorityRow>>;
}
