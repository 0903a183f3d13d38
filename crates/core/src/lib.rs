//! Core domain types and traits for the reconciliation engine.
//!
//! This crate provides the foundational abstractions shared by the
//! embedding client, storage layer, LLM rerank stage, and the engine that
//! ties them together:
//!
//! - **Entities**: authority rows, candidates, entity type descriptors
//! - **Normalize**: deterministic text normalization
//! - **Entity id**: canonical URI parsing/formatting
//! - **Configuration**: the process-wide configuration surface
//! - **Error handling**: unified error types

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod config;
pub mod entities;
pub mod entity_id;
pub mod error;
pub mod normalize;
pub mod search_models;

pub use config::{
    AutoMatchConfig, BibliographicFullReferenceFilter, Config, ConfigBuilder, EmbeddingCacheConfig,
    EmbeddingConfig, LlmRerankConfig, PropertyFilterConfig, RetrievalConfig, ServerConfig,
    StorageConfig, TaxaConfig,
};
pub use entities::{
    AuthorityRow, BibliographicMode, Candidate, CandidateMetadata, EmbeddingRow,
    EntityTypeDescriptor, PropertyDescriptor, PropertyType, PropertyValue,
};
pub use entity_id::EntityId;
pub use error::{Error, Result, ResultExt};
pub use normalize::normalize;
pub use search_models::{
    BatchRequest, BatchResponse, EntityTypeRef, EntityTypeSummary, PreviewResponse,
    PreviewTemplate, PropertiesResponse, PropertyConstraint, QueryResult, QuerySpec,
    ResponseCandidate, ServiceMetadata, SuggestEndpoints, SuggestEntityResult,
    SuggestPropertyResult, SuggestTypeResult, ViewTemplate,
};

/// Version of the core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
