//! Configuration module for the reconciliation engine.
//!
//! Configuration is loaded from a TOML file with optional `@include:` file
//! composition (see [`loading`]) and environment variable overrides.

mod defaults;
mod loading;

#[cfg(test)]
mod tests;

use crate::entities::EntityTypeDescriptor;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

use defaults::*;

/// Top-level configuration recognized by the core (spec §6).
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// URI prefix canonical ids are built under, e.g.
    /// `https://leibnizsead.se/authority`.
    #[serde(default = "default_identifier_space")]
    pub identifier_space: String,

    /// Default `limit` applied to a sub-query when the caller omits one.
    #[serde(default = "default_query_limit")]
    pub default_query_limit: usize,

    /// Retrieval configuration for the hybrid blender.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Auto-match decision thresholds.
    #[serde(default)]
    pub auto_match: AutoMatchConfig,

    /// Embedding provider and cache configuration.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Optional LLM rerank stage configuration.
    #[serde(default)]
    pub llm_rerank: LlmRerankConfig,

    /// Property-filtered query layer weights.
    #[serde(default)]
    pub property_filter: PropertyFilterConfig,

    /// Taxa orchestrator constants.
    #[serde(default)]
    pub taxa: TaxaConfig,

    /// Authority database connection.
    pub storage: StorageConfig,

    /// Thin HTTP server configuration (spec §1: framing is out of core scope,
    /// but the process still needs somewhere to bind).
    #[serde(default)]
    pub server: ServerConfig,

    /// Per-entity-type strategy descriptors (spec §4.6).
    #[serde(default)]
    pub entities: Vec<EntityTypeDescriptor>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("identifier_space", &self.identifier_space)
            .field("default_query_limit", &self.default_query_limit)
            .field("retrieval", &self.retrieval)
            .field("auto_match", &self.auto_match)
            .field("embedding", &self.embedding)
            .field("llm_rerank", &self.llm_rerank)
            .field("property_filter", &self.property_filter)
            .field("taxa", &self.taxa)
            .field("storage", &self.storage)
            .field("server", &self.server)
            .field("entities", &format!("[{} descriptors]", self.entities.len()))
            .finish()
    }
}

/// `k_trgm`, `k_sem`, `k_final`, `blend_alpha` (spec §4.5, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_k_trgm")]
    pub k_trgm: usize,
    #[serde(default = "default_k_sem")]
    pub k_sem: usize,
    #[serde(default = "default_k_final")]
    pub k_final: usize,
    #[serde(default = "default_blend_alpha")]
    pub blend_alpha: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k_trgm: default_k_trgm(),
            k_sem: default_k_sem(),
            k_final: default_k_final(),
            blend_alpha: default_blend_alpha(),
        }
    }
}

/// `auto_match_threshold`, `auto_match_margin` (spec §4.7, §6).
///
/// Open question (spec §9): no authoritative default exists in the source
/// this was distilled from; these are conservative starting points pending
/// calibration against a labeled evaluation set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoMatchConfig {
    #[serde(default = "default_auto_match_threshold")]
    pub threshold: f64,
    #[serde(default = "default_auto_match_margin")]
    pub margin: f64,
}

impl Default for AutoMatchConfig {
    fn default() -> Self {
        Self {
            threshold: default_auto_match_threshold(),
            margin: default_auto_match_margin(),
        }
    }
}

/// `embedding_model`, `embedding_cache.*` (spec §4.2, §6).
#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
    #[serde(default = "default_embedding_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_embedding_timeout_ms")]
    pub timeout_ms: u64,
    /// API key, or unset to read from an `OPENAI_API_KEY`-style env var.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub cache: EmbeddingCacheConfig,
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .field("max_retries", &self.max_retries)
            .field("timeout_ms", &self.timeout_ms)
            .field("api_key", &self.api_key.as_ref().map(|_| "***REDACTED***"))
            .field("api_base_url", &self.api_base_url)
            .field("cache", &self.cache)
            .finish()
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            max_retries: default_embedding_max_retries(),
            timeout_ms: default_embedding_timeout_ms(),
            api_key: None,
            api_base_url: None,
            cache: EmbeddingCacheConfig::default(),
        }
    }
}

/// `embedding_cache.{enabled, ttl_seconds, max_entries}` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingCacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

impl Default for EmbeddingCacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_seconds: default_cache_ttl_seconds(),
            max_entries: default_cache_max_entries(),
        }
    }
}

/// `llm_rerank.{enabled, model, timeout_ms, top_n}` (spec §4.8, §6).
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmRerankConfig {
    #[serde(default = "default_llm_rerank_enabled")]
    pub enabled: bool,
    #[serde(default = "default_llm_rerank_model")]
    pub model: String,
    #[serde(default = "default_llm_rerank_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_llm_rerank_top_n")]
    pub top_n: usize,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_base_url: Option<String>,
}

impl std::fmt::Debug for LlmRerankConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmRerankConfig")
            .field("enabled", &self.enabled)
            .field("model", &self.model)
            .field("timeout_ms", &self.timeout_ms)
            .field("top_n", &self.top_n)
            .field("api_key", &self.api_key.as_ref().map(|_| "***REDACTED***"))
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

impl Default for LlmRerankConfig {
    fn default() -> Self {
        Self {
            enabled: default_llm_rerank_enabled(),
            model: default_llm_rerank_model(),
            timeout_ms: default_llm_rerank_timeout_ms(),
            top_n: default_llm_rerank_top_n(),
            api_key: None,
            api_base_url: None,
        }
    }
}

/// Weights for the post-filter / score-boost path of the property-filtered
/// query layer (spec §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyFilterConfig {
    /// Additive boost applied to `blend` on an exact advisory-property match,
    /// capped so the result never exceeds 1.0.
    #[serde(default = "default_property_exact_match_boost")]
    pub exact_match_boost: f64,
    /// Radius in kilometers within which a lat/lon proximity boost applies.
    #[serde(default = "default_property_geo_radius_km")]
    pub geo_radius_km: f64,
}

impl Default for PropertyFilterConfig {
    fn default() -> Self {
        Self {
            exact_match_boost: default_property_exact_match_boost(),
            geo_radius_km: default_property_geo_radius_km(),
        }
    }
}

/// Open question (spec §9): the source's bibliographic view filters on
/// `where full_reference is null`; it is unparameterized whether this is
/// intentional or a bug. Implementations must expose it, not silently pick
/// one reading. See DESIGN.md for the decision recorded here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BibliographicFullReferenceFilter {
    /// Only rows with a null `full_reference` are exposed (source's literal behavior).
    RequireNull,
    /// Only rows with a non-null `full_reference` are exposed.
    RequireNotNull,
    /// No filter: all rows are exposed regardless of `full_reference`.
    Unfiltered,
}

impl Default for BibliographicFullReferenceFilter {
    fn default() -> Self {
        Self::RequireNull
    }
}

/// Taxa orchestrator constants (spec §4.10). Not part of the spec's named
/// configuration surface but exposed for calibration rather than hardcoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxaConfig {
    /// Multiplier applied to `blend` when the mention carries an uncertainty
    /// qualifier (`cf.`, `aff.`, `?`).
    #[serde(default = "default_taxa_qualifier_dampening")]
    pub qualifier_dampening: f64,
    /// Species-level top candidate `blend` below which the orchestrator
    /// cascades to the genus strategy.
    #[serde(default = "default_taxa_cascade_threshold")]
    pub cascade_threshold: f64,
    /// Governs the open `full_reference` filter question above; lives here
    /// rather than under bibliographic entity config since it applies
    /// process-wide to the bibliographic strategy, not per descriptor.
    #[serde(default)]
    pub bibliographic_full_reference_filter: BibliographicFullReferenceFilter,
}

impl Default for TaxaConfig {
    fn default() -> Self {
        Self {
            qualifier_dampening: default_taxa_qualifier_dampening(),
            cascade_threshold: default_taxa_cascade_threshold(),
            bibliographic_full_reference_filter: BibliographicFullReferenceFilter::default(),
        }
    }
}

/// Authority database connection (external collaborator; spec §1).
#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,
    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,
    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,
    #[serde(default = "default_postgres_user")]
    pub postgres_user: String,
    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,
    #[serde(default = "default_postgres_pool_size")]
    pub postgres_pool_size: u32,
    #[serde(default = "default_connection_wait_timeout_ms")]
    pub connection_wait_timeout_ms: u64,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("postgres_host", &self.postgres_host)
            .field("postgres_port", &self.postgres_port)
            .field("postgres_database", &self.postgres_database)
            .field("postgres_user", &self.postgres_user)
            .field("postgres_password", &"***REDACTED***")
            .field("postgres_pool_size", &self.postgres_pool_size)
            .field(
                "connection_wait_timeout_ms",
                &self.connection_wait_timeout_ms,
            )
            .finish()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            postgres_host: default_postgres_host(),
            postgres_port: default_postgres_port(),
            postgres_database: default_postgres_database(),
            postgres_user: default_postgres_user(),
            postgres_password: default_postgres_password(),
            postgres_pool_size: default_postgres_pool_size(),
            connection_wait_timeout_ms: default_connection_wait_timeout_ms(),
        }
    }
}

/// Thin HTTP server bind configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    /// Fraction of a batch's sub-queries that must fail with `Overloaded`
    /// before the remainder are short-circuited (spec §5).
    #[serde(default = "default_fail_fast_overload_ratio")]
    pub fail_fast_overload_ratio: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            allowed_origins: default_allowed_origins(),
            fail_fast_overload_ratio: default_fail_fast_overload_ratio(),
        }
    }
}

impl Config {
    /// Validates the configuration, bounding values to sane ranges.
    pub fn validate(&self) -> Result<()> {
        if self.identifier_space.trim().is_empty() {
            return Err(Error::config("identifier_space must not be empty"));
        }
        if self.default_query_limit == 0 {
            return Err(Error::config("default_query_limit must be greater than 0"));
        }

        if !(0.0..=1.0).contains(&self.retrieval.blend_alpha) {
            return Err(Error::config(format!(
                "retrieval.blend_alpha must be in [0,1], got {}",
                self.retrieval.blend_alpha
            )));
        }
        if self.retrieval.k_trgm == 0 || self.retrieval.k_sem == 0 || self.retrieval.k_final == 0 {
            return Err(Error::config(
                "retrieval.k_trgm, k_sem, k_final must all be greater than 0",
            ));
        }

        if !(0.0..=1.0).contains(&self.auto_match.threshold) {
            return Err(Error::config(format!(
                "auto_match.threshold must be in [0,1], got {}",
                self.auto_match.threshold
            )));
        }
        if self.auto_match.margin < 0.0 {
            return Err(Error::config("auto_match.margin must be non-negative"));
        }

        if self.embedding.dimension == 0 {
            return Err(Error::config("embedding.dimension must be greater than 0"));
        }
        if self.embedding.cache.enabled && self.embedding.cache.max_entries == 0 {
            return Err(Error::config(
                "embedding.cache.max_entries must be greater than 0 when caching is enabled",
            ));
        }

        if self.llm_rerank.enabled && !(5..=10).contains(&self.llm_rerank.top_n) {
            return Err(Error::config(format!(
                "llm_rerank.top_n must be in [5,10] per spec, got {}",
                self.llm_rerank.top_n
            )));
        }

        if !(0.0..=1.0).contains(&self.taxa.qualifier_dampening) {
            return Err(Error::config(
                "taxa.qualifier_dampening must be in [0,1]",
            ));
        }

        if self.storage.postgres_pool_size == 0 {
            return Err(Error::config(
                "storage.postgres_pool_size must be greater than 0",
            ));
        }

        if !(0.0..=1.0).contains(&self.server.fail_fast_overload_ratio) {
            return Err(Error::config(
                "server.fail_fast_overload_ratio must be in [0,1]",
            ));
        }

        let mut seen_names = std::collections::HashSet::new();
        for entity in &self.entities {
            if !seen_names.insert(entity.name.as_str()) {
                return Err(Error::config(format!(
                    "duplicate entity type descriptor: {}",
                    entity.name
                )));
            }
        }

        Ok(())
    }

    /// Saves the configuration to a TOML file.
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, toml_string)
            .map_err(|e| Error::config(format!("Failed to write config file: {e}")))?;
        Ok(())
    }

    /// Create a new ConfigBuilder with required storage config.
    pub fn builder(storage: StorageConfig) -> ConfigBuilder {
        ConfigBuilder::new(storage)
    }
}

/// Builder for Config with a fluent API.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    identifier_space: String,
    default_query_limit: usize,
    retrieval: RetrievalConfig,
    auto_match: AutoMatchConfig,
    embedding: EmbeddingConfig,
    llm_rerank: LlmRerankConfig,
    property_filter: PropertyFilterConfig,
    taxa: TaxaConfig,
    storage: StorageConfig,
    server: ServerConfig,
    entities: Vec<EntityTypeDescriptor>,
}

impl ConfigBuilder {
    pub fn new(storage: StorageConfig) -> Self {
        Self {
            identifier_space: default_identifier_space(),
            default_query_limit: default_query_limit(),
            retrieval: RetrievalConfig::default(),
            auto_match: AutoMatchConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm_rerank: LlmRerankConfig::default(),
            property_filter: PropertyFilterConfig::default(),
            taxa: TaxaConfig::default(),
            storage,
            server: ServerConfig::default(),
            entities: Vec::new(),
        }
    }

    pub fn identifier_space(mut self, identifier_space: impl Into<String>) -> Self {
        self.identifier_space = identifier_space.into();
        self
    }

    pub fn retrieval(mut self, retrieval: RetrievalConfig) -> Self {
        self.retrieval = retrieval;
        self
    }

    pub fn auto_match(mut self, auto_match: AutoMatchConfig) -> Self {
        self.auto_match = auto_match;
        self
    }

    pub fn embedding(mut self, embedding: EmbeddingConfig) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn llm_rerank(mut self, llm_rerank: LlmRerankConfig) -> Self {
        self.llm_rerank = llm_rerank;
        self
    }

    pub fn property_filter(mut self, property_filter: PropertyFilterConfig) -> Self {
        self.property_filter = property_filter;
        self
    }

    pub fn taxa(mut self, taxa: TaxaConfig) -> Self {
        self.taxa = taxa;
        self
    }

    pub fn server(mut self, server: ServerConfig) -> Self {
        self.server = server;
        self
    }

    pub fn entities(mut self, entities: Vec<EntityTypeDescriptor>) -> Self {
        self.entities = entities;
        self
    }

    pub fn build(self) -> Config {
        Config {
            identifier_space: self.identifier_space,
            default_query_limit: self.default_query_limit,
            retrieval: self.retrieval,
            auto_match: self.auto_match,
            embedding: self.embedding,
            llm_rerank: self.llm_rerank,
            property_filter: self.property_filter,
            taxa: self.taxa,
            storage: self.storage,
            server: self.server,
            entities: self.entities,
        }
    }
}
