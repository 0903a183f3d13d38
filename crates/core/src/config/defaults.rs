//! Default values and functions for configuration

pub(crate) const DEFAULT_IDENTIFIER_SPACE: &str = "https://leibnizsead.se/authority";
pub(crate) const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub(crate) const DEFAULT_POSTGRES_HOST: &str = "localhost";
pub(crate) const DEFAULT_POSTGRES_DATABASE: &str = "sead_production";
pub(crate) const DEFAULT_POSTGRES_USER: &str = "sead_reconcile";
pub(crate) const DEFAULT_POSTGRES_PASSWORD: &str = "sead_reconcile";

pub(crate) fn default_query_limit() -> usize {
    10
}

pub(crate) fn default_k_trgm() -> usize {
    30
}

pub(crate) fn default_k_sem() -> usize {
    30
}

pub(crate) fn default_k_final() -> usize {
    20
}

pub(crate) fn default_blend_alpha() -> f64 {
    0.5
}

pub(crate) fn default_auto_match_threshold() -> f64 {
    0.9
}

pub(crate) fn default_auto_match_margin() -> f64 {
    0.05
}

pub(crate) fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

pub(crate) fn default_embedding_dimension() -> usize {
    768
}

pub(crate) fn default_embedding_max_retries() -> usize {
    3
}

pub(crate) fn default_embedding_timeout_ms() -> u64 {
    10_000
}

pub(crate) fn default_cache_enabled() -> bool {
    true
}

pub(crate) fn default_cache_ttl_seconds() -> u64 {
    3_600
}

pub(crate) fn default_cache_max_entries() -> usize {
    10_000
}

pub(crate) fn default_llm_rerank_enabled() -> bool {
    false
}

pub(crate) fn default_llm_rerank_model() -> String {
    "gpt-4o-mini".to_string()
}

pub(crate) fn default_llm_rerank_timeout_ms() -> u64 {
    5_000
}

pub(crate) fn default_llm_rerank_top_n() -> usize {
    8
}

pub(crate) fn default_property_exact_match_boost() -> f64 {
    0.1
}

pub(crate) fn default_property_geo_radius_km() -> f64 {
    50.0
}

pub(crate) fn default_taxa_qualifier_dampening() -> f64 {
    0.85
}

pub(crate) fn default_taxa_cascade_threshold() -> f64 {
    0.5
}

pub(crate) fn default_server_port() -> u16 {
    8080
}

pub(crate) fn default_allowed_origins() -> Vec<String> {
    Vec::new()
}

pub(crate) fn default_postgres_host() -> String {
    DEFAULT_POSTGRES_HOST.to_string()
}

pub(crate) fn default_postgres_port() -> u16 {
    5432
}

pub(crate) fn default_postgres_database() -> String {
    DEFAULT_POSTGRES_DATABASE.to_string()
}

pub(crate) fn default_postgres_user() -> String {
    DEFAULT_POSTGRES_USER.to_string()
}

pub(crate) fn default_postgres_password() -> String {
    DEFAULT_POSTGRES_PASSWORD.to_string()
}

pub(crate) fn default_postgres_pool_size() -> u32 {
    10
}

pub(crate) fn default_identifier_space() -> String {
    DEFAULT_IDENTIFIER_SPACE.to_string()
}

pub(crate) fn default_connection_wait_timeout_ms() -> u64 {
    2_000
}

pub(crate) fn default_fail_fast_overload_ratio() -> f64 {
    0.5
}
