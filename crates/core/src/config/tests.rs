//! Tests for configuration module

use super::*;
use pretty_assertions::assert_eq;
use std::io::Write;
use tempfile::tempdir;

fn minimal_toml() -> &'static str {
    r#"
        identifier_space = "https://leibnizsead.se/authority"

        [storage]
        postgres_host = "db.internal"
        postgres_database = "sead"
        postgres_user = "sead"
        postgres_password = "secret"
    "#
}

#[test]
fn deserializes_with_defaults_filled_in() {
    let config = Config::from_toml_str(minimal_toml()).unwrap();
    assert_eq!(config.identifier_space, "https://leibnizsead.se/authority");
    assert_eq!(config.default_query_limit, 10);
    assert_eq!(config.retrieval.k_trgm, 30);
    assert_eq!(config.retrieval.k_sem, 30);
    assert_eq!(config.retrieval.k_final, 20);
    assert_eq!(config.retrieval.blend_alpha, 0.5);
    assert_eq!(config.auto_match.threshold, 0.9);
    assert_eq!(config.auto_match.margin, 0.05);
    assert_eq!(config.embedding.dimension, 768);
    assert!(!config.llm_rerank.enabled);
    assert_eq!(config.storage.postgres_host, "db.internal");
}

#[test]
fn validate_rejects_out_of_range_blend_alpha() {
    let mut config = Config::from_toml_str(minimal_toml()).unwrap();
    config.retrieval.blend_alpha = 1.5;
    assert!(config.validate().is_err());
}

#[test]
fn validate_rejects_llm_rerank_top_n_outside_5_to_10_when_enabled() {
    let mut config = Config::from_toml_str(minimal_toml()).unwrap();
    config.llm_rerank.enabled = true;
    config.llm_rerank.top_n = 20;
    assert!(config.validate().is_err());

    config.llm_rerank.top_n = 8;
    assert!(config.validate().is_ok());
}

fn sample_entity(name: &str) -> EntityTypeDescriptor {
    EntityTypeDescriptor {
        name: name.to_string(),
        display_name: "Site".to_string(),
        table: "tbl_locations".to_string(),
        id_column: "location_id".to_string(),
        label_column: "location_name".to_string(),
        secondary_fields: vec![],
        properties: vec![],
        location_type_ids: None,
    }
}

#[test]
fn validate_rejects_duplicate_entity_descriptors() {
    let mut config = Config::from_toml_str(minimal_toml()).unwrap();
    config.entities = vec![sample_entity("site"), sample_entity("site")];
    assert!(config.validate().is_err());
}

#[test]
fn debug_impl_redacts_postgres_password() {
    let config = Config::from_toml_str(minimal_toml()).unwrap();
    let rendered = format!("{config:?}");
    assert!(!rendered.contains("secret"));
    assert!(rendered.contains("***REDACTED***"));
}

#[test]
fn resolves_single_level_include() {
    let dir = tempdir().unwrap();
    let mut taxa_file = std::fs::File::create(dir.path().join("taxa.toml")).unwrap();
    writeln!(
        taxa_file,
        r#"
        name = "taxon"
        display_name = "Taxon"
        table = "tbl_taxa_tree_master"
        id_column = "taxon_id"
        label_column = "genus_name"
        "#
    )
    .unwrap();

    let main = r#"
        identifier_space = "https://leibnizsead.se/authority"
        entities = ["@include:taxa.toml"]

        [storage]
        postgres_host = "db.internal"
    "#;

    let config = Config::from_toml_str_with_base(main, dir.path()).unwrap();
    assert_eq!(config.entities.len(), 1);
    assert_eq!(config.entities[0].name, "taxon");
}

#[test]
fn include_plus_list_literal_concatenates() {
    let dir = tempdir().unwrap();
    let mut included = std::fs::File::create(dir.path().join("extra.toml")).unwrap();
    writeln!(
        included,
        r#"[[array]]
        name = "method"
        display_name = "Method"
        table = "tbl_methods"
        id_column = "method_id"
        label_column = "method_name"
        "#
    )
    .unwrap();

    // An include resolving to an array is spliced; an include resolving to
    // a bare table is appended as a single element. Here `taxa.toml`-style
    // single-table includes are combined with an inline literal entry.
    let mut single = std::fs::File::create(dir.path().join("single.toml")).unwrap();
    writeln!(
        single,
        r#"
        name = "bibliographic_reference"
        display_name = "Bibliographic Reference"
        table = "tbl_biblio"
        id_column = "biblio_id"
        label_column = "full_reference"
        "#
    )
    .unwrap();

    let main = r#"
        identifier_space = "https://leibnizsead.se/authority"
        entities = [
            { name = "site", display_name = "Site", table = "tbl_locations", id_column = "location_id", label_column = "location_name" },
            "@include:single.toml",
        ]

        [storage]
        postgres_host = "db.internal"
    "#;

    let config = Config::from_toml_str_with_base(main, dir.path()).unwrap();
    assert_eq!(config.entities.len(), 2);
    assert_eq!(config.entities[0].name, "site");
    assert_eq!(config.entities[1].name, "bibliographic_reference");
}

#[test]
fn rejects_literal_brackets_in_plain_strings() {
    let main = r#"
        identifier_space = "https://leibnizsead.se/authority"

        [storage]
        postgres_host = "db.internal"
        postgres_database = "not[a]list"
    "#;
    let dir = tempdir().unwrap();
    let result = Config::from_toml_str_with_base(main, dir.path());
    assert!(result.is_err());
}

#[test]
fn builder_produces_valid_config() {
    let storage = StorageConfig::default();
    let config = Config::builder(storage)
        .identifier_space("https://example.org/authority")
        .build();
    assert!(config.validate().is_ok());
    assert_eq!(config.identifier_space, "https://example.org/authority");
}
