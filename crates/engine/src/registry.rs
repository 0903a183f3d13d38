//! Process-wide, read-only mapping from entity-type name to its strategy
//! descriptor (spec §4.6). Populated at init from `Config::entities`; safe
//! to share across tasks without locking once built.

use reconcile_core::entities::EntityTypeDescriptor;
use reconcile_core::error::{Error, Result};
use std::collections::HashMap;

pub struct EntityStrategyRegistry {
    strategies: HashMap<String, EntityTypeDescriptor>,
}

impl EntityStrategyRegistry {
    pub fn new(entities: Vec<EntityTypeDescriptor>) -> Self {
        let strategies = entities.into_iter().map(|e| (e.name.clone(), e)).collect();
        Self { strategies }
    }

    /// Lookup is case-sensitive on the entity name (spec §4.6).
    pub fn get(&self, name: &str) -> Result<&EntityTypeDescriptor> {
        self.strategies
            .get(name)
            .ok_or_else(|| Error::unknown_entity_type(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityTypeDescriptor> {
        self.strategies.values()
    }

    /// Entity types whose name starts with `prefix` (spec §4.7 `suggest_type`),
    /// ordered by name ascending for determinism.
    pub fn suggest_types(&self, prefix: &str) -> Vec<&EntityTypeDescriptor> {
        let prefix_lower = prefix.to_lowercase();
        let mut matches: Vec<&EntityTypeDescriptor> = self
            .strategies
            .values()
            .filter(|e| e.name.to_lowercase().starts_with(&prefix_lower))
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name));
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str) -> EntityTypeDescriptor {
        EntityTypeDescriptor {
            name: name.to_string(),
            display_name: name.to_string(),
            table: name.to_string(),
            id_column: "id".to_string(),
            label_column: "label".to_string(),
            secondary_fields: vec![],
            properties: vec![],
            location_type_ids: None,
        }
    }

    #[test]
    fn unknown_entity_type_is_an_error() {
        let registry = EntityStrategyRegistry::new(vec![descriptor("site")]);
        assert!(registry.get("unknown").is_err());
        assert!(registry.get("site").is_ok());
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let registry = EntityStrategyRegistry::new(vec![descriptor("site")]);
        assert!(registry.get("Site").is_err());
    }

    #[test]
    fn suggest_types_filters_by_prefix_ordered() {
        let registry = EntityStrategyRegistry::new(vec![descriptor("site"), descriptor("species_taxon")]);
        let matches = registry.suggest_types("s");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].name, "site");
    }
}
