//! In-memory [`AuthorityStore`] for unit and integration tests.

use crate::{AuthorityStore, SearchHit};
use async_trait::async_trait;
use reconcile_core::entities::{AuthorityRow, EmbeddingRow, EntityTypeDescriptor, PropertyValue};
use reconcile_core::error::Result;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct MockAuthorityStore {
    rows: RwLock<HashMap<String, Vec<AuthorityRow>>>,
    embeddings: RwLock<HashMap<String, Vec<EmbeddingRow>>>,
}

impl MockAuthorityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(self, entity_type: &str, rows: Vec<AuthorityRow>) -> Self {
        self.rows.write().unwrap_or_else(|e| e.into_inner()).insert(entity_type.to_string(), rows);
        self
    }

    pub fn with_embeddings(self, entity_type: &str, embeddings: Vec<EmbeddingRow>) -> Self {
        self.embeddings
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(entity_type.to_string(), embeddings);
        self
    }

    /// Crude trigram-free approximation: fraction of shared 3-grams between
    /// the two strings, good enough to exercise blending logic in tests
    /// without a live Postgres instance.
    fn trigram_similarity(a: &str, b: &str) -> f64 {
        let trigrams = |s: &str| -> std::collections::HashSet<String> {
            let chars: Vec<char> = s.chars().collect();
            if chars.len() < 3 {
                return std::collections::HashSet::from([s.to_string()]);
            }
            chars.windows(3).map(|w| w.iter().collect()).collect()
        };
        let ta = trigrams(a);
        let tb = trigrams(b);
        if ta.is_empty() || tb.is_empty() {
            return 0.0;
        }
        let intersection = ta.intersection(&tb).count() as f64;
        let union = ta.union(&tb).count() as f64;
        intersection / union
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        // Clipped to [0,1] (spec: semantic score is never negative).
        ((dot / (norm_a * norm_b)) as f64).clamp(0.0, 1.0)
    }
}

#[async_trait]
impl AuthorityStore for MockAuthorityStore {
    async fn trigram_search(
        &self,
        entity_type: &EntityTypeDescriptor,
        norm_query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let guard = self.rows.read().unwrap_or_else(|e| e.into_inner());
        let mut hits: Vec<SearchHit> = guard
            .get(&entity_type.name)
            .map(|rows| {
                rows.iter()
                    .map(|row| SearchHit {
                        id: row.id,
                        label: row.label.clone(),
                        score: Self::trigram_similarity(norm_query, &row.norm_label),
                    })
                    .collect()
            })
            .unwrap_or_default();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn semantic_search(
        &self,
        entity_type: &EntityTypeDescriptor,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let embeddings = self.embeddings.read().unwrap_or_else(|e| e.into_inner());
        let rows = self.rows.read().unwrap_or_else(|e| e.into_inner());
        let labels: HashMap<i64, &str> = rows
            .get(&entity_type.name)
            .map(|rs| rs.iter().map(|r| (r.id, r.label.as_str())).collect())
            .unwrap_or_default();

        let mut hits: Vec<SearchHit> = embeddings
            .get(&entity_type.name)
            .map(|embs| {
                embs.iter()
                    .filter_map(|emb| {
                        labels.get(&emb.id).map(|label| SearchHit {
                            id: emb.id,
                            label: label.to_string(),
                            score: Self::cosine_similarity(query_vector, &emb.embedding),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn get_row(&self, entity_type: &EntityTypeDescriptor, id: i64) -> Result<Option<AuthorityRow>> {
        let guard = self.rows.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard
            .get(&entity_type.name)
            .and_then(|rows| rows.iter().find(|r| r.id == id).cloned()))
    }

    async fn get_rows(&self, entity_type: &EntityTypeDescriptor, ids: &[i64]) -> Result<Vec<AuthorityRow>> {
        let guard = self.rows.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard
            .get(&entity_type.name)
            .map(|rows| rows.iter().filter(|r| ids.contains(&r.id)).cloned().collect())
            .unwrap_or_default())
    }

    async fn list_property_values(
        &self,
        entity_type: &EntityTypeDescriptor,
        property_id: &str,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<PropertyValue>> {
        let guard = self.rows.read().unwrap_or_else(|e| e.into_inner());
        let mut values: Vec<PropertyValue> = guard
            .get(&entity_type.name)
            .map(|rows| {
                rows.iter()
                    .filter_map(|r| r.secondary_fields.get(property_id).cloned())
                    .filter(|v| {
                        v.as_str()
                            .map(|s| s.to_lowercase().starts_with(&prefix.to_lowercase()))
                            .unwrap_or(true)
                    })
                    .collect()
            })
            .unwrap_or_default();
        values.dedup_by(|a, b| a.as_str() == b.as_str());
        values.truncate(limit);
        Ok(values)
    }

    async fn fetch_by_label(&self, entity_type: &EntityTypeDescriptor, label: &str) -> Result<Option<AuthorityRow>> {
        let guard = self.rows.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard
            .get(&entity_type.name)
            .and_then(|rows| rows.iter().find(|r| r.label.eq_ignore_ascii_case(label)).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn descriptor(name: &str) -> EntityTypeDescriptor {
        EntityTypeDescriptor {
            name: name.to_string(),
            display_name: name.to_string(),
            table: name.to_string(),
            id_column: "id".to_string(),
            label_column: "label".to_string(),
            secondary_fields: vec!["country".to_string()],
            properties: vec![],
            location_type_ids: None,
        }
    }

    fn row(id: i64, label: &str, norm_label: &str) -> AuthorityRow {
        let mut secondary_fields = BTreeMap::new();
        secondary_fields.insert(
            "country".to_string(),
            PropertyValue::String("sweden".to_string()),
        );
        AuthorityRow {
            id,
            label: label.to_string(),
            norm_label: norm_label.to_string(),
            secondary_fields,
        }
    }

    #[tokio::test]
    async fn trigram_search_ranks_closer_matches_higher() {
        let store = MockAuthorityStore::new().with_rows(
            "site",
            vec![row(1, "Uppsala", "uppsala"), row(2, "Paris", "paris")],
        );
        let descriptor = descriptor("site");
        let hits = store.trigram_search(&descriptor, "uppsala", 10).await.unwrap();
        assert_eq!(hits[0].id, 1);
    }

    #[tokio::test]
    async fn get_rows_filters_to_requested_ids() {
        let store = MockAuthorityStore::new().with_rows(
            "site",
            vec![row(1, "Uppsala", "uppsala"), row(2, "Paris", "paris")],
        );
        let descriptor = descriptor("site");
        let rows = store.get_rows(&descriptor, &[2]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 2);
    }

    #[tokio::test]
    async fn list_property_values_filters_by_prefix() {
        let store = MockAuthorityStore::new().with_rows("site", vec![row(1, "Uppsala", "uppsala")]);
        let descriptor = descriptor("site");
        let values = store.list_property_values(&descriptor, "country", "swe", 10).await.unwrap();
        assert_eq!(values.len(), 1);
    }
}
