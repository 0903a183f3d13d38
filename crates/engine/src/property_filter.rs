//! Property-filtered query layer (spec §4.9).
//!
//! Two distinct treatments, both invoked ahead of the reconciliation
//! service's final answer for a sub-query that carries `properties`:
//!
//! - **Structural** constraints (`location_type`, `genus`) restrict the
//!   candidate universe: a row whose value disagrees is dropped outright,
//!   applied to the raw channel hits before blending.
//! - **Advisory** constraints (`country`, `lat`/`lon`, `family`) never drop
//!   a row; they boost `blend` after blending. An exact string match adds
//!   a configured weight, capped so the result never exceeds 1.0. Lat/lon
//!   proximity inside the configured radius adds a bounded,
//!   inverse-distance-scaled boost; outside the radius there is no boost
//!   and no penalty.

use reconcile_core::config::PropertyFilterConfig;
use reconcile_core::entities::{AuthorityRow, Candidate, EntityTypeDescriptor, PropertyValue};
use reconcile_core::error::Result;
use reconcile_core::normalize::normalize;
use reconcile_core::search_models::PropertyConstraint;
use reconcile_storage::{AuthorityStore, SearchHit};
use std::collections::HashMap;

const STRUCTURAL_PROPERTIES: &[&str] = &["location_type", "genus"];
const GEO_LAT_PROPERTIES: &[&str] = &["lat", "latitude"];
const GEO_LON_PROPERTIES: &[&str] = &["lon", "longitude"];

enum ConstraintKind {
    Structural,
    AdvisoryGeo,
    AdvisoryExact,
}

fn classify(pid: &str) -> ConstraintKind {
    if STRUCTURAL_PROPERTIES.contains(&pid) {
        ConstraintKind::Structural
    } else if GEO_LAT_PROPERTIES.contains(&pid) || GEO_LON_PROPERTIES.contains(&pid) {
        ConstraintKind::AdvisoryGeo
    } else {
        ConstraintKind::AdvisoryExact
    }
}

async fn fetch_rows_by_id(
    store: &dyn AuthorityStore,
    entity_type: &EntityTypeDescriptor,
    ids: &[i64],
) -> Result<HashMap<i64, AuthorityRow>> {
    let rows = store.get_rows(entity_type, ids).await?;
    Ok(rows.into_iter().map(|r| (r.id, r)).collect())
}

fn value_matches(row: &AuthorityRow, pid: &str, constraint: &PropertyValue) -> bool {
    match row.secondary_fields.get(pid) {
        Some(value) => match (value.as_str(), constraint.as_str()) {
            (Some(actual), Some(expected)) => normalize(actual) == normalize(expected),
            _ => value.as_f64() == constraint.as_f64(),
        },
        None => false,
    }
}

/// Pre-retrieval hard restriction: drops hits whose row disagrees with any
/// structural constraint. A no-op if `constraints` carries none.
pub async fn prefilter_hits(
    store: &dyn AuthorityStore,
    entity_type: &EntityTypeDescriptor,
    hits: Vec<SearchHit>,
    constraints: &[PropertyConstraint],
) -> Result<Vec<SearchHit>> {
    let structural: Vec<&PropertyConstraint> = constraints
        .iter()
        .filter(|c| matches!(classify(&c.pid), ConstraintKind::Structural))
        .collect();
    if structural.is_empty() || hits.is_empty() {
        return Ok(hits);
    }

    let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
    let rows = fetch_rows_by_id(store, entity_type, &ids).await?;

    Ok(hits
        .into_iter()
        .filter(|hit| match rows.get(&hit.id) {
            Some(row) => structural.iter().all(|c| value_matches(row, &c.pid, &c.v)),
            None => false,
        })
        .collect())
}

/// Haversine great-circle distance in kilometers.
fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Post-blend score boost for advisory constraints. Never drops a row.
pub async fn apply_boosts(
    store: &dyn AuthorityStore,
    entity_type: &EntityTypeDescriptor,
    mut candidates: Vec<Candidate>,
    constraints: &[PropertyConstraint],
    config: &PropertyFilterConfig,
) -> Result<Vec<Candidate>> {
    let advisory: Vec<&PropertyConstraint> = constraints
        .iter()
        .filter(|c| !matches!(classify(&c.pid), ConstraintKind::Structural))
        .collect();
    if advisory.is_empty() || candidates.is_empty() {
        return Ok(candidates);
    }

    let ids: Vec<i64> = candidates.iter().map(|c| c.id).collect();
    let rows = fetch_rows_by_id(store, entity_type, &ids).await?;

    let query_lat = advisory
        .iter()
        .find(|c| GEO_LAT_PROPERTIES.contains(&c.pid.as_str()))
        .and_then(|c| c.v.as_f64());
    let query_lon = advisory
        .iter()
        .find(|c| GEO_LON_PROPERTIES.contains(&c.pid.as_str()))
        .and_then(|c| c.v.as_f64());
    let exact_constraints: Vec<&&PropertyConstraint> = advisory
        .iter()
        .filter(|c| !GEO_LAT_PROPERTIES.contains(&c.pid.as_str()) && !GEO_LON_PROPERTIES.contains(&c.pid.as_str()))
        .collect();

    for candidate in &mut candidates {
        let Some(row) = rows.get(&candidate.id) else {
            continue;
        };

        for constraint in &exact_constraints {
            if value_matches(row, &constraint.pid, &constraint.v) {
                candidate.blend = (candidate.blend + config.exact_match_boost).min(1.0);
            }
        }

        if let (Some(qlat), Some(qlon)) = (query_lat, query_lon) {
            let row_lat = GEO_LAT_PROPERTIES
                .iter()
                .find_map(|p| row.secondary_fields.get(*p))
                .and_then(|v| v.as_f64());
            let row_lon = GEO_LON_PROPERTIES
                .iter()
                .find_map(|p| row.secondary_fields.get(*p))
                .and_then(|v| v.as_f64());
            if let (Some(rlat), Some(rlon)) = (row_lat, row_lon) {
                let distance = haversine_km(qlat, qlon, rlat, rlon);
                if distance <= config.geo_radius_km {
                    let proximity = 1.0 - (distance / config.geo_radius_km);
                    candidate.blend = (candidate.blend + config.exact_match_boost * proximity).min(1.0);
                }
            }
        }
    }

    Candidate::sort_by_rank(&mut candidates);
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile_core::entities::CandidateMetadata;
    use std::collections::BTreeMap;

    fn descriptor() -> EntityTypeDescriptor {
        EntityTypeDescriptor {
            name: "site".to_string(),
            display_name: "Site".to_string(),
            table: "site".to_string(),
            id_column: "id".to_string(),
            label_column: "label".to_string(),
            secondary_fields: vec!["country".to_string(), "lat".to_string(), "lon".to_string()],
            properties: vec![],
            location_type_ids: None,
        }
    }

    fn row(id: i64, country: &str, lat: f64, lon: f64) -> AuthorityRow {
        let mut fields = BTreeMap::new();
        fields.insert("country".to_string(), PropertyValue::String(country.to_string()));
        fields.insert("lat".to_string(), PropertyValue::Number(lat));
        fields.insert("lon".to_string(), PropertyValue::Number(lon));
        AuthorityRow {
            id,
            label: format!("row{id}"),
            norm_label: format!("row{id}"),
            secondary_fields: fields,
        }
    }

    fn row_with_location_type(id: i64, location_type: &str) -> AuthorityRow {
        let mut fields = BTreeMap::new();
        fields.insert(
            "location_type".to_string(),
            PropertyValue::String(location_type.to_string()),
        );
        AuthorityRow {
            id,
            label: format!("row{id}"),
            norm_label: format!("row{id}"),
            secondary_fields: fields,
        }
    }

    fn candidate(id: i64, blend: f64) -> Candidate {
        Candidate {
            id,
            label: format!("row{id}"),
            trgm_sim: blend,
            sem_sim: blend,
            blend,
            metadata: CandidateMetadata::default(),
        }
    }

    #[tokio::test]
    async fn prefilter_drops_rows_disagreeing_on_structural_constraint() {
        let store = reconcile_storage::MockAuthorityStore::new().with_rows(
            "location",
            vec![row_with_location_type(1, "settlement"), row_with_location_type(2, "cemetery")],
        );
        let mut descriptor = descriptor();
        descriptor.name = "location".to_string();
        descriptor.secondary_fields = vec!["location_type".to_string()];
        let hits = vec![
            SearchHit { id: 1, label: "row1".into(), score: 0.5 },
            SearchHit { id: 2, label: "row2".into(), score: 0.6 },
        ];
        let constraints = vec![PropertyConstraint {
            pid: "location_type".to_string(),
            v: PropertyValue::String("settlement".to_string()),
        }];
        let filtered = prefilter_hits(&store, &descriptor, hits, &constraints).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, 1);
    }

    #[tokio::test]
    async fn exact_advisory_match_boosts_blend_capped_at_one() {
        let store = reconcile_storage::MockAuthorityStore::new()
            .with_rows("site", vec![row(1, "Sweden", 59.3, 18.0)]);
        let descriptor = descriptor();
        let candidates = vec![candidate(1, 0.95)];
        let constraints = vec![PropertyConstraint {
            pid: "country".to_string(),
            v: PropertyValue::String("Sweden".to_string()),
        }];
        let config = PropertyFilterConfig { exact_match_boost: 0.1, geo_radius_km: 50.0 };
        let boosted = apply_boosts(&store, &descriptor, candidates, &constraints, &config)
            .await
            .unwrap();
        assert!((boosted[0].blend - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn geo_proximity_inside_radius_boosts_outside_does_not() {
        let store = reconcile_storage::MockAuthorityStore::new().with_rows(
            "site",
            vec![row(1, "Sweden", 59.3, 18.0), row(2, "Sweden", 10.0, 10.0)],
        );
        let descriptor = descriptor();
        let candidates = vec![candidate(1, 0.5), candidate(2, 0.5)];
        let constraints = vec![
            PropertyConstraint { pid: "lat".to_string(), v: PropertyValue::Number(59.3) },
            PropertyConstraint { pid: "lon".to_string(), v: PropertyValue::Number(18.0) },
        ];
        let config = PropertyFilterConfig { exact_match_boost: 0.1, geo_radius_km: 50.0 };
        let boosted = apply_boosts(&store, &descriptor, candidates, &constraints, &config)
            .await
            .unwrap();
        let near = boosted.iter().find(|c| c.id == 1).unwrap();
        let far = boosted.iter().find(|c| c.id == 2).unwrap();
        assert!(near.blend > 0.5);
        assert!((far.blend - 0.5).abs() < 1e-9);
    }
}
