//! Canonical entity id parsing and formatting (spec §6).
//!
//! Canonical form is `<identifier_space>/<entity_type>/<integer_id>`, e.g.
//! `https://leibnizsead.se/authority/taxa/4821`. Callers may also submit a
//! bare integer, in which case the entity type is supplied out of band (the
//! sub-query's own `type` field).

use crate::error::{Error, Result};

/// A parsed canonical entity id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityId {
    pub entity_type: String,
    pub id: i64,
}

impl EntityId {
    /// Render the canonical URI form under the given identifier space.
    pub fn to_uri(&self, identifier_space: &str) -> String {
        format!(
            "{}/{}/{}",
            identifier_space.trim_end_matches('/'),
            self.entity_type,
            self.id
        )
    }

    /// Parse either a full canonical URI (`<space>/<type>/<id>`) or a bare
    /// integer id. A bare integer carries no entity type; the caller must
    /// supply one from context (spec §6, `preview`/`suggest` with a known
    /// query type).
    pub fn parse(raw: &str, known_entity_type: Option<&str>) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::malformed_id("empty id"));
        }

        if let Ok(id) = raw.parse::<i64>() {
            let entity_type = known_entity_type
                .ok_or_else(|| Error::malformed_id("bare integer id requires a known entity type"))?
                .to_string();
            return Ok(Self { entity_type, id });
        }

        let mut segments = raw.rsplitn(3, '/');
        let id_segment = segments
            .next()
            .ok_or_else(|| Error::malformed_id(format!("not a canonical id: {raw}")))?;
        let type_segment = segments
            .next()
            .ok_or_else(|| Error::malformed_id(format!("not a canonical id: {raw}")))?;

        let id = id_segment
            .parse::<i64>()
            .map_err(|_| Error::malformed_id(format!("non-integer id segment in: {raw}")))?;

        if let Some(expected) = known_entity_type {
            if expected != type_segment {
                return Err(Error::malformed_id(format!(
                    "id {raw} has entity type {type_segment}, expected {expected}"
                )));
            }
        }

        Ok(Self {
            entity_type: type_segment.to_string(),
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_uri() {
        let parsed = EntityId::parse("https://leibnizsead.se/authority/taxa/4821", None).unwrap();
        assert_eq!(parsed.entity_type, "taxa");
        assert_eq!(parsed.id, 4821);
    }

    #[test]
    fn parses_bare_integer_with_known_type() {
        let parsed = EntityId::parse("4821", Some("taxa")).unwrap();
        assert_eq!(parsed.entity_type, "taxa");
        assert_eq!(parsed.id, 4821);
    }

    #[test]
    fn bare_integer_without_known_type_is_malformed() {
        assert!(EntityId::parse("4821", None).is_err());
    }

    #[test]
    fn mismatched_entity_type_is_malformed() {
        let result = EntityId::parse("https://leibnizsead.se/authority/taxa/4821", Some("sites"));
        assert!(result.is_err());
    }

    #[test]
    fn non_integer_segment_is_malformed() {
        assert!(EntityId::parse("https://leibnizsead.se/authority/taxa/abc", None).is_err());
    }

    #[test]
    fn empty_id_is_malformed() {
        assert!(EntityId::parse("", None).is_err());
        assert!(EntityId::parse("   ", None).is_err());
    }

    #[test]
    fn round_trips_to_uri() {
        let parsed = EntityId {
            entity_type: "taxa".to_string(),
            id: 4821,
        };
        assert_eq!(
            parsed.to_uri("https://leibnizsead.se/authority"),
            "https://leibnizsead.se/authority/taxa/4821"
        );
        assert_eq!(
            parsed.to_uri("https://leibnizsead.se/authority/"),
            "https://leibnizsead.se/authority/taxa/4821"
        );
    }
}
