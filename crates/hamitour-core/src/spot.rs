//! Spot records - the unit of navigation in a tour
//!
//! A spot is a named location with a description and a panorama image. Spots
//! are looked up by id from an external record store; this module only knows
//! the record shapes, not the transport.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Errors raised while looking up or decoding a spot record
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpotError {
    #[error("Spot not found: {0}")]
    NotFound(SpotId),
    #[error("Spot lookup failed: {0}")]
    Transport(String),
    #[error("Malformed spot record: {0}")]
    Malformed(String),
}

impl SpotError {
    /// Short message suitable for a full-screen error view
    pub fn user_message(&self) -> &'static str {
        match self {
            SpotError::NotFound(_) => "Spot not found!",
            SpotError::Transport(_) | SpotError::Malformed(_) => "Error fetching spot data!",
        }
    }
}

/// Opaque spot identifier (the record store's document id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpotId(pub String);

impl SpotId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpotId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A named, described location with a panorama image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spot {
    pub id: SpotId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// URL of the equirectangular panorama image
    pub image_ref: String,
}

impl Spot {
    /// Name trimmed and lowercased, as used for catalog matching
    pub fn normalized_name(&self) -> String {
        self.name.trim().to_lowercase()
    }
}

/// Anything that can resolve a spot id synchronously
pub trait SpotSource {
    fn fetch_spot(&self, id: &SpotId) -> Result<Spot, SpotError>;
}

/// Shape of the record body returned by the spot endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpotRecordFormat {
    /// `{"name": .., "description": .., "image": ..}`
    #[default]
    Plain,
    /// Firestore REST document: `{"fields": {"Name": {"stringValue": ..}, ..}}`
    Firestore,
}

#[derive(Deserialize)]
struct PlainRecord {
    #[serde(alias = "Name")]
    name: String,
    #[serde(default, alias = "Description")]
    description: String,
    #[serde(alias = "Image", alias = "image")]
    image_ref: String,
}

#[derive(Deserialize)]
struct FirestoreDocument {
    #[serde(default)]
    fields: BTreeMap<String, FirestoreValue>,
    #[serde(default)]
    error: Option<FirestoreStatus>,
}

#[derive(Deserialize)]
struct FirestoreValue {
    #[serde(rename = "stringValue")]
    string_value: Option<String>,
}

#[derive(Deserialize)]
struct FirestoreStatus {
    code: u16,
    #[serde(default)]
    message: String,
}

/// Decode a spot record body fetched for `id`
pub fn decode_spot_record(id: &SpotId, body: &str, format: SpotRecordFormat) -> Result<Spot, SpotError> {
    match format {
        SpotRecordFormat::Plain => {
            let record: PlainRecord =
                serde_json::from_str(body).map_err(|e| SpotError::Malformed(e.to_string()))?;
            Ok(Spot {
                id: id.clone(),
                name: record.name,
                description: record.description,
                image_ref: record.image_ref,
            })
        }
        SpotRecordFormat::Firestore => {
            let doc: FirestoreDocument =
                serde_json::from_str(body).map_err(|e| SpotError::Malformed(e.to_string()))?;

            if let Some(status) = doc.error {
                return Err(if status.code == 404 {
                    SpotError::NotFound(id.clone())
                } else {
                    SpotError::Transport(format!("{}: {}", status.code, status.message))
                });
            }

            let field = |key: &str| {
                doc.fields
                    .get(key)
                    .and_then(|v| v.string_value.clone())
            };

            let name = field("Name").ok_or_else(|| SpotError::Malformed("missing Name".into()))?;
            let image_ref = field("Image").ok_or_else(|| SpotError::Malformed("missing Image".into()))?;

            Ok(Spot {
                id: id.clone(),
                name,
                description: field("Description").unwrap_or_default(),
                image_ref,
            })
        }
    }
}

/// In-memory spot directory, used for offline tours and tests
#[derive(Debug, Clone, Default)]
pub struct StaticSpotDirectory {
    spots: BTreeMap<SpotId, Spot>,
}

impl StaticSpotDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_spots(spots: impl IntoIterator<Item = Spot>) -> Self {
        let mut dir = Self::new();
        for spot in spots {
            dir.insert(spot);
        }
        dir
    }

    pub fn insert(&mut self, spot: Spot) {
        self.spots.insert(spot.id.clone(), spot);
    }

    pub fn contains(&self, id: &SpotId) -> bool {
        self.spots.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &SpotId> {
        self.spots.keys()
    }

    pub fn len(&self) -> usize {
        self.spots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }
}

impl SpotSource for StaticSpotDirectory {
    fn fetch_spot(&self, id: &SpotId) -> Result<Spot, SpotError> {
        self.spots
            .get(id)
            .cloned()
            .ok_or_else(|| SpotError::NotFound(id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_name() {
        let spot = Spot {
            id: SpotId::new("X"),
            name: "  Mossy Forest Overlook ".to_string(),
            description: String::new(),
            image_ref: "pano1.jpg".to_string(),
        };
        assert_eq!(spot.normalized_name(), "mossy forest overlook");
    }

    #[test]
    fn test_decode_plain_record() {
        let id = SpotId::new("faYghVBuX9xcHpYLAgdH");
        let body = r#"{"Name": "Mossy Forest", "Description": "Moss-draped trees", "Image": "/panos/mossy.jpg"}"#;
        let spot = decode_spot_record(&id, body, SpotRecordFormat::Plain).unwrap();
        assert_eq!(spot.id, id);
        assert_eq!(spot.name, "Mossy Forest");
        assert_eq!(spot.image_ref, "/panos/mossy.jpg");
    }

    #[test]
    fn test_decode_firestore_document() {
        let id = SpotId::new("iNq6B4KSRrEnBcYOzYVX");
        let body = r#"{
            "name": "projects/hamitour/databases/(default)/documents/Spots/iNq6B4KSRrEnBcYOzYVX",
            "fields": {
                "Name": {"stringValue": "Peak"},
                "Image": {"stringValue": "https://example.org/peak.jpg"}
            }
        }"#;
        let spot = decode_spot_record(&id, body, SpotRecordFormat::Firestore).unwrap();
        assert_eq!(spot.name, "Peak");
        assert_eq!(spot.description, "");
        assert_eq!(spot.image_ref, "https://example.org/peak.jpg");
    }

    #[test]
    fn test_decode_firestore_not_found() {
        let id = SpotId::new("missing");
        let body = r#"{"error": {"code": 404, "message": "Document not found", "status": "NOT_FOUND"}}"#;
        let err = decode_spot_record(&id, body, SpotRecordFormat::Firestore).unwrap_err();
        assert_eq!(err, SpotError::NotFound(id));
        assert_eq!(err.user_message(), "Spot not found!");
    }

    #[test]
    fn test_decode_malformed() {
        let id = SpotId::new("x");
        let err = decode_spot_record(&id, "{\"Name\": 3}", SpotRecordFormat::Plain).unwrap_err();
        assert!(matches!(err, SpotError::Malformed(_)));
        assert_eq!(err.user_message(), "Error fetching spot data!");
    }

    #[test]
    fn test_static_directory() {
        let dir = StaticSpotDirectory::from_spots([Spot {
            id: SpotId::new("a"),
            name: "A".into(),
            description: String::new(),
            image_ref: "a.jpg".into(),
        }]);
        assert!(dir.contains(&SpotId::new("a")));
        assert_eq!(dir.fetch_spot(&SpotId::new("a")).unwrap().name, "A");
        assert!(matches!(
            dir.fetch_spot(&SpotId::new("b")),
            Err(SpotError::NotFound(_))
        ));
    }
}
