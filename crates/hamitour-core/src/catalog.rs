//! Static hotspot catalog - which markers appear at which location
//!
//! The catalog is a TOML document listing one entry per location. An entry is
//! selected for a spot by its explicit `spot_ids` binding when present, and
//! otherwise by the first entry (in declared order) whose key is a substring
//! of the spot's normalized name. Keys should be authored so that at most one
//! of them matches any spot name; overlaps are reported at warn level.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::warn;

use crate::hotspot::{HotspotDef, HotspotKind};
use crate::spot::{Spot, SpotId};
use crate::teleport::{TeleportEdge, TeleportGraph};

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.toml");

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to parse catalog: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Catalog entry has an empty key")]
    EmptyKey,
    #[error("Duplicate catalog key: {0}")]
    DuplicateKey(String),
    #[error("Spot {spot} is bound to both '{first}' and '{second}'")]
    DuplicateBinding {
        spot: SpotId,
        first: String,
        second: String,
    },
    #[error("Location '{0}' declares teleports but is not bound to any spot id")]
    UnboundTeleportSource(String),
    #[error("Teleport in '{location}' targets unknown spot {target}")]
    DanglingTarget { location: String, target: SpotId },
}

/// Hotspot set for one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationEntry {
    /// Lowercase name fragment used for fallback matching
    pub key: String,
    /// Spots this entry is explicitly bound to
    #[serde(default)]
    pub spot_ids: Vec<SpotId>,
    #[serde(default, rename = "hotspot")]
    pub hotspots: Vec<HotspotDef>,
}

impl LocationEntry {
    pub fn count(&self, kind: HotspotKind) -> usize {
        self.hotspots.iter().filter(|h| h.kind() == kind).count()
    }
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default = "default_version")]
    #[allow(dead_code)]
    version: String,
    #[serde(default, rename = "location")]
    locations: Vec<LocationEntry>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Validated, read-only catalog
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    locations: Vec<LocationEntry>,
}

impl Catalog {
    /// The tour catalog shipped with the crate
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml(BUILTIN_CATALOG)
    }

    /// Parse and validate a catalog document
    pub fn from_toml(content: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDocument = toml::from_str(content)?;
        Self::from_locations(doc.locations)
    }

    pub fn from_locations(mut locations: Vec<LocationEntry>) -> Result<Self, CatalogError> {
        let mut keys = HashSet::new();
        let mut bound: Vec<(SpotId, String)> = Vec::new();

        for location in &mut locations {
            location.key = location.key.trim().to_lowercase();
            if location.key.is_empty() {
                return Err(CatalogError::EmptyKey);
            }
            if !keys.insert(location.key.clone()) {
                return Err(CatalogError::DuplicateKey(location.key.clone()));
            }
            for id in &location.spot_ids {
                if let Some((_, first)) = bound.iter().find(|(b, _)| b == id) {
                    return Err(CatalogError::DuplicateBinding {
                        spot: id.clone(),
                        first: first.clone(),
                        second: location.key.clone(),
                    });
                }
                bound.push((id.clone(), location.key.clone()));
            }
            if location.spot_ids.is_empty() && location.count(HotspotKind::Teleport) > 0 {
                return Err(CatalogError::UnboundTeleportSource(location.key.clone()));
            }
        }

        Ok(Self { locations })
    }

    pub fn locations(&self) -> &[LocationEntry] {
        &self.locations
    }

    pub fn get(&self, key: &str) -> Option<&LocationEntry> {
        self.locations.iter().find(|l| l.key == key)
    }

    /// Keys whose text occurs in `normalized_name`, in declared order
    pub fn matching_keys(&self, normalized_name: &str) -> Vec<&str> {
        self.locations
            .iter()
            .filter(|l| normalized_name.contains(l.key.as_str()))
            .map(|l| l.key.as_str())
            .collect()
    }

    /// Select the hotspot set for a spot. `None` means the location simply has
    /// no hotspots.
    pub fn select(&self, spot: &Spot) -> Option<&LocationEntry> {
        if let Some(entry) = self.locations.iter().find(|l| l.spot_ids.contains(&spot.id)) {
            return Some(entry);
        }

        let name = spot.normalized_name();
        let matches = self.matching_keys(&name);
        if matches.len() > 1 {
            warn!(spot_id = %spot.id, name = %name, keys = ?matches, "Ambiguous catalog match, using first");
        }
        matches.first().and_then(|key| self.get(key))
    }

    /// Teleport edges declared across all locations
    pub fn teleport_graph(&self) -> TeleportGraph {
        let mut edges = Vec::new();
        for location in &self.locations {
            for hotspot in &location.hotspots {
                if let Some(target) = hotspot.teleport_target() {
                    for from in &location.spot_ids {
                        edges.push(TeleportEdge {
                            from: from.clone(),
                            to: target.clone(),
                            caption: hotspot.caption.clone(),
                        });
                    }
                }
            }
        }
        TeleportGraph::from_edges(edges)
    }

    /// Check that every teleport target names a known spot
    pub fn validate_targets(&self, is_known: impl Fn(&SpotId) -> bool) -> Result<(), CatalogError> {
        for location in &self.locations {
            for hotspot in &location.hotspots {
                if let Some(target) = hotspot.teleport_target() {
                    if !is_known(target) {
                        return Err(CatalogError::DanglingTarget {
                            location: location.key.clone(),
                            target: target.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Every spot id the catalog binds or targets
    pub fn referenced_spots(&self) -> HashSet<SpotId> {
        let mut ids = HashSet::new();
        for location in &self.locations {
            ids.extend(location.spot_ids.iter().cloned());
            for hotspot in &location.hotspots {
                if let Some(target) = hotspot.teleport_target() {
                    ids.insert(target.clone());
                }
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spot(id: &str, name: &str) -> Spot {
        Spot {
            id: SpotId::new(id),
            name: name.to_string(),
            description: String::new(),
            image_ref: "pano1.jpg".to_string(),
        }
    }

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.locations().len(), 8);

        let bound = catalog.referenced_spots();
        catalog.validate_targets(|id| bound.contains(id)).unwrap();
    }

    #[test]
    fn test_mossy_overlook_matches_by_name() {
        let catalog = Catalog::builtin().unwrap();
        let entry = catalog.select(&spot("X", "Mossy Forest Overlook")).unwrap();
        assert_eq!(entry.key, "mossy");
        assert_eq!(entry.count(HotspotKind::Model), 4);
        assert_eq!(entry.count(HotspotKind::Teleport), 0);
    }

    #[test]
    fn test_explicit_binding_wins_over_name() {
        let catalog = Catalog::builtin().unwrap();
        // Name would match "peak" by substring, but the id is bound to Camp III
        let entry = catalog
            .select(&spot("zvuINqT41VhWCKpenjZw", "Peak view from Camp III"))
            .unwrap();
        assert_eq!(entry.key, "camp iii");
        assert_eq!(entry.count(HotspotKind::Model), 3);
        assert_eq!(entry.count(HotspotKind::Teleport), 1);
    }

    fn model_payloads(catalog: &Catalog, key: &str) -> Vec<crate::hotspot::ModelPayload> {
        catalog
            .get(key)
            .unwrap()
            .hotspots
            .iter()
            .filter_map(|h| match &h.payload {
                crate::hotspot::HotspotPayload::Model(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_builtin_species_text_and_halos() {
        let catalog = Catalog::builtin().unwrap();

        let camp = model_payloads(&catalog, "camp iii");
        let skink = &camp[0].info;
        assert_eq!(skink.name, "Davao Waterside Skink");
        assert!(skink.description.contains("First described near Malabutuan, Davao"));
        assert!(camp.iter().all(|m| m.halo_blur == 50.0));

        assert!(model_payloads(&catalog, "peak").iter().all(|m| m.halo_blur == 5.0));
        assert!(model_payloads(&catalog, "pygmy").iter().all(|m| m.halo_blur == 10.0));

        // The big-eyed frog entry carries the pit viper's body text
        let mossy = model_payloads(&catalog, "mossy");
        let body = |m: &crate::hotspot::ModelPayload| m.info.description.split_once("\n\n").map(|(_, b)| b.to_string());
        assert_eq!(mossy[3].info.name, "Big-eyed Frog");
        assert_eq!(body(&mossy[3]), body(&mossy[2]));
        assert!(mossy[3].info.description.starts_with("Scientific Name: Pulchrana grandocula"));
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        let catalog = Catalog::builtin().unwrap();
        assert!(catalog.select(&spot("QGRePSC5lFbcbJ8ICvtB", "Twin Falls")).is_none());
    }

    #[test]
    fn test_first_declared_match_wins() {
        let catalog = Catalog::from_toml(
            r#"
            [[location]]
            key = "camp"

            [[location]]
            key = "camp 3"
            "#,
        )
        .unwrap();
        assert_eq!(catalog.matching_keys("camp 3"), vec!["camp", "camp 3"]);
        assert_eq!(catalog.select(&spot("y", "Camp 3")).unwrap().key, "camp");
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let err = Catalog::from_toml(
            r#"
            [[location]]
            key = "Peak"
            [[location]]
            key = "peak "
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateKey(k) if k == "peak"));
    }

    #[test]
    fn test_unbound_teleport_rejected() {
        let err = Catalog::from_toml(
            r#"
            [[location]]
            key = "camp 9"

            [[location.hotspot]]
            kind = "teleport"
            icon = "arrow.png"
            position = [1.0, 2.0, 3.0]
            size = 10.0
            target_spot_id = "elsewhere"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::UnboundTeleportSource(_)));
    }

    #[test]
    fn test_dangling_target_detected() {
        let catalog = Catalog::builtin().unwrap();
        let err = catalog
            .validate_targets(|id| id.as_str() != "8us4vrBVTMIDiCXXWHlY")
            .unwrap_err();
        assert!(matches!(err, CatalogError::DanglingTarget { location, .. } if location == "camp 4"));
    }
}
