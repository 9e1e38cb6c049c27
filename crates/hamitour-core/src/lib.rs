//! HamiTour Core - Spot records, hotspot catalog, and the panorama session engine
//!
//! This crate holds everything about a tour that does not depend on a renderer:
//! - Spot records and their decoding from remote documents
//! - The static hotspot catalog (species models and trail teleports per location)
//! - The hotspot factory that turns catalog entries into marker specs
//! - The teleport graph between spots
//! - The model inspection overlay state machine
//! - The panorama session orchestrator, driving any [`RenderSurface`]
//! - Viewer configuration

pub mod catalog;
pub mod config;
pub mod hotspot;
pub mod overlay;
pub mod resources;
pub mod session;
pub mod spot;
pub mod teleport;

pub use catalog::{Catalog, CatalogError, LocationEntry};
pub use config::{
    load_config, ConfigError, MarkersConfig, OverlayConfig, PanoramaConfig, SessionConfig,
    SpotsConfig, TeleportConfig, ViewerConfig,
};
pub use hotspot::{
    HotspotDef, HotspotFactory, HotspotKind, HotspotPayload, MarkerLayout, MarkerSpec,
    MarkerStyle, ModelPayload, SpeciesInfo, TeleportPayload,
};
pub use overlay::{ModelOverlay, ModelSession, ModelStatus, ModelTicket};
pub use resources::{
    FetchTicket, Generation, ListenerHandle, MarkerHandle, ResourceKind, ResourceLedger,
    ViewerHandle,
};
pub use session::{
    AttachedHotspot, PanoramaSession, PanoramaSessionState, RenderSurface, SessionError, SessionEvent,
    SessionSettings, SessionStatus,
};
pub use spot::{
    decode_spot_record, Spot, SpotError, SpotId, SpotRecordFormat, SpotSource,
    StaticSpotDirectory,
};
pub use teleport::{ResetScheduler, TeleportEdge, TeleportGraph};
