//! HamiTour Scene - Bevy rendering for the panorama session
//!
//! Implements the session's render surface on top of Bevy: the panorama
//! sphere, baked hotspot markers, the model inspection camera and the egui
//! overlays. The host app supplies spot lookups and navigation.

pub mod camera;
pub mod markers;
pub mod overlay;
pub mod panorama;
pub mod surface;
pub mod ui;

use bevy::prelude::*;
use std::sync::Arc;

use hamitour_core::{Catalog, SpotId, ViewerConfig};

/// Viewer configuration shared with systems
#[derive(Resource, Debug, Clone, Deref)]
pub struct TourConfig(pub ViewerConfig);

/// Request to show another spot, from a teleport or the Back button
#[derive(Message, Debug, Clone, PartialEq)]
pub struct NavigateTo(pub SpotId);

/// Plugin that sets up the panorama scene and its session
pub struct HamiTourScenePlugin {
    pub config: ViewerConfig,
    pub catalog: Arc<Catalog>,
}

impl Plugin for HamiTourScenePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(TourConfig(self.config.clone()))
            .insert_resource(TourSession::new(
                self.catalog.clone(),
                self.config.session_settings(),
            ))
            .add_message::<NavigateTo>()
            .add_plugins(camera::CameraPlugin)
            .add_plugins(panorama::PanoramaPlugin)
            .add_plugins(markers::MarkersPlugin)
            .add_plugins(overlay::OverlayPlugin)
            .add_plugins(ui::TourUiPlugin);
    }
}

// Re-export commonly used types
pub use camera::{LookSettings, OrbitSettings, OverlayCamera, PanoramaCamera};
pub use markers::{HotspotMarker, IconCache};
pub use overlay::{OverlayLayout, ShownModel};
pub use panorama::ViewerEntities;
pub use surface::{BevySurface, SurfaceOp, TourSession};
