//! Bevy application setup

use bevy::prelude::*;
use bevy::winit::WinitSettings;
use bevy_egui::EguiPlugin;
use bevy_picking::{prelude::MeshPickingPlugin, DefaultPickingPlugins};
use std::sync::Arc;

use hamitour_core::{Catalog, ViewerConfig};
use hamitour_scene::HamiTourScenePlugin;

use crate::config::{initial_spot, load_viewer_config, BrowserOverrides};
use crate::navigation::{InitialSpot, NavigationPlugin};
use crate::spot_loader::SpotLoaderPlugin;

/// Log catalog problems that would surface as dead hotspots
fn check_catalog(catalog: &Catalog, config: &ViewerConfig) {
    let graph = catalog.teleport_graph();
    let unpaired = graph.unpaired();
    tracing::info!(
        locations = catalog.locations().len(),
        teleports = graph.len(),
        unpaired = unpaired.len(),
        "Catalog loaded"
    );
    for edge in unpaired {
        tracing::warn!(from = %edge.from, to = %edge.to, "Teleport has no return path");
    }

    // Without an endpoint the inline directory is the full set of known spots
    let directory = config.spots.directory();
    if !directory.is_empty() && config.spots.endpoint.is_none() {
        if let Err(e) = catalog.validate_targets(|id| directory.contains(id)) {
            tracing::warn!(error = %e, "Catalog references unknown spots");
        }
    }
}

pub fn run() {
    let overrides = BrowserOverrides::from_browser();
    let config = match load_viewer_config(&overrides) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = ?e, "Falling back to default configuration");
            ViewerConfig::default()
        }
    };
    let catalog = match Catalog::builtin() {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => {
            tracing::error!(error = %e, "Built-in catalog is invalid");
            return;
        }
    };
    check_catalog(&catalog, &config);
    let initial = initial_spot(&config, &overrides);

    App::new()
        .insert_resource(ClearColor(Color::srgb(0.04, 0.05, 0.04)))
        .insert_resource(WinitSettings::default())
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: "HamiTour".to_string(),
                        canvas: Some("#hamitour-canvas".to_string()),
                        fit_canvas_to_parent: true,
                        prevent_default_event_handling: false,
                        ..default()
                    }),
                    ..default()
                })
                .set(AssetPlugin {
                    // Panoramas, icons and models are served from the site root or absolute URLs
                    file_path: "".to_string(),
                    meta_check: bevy::asset::AssetMetaCheck::Never,
                    ..default()
                }),
        )
        // Must come before EguiPlugin so it can detect PickingPlugin
        .add_plugins(DefaultPickingPlugins)
        .add_plugins(MeshPickingPlugin)
        .add_plugins(EguiPlugin::default())
        .add_plugins(HamiTourScenePlugin {
            config: config.clone(),
            catalog,
        })
        .insert_resource(InitialSpot(initial))
        .add_plugins(SpotLoaderPlugin {
            spots: config.spots.clone(),
        })
        .add_plugins(NavigationPlugin)
        .run();
}
