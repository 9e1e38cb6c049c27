//! Panorama sphere lifecycle
//!
//! Applies queued [`SurfaceOp`]s to the world and reports panorama texture
//! load progress back to the session.

use bevy::asset::LoadState;
use bevy::prelude::*;
use bevy::window::{PrimaryWindow, WindowResized};
use std::collections::HashMap;

use hamitour_core::{ListenerHandle, ViewerHandle};

use crate::camera::LookSettings;
use crate::markers::{spawn_marker, IconCache};
use crate::overlay::{hide_inspected_model, show_inspected_model, ShownModel};
use crate::surface::{SurfaceOp, TourSession};
use crate::TourConfig;

/// Assets created for a viewer, removed from their collections on dispose
#[derive(Debug, Default)]
pub struct OwnedAssets {
    pub images: Vec<Handle<Image>>,
    pub meshes: Vec<Handle<Mesh>>,
    pub materials: Vec<Handle<StandardMaterial>>,
}

impl OwnedAssets {
    fn append(&mut self, mut other: OwnedAssets) {
        self.images.append(&mut other.images);
        self.meshes.append(&mut other.meshes);
        self.materials.append(&mut other.materials);
    }

    fn remove_from(
        &self,
        images: &mut Assets<Image>,
        meshes: &mut Assets<Mesh>,
        materials: &mut Assets<StandardMaterial>,
    ) {
        for handle in &self.images {
            images.remove(handle);
        }
        for handle in &self.meshes {
            meshes.remove(handle);
        }
        for handle in &self.materials {
            materials.remove(handle);
        }
    }
}

/// Everything spawned for one viewer
#[derive(Debug, Default)]
pub struct ViewerScope {
    pub entities: Vec<Entity>,
    pub assets: OwnedAssets,
}

/// Per-viewer record of spawned entities and created assets.
///
/// Filled when the spawn command is queued, so a dispose later in the same
/// batch finds entities that do not exist in the world yet.
#[derive(Resource, Debug, Default)]
pub struct ViewerEntities {
    scopes: HashMap<ViewerHandle, ViewerScope>,
}

impl ViewerEntities {
    pub fn track(&mut self, viewer: ViewerHandle, entity: Entity) {
        self.scopes.entry(viewer).or_default().entities.push(entity);
    }

    pub fn own(&mut self, viewer: ViewerHandle, assets: OwnedAssets) {
        self.scopes.entry(viewer).or_default().assets.append(assets);
    }

    pub fn release(&mut self, viewer: ViewerHandle) -> Option<ViewerScope> {
        self.scopes.remove(&viewer)
    }

    /// Entities recorded for `viewer`, including any already despawned
    pub fn entity_count(&self, viewer: ViewerHandle) -> usize {
        self.scopes.get(&viewer).map_or(0, |scope| scope.entities.len())
    }

    pub fn live_viewers(&self) -> usize {
        self.scopes.len()
    }
}

/// The textured sphere the camera sits inside
#[derive(Component)]
pub struct PanoramaViewer {
    pub viewer: ViewerHandle,
    pub image: Handle<Image>,
    progressed: bool,
    settled: bool,
}

/// Resize subscription owned by a viewer
#[derive(Component, Debug)]
pub struct ResizeListener {
    pub viewer: ViewerHandle,
    pub listener: ListenerHandle,
}

pub struct PanoramaPlugin;

impl Plugin for PanoramaPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ViewerEntities>().add_systems(
            Update,
            (tick_session, apply_surface_ops, track_panorama_loads, respond_to_resize).chain(),
        );
    }
}

fn tick_session(mut session: ResMut<TourSession>, time: Res<Time>) {
    session.advance(time.delta());
}

fn panorama_mesh(radius: f32) -> Mesh {
    Sphere::new(radius).mesh().uv(64, 32)
}

/// Drain the surface queue and apply each op in order
#[allow(clippy::too_many_arguments)]
pub fn apply_surface_ops(
    mut commands: Commands,
    mut session: ResMut<TourSession>,
    config: Res<TourConfig>,
    asset_server: Res<AssetServer>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut images: ResMut<Assets<Image>>,
    mut icons: ResMut<IconCache>,
    mut scopes: ResMut<ViewerEntities>,
    mut shown: ResMut<ShownModel>,
) {
    let ops = session.surface_mut().drain();
    for op in ops {
        match op {
            SurfaceOp::CreateViewer { viewer, image_ref } => {
                tracing::info!(viewer = viewer.0, image = %image_ref, "Creating panorama viewer");
                let image: Handle<Image> = asset_server.load(image_ref);
                let mesh = meshes.add(panorama_mesh(config.panorama.sphere_radius));
                let material = materials.add(StandardMaterial {
                    base_color_texture: Some(image.clone()),
                    unlit: true,
                    cull_mode: None,
                    ..default()
                });
                let entity = commands
                    .spawn((
                        Mesh3d(mesh.clone()),
                        MeshMaterial3d(material.clone()),
                        // Mirrored so the texture reads correctly from inside
                        Transform::from_scale(Vec3::new(-1.0, 1.0, 1.0)),
                        PanoramaViewer {
                            viewer,
                            image: image.clone(),
                            progressed: false,
                            settled: false,
                        },
                    ))
                    .id();
                scopes.track(viewer, entity);
                scopes.own(
                    viewer,
                    OwnedAssets {
                        images: vec![image],
                        meshes: vec![mesh],
                        materials: vec![material],
                    },
                );
            }
            SurfaceOp::WatchResize { viewer, listener } => {
                let entity = commands.spawn(ResizeListener { viewer, listener }).id();
                scopes.track(viewer, entity);
            }
            SurfaceOp::AttachMarker { viewer, marker } => {
                spawn_marker(
                    &mut commands,
                    &mut meshes,
                    &mut materials,
                    &mut images,
                    &mut icons,
                    &mut scopes,
                    &asset_server,
                    viewer,
                    &marker,
                );
            }
            SurfaceOp::DisposeViewer(viewer) => {
                let Some(scope) = scopes.release(viewer) else {
                    tracing::warn!(viewer = viewer.0, "Dispose for unknown viewer");
                    continue;
                };
                scope.assets.remove_from(&mut images, &mut meshes, &mut materials);
                for entity in &scope.entities {
                    commands.entity(*entity).try_despawn();
                }
                tracing::info!(
                    viewer = viewer.0,
                    entities = scope.entities.len(),
                    "Disposed panorama viewer"
                );
            }
            SurfaceOp::ShowModel {
                ticket,
                url,
                scale,
                offset,
            } => {
                show_inspected_model(&mut commands, &mut shown, &asset_server, ticket, url, scale, offset);
            }
            SurfaceOp::HideModel => {
                hide_inspected_model(&mut commands, &mut shown);
            }
            SurfaceOp::ResetEnvironment => {
                let dropped = icons.clear();
                tracing::info!(icons = dropped, "Rendering environment reset");
            }
        }
    }
}

/// Report panorama texture progress, completion and failure
fn track_panorama_loads(
    mut session: ResMut<TourSession>,
    mut viewers: Query<&mut PanoramaViewer>,
    asset_server: Res<AssetServer>,
) {
    for mut viewer in viewers.iter_mut() {
        if viewer.settled {
            continue;
        }
        match asset_server.get_load_state(viewer.image.id()) {
            Some(LoadState::Loading) if !viewer.progressed => {
                viewer.progressed = true;
                session.panorama_progress(viewer.viewer);
            }
            Some(LoadState::Loaded) => {
                viewer.settled = true;
                session.panorama_loaded(viewer.viewer);
            }
            Some(LoadState::Failed(err)) => {
                viewer.settled = true;
                tracing::error!(viewer = viewer.viewer.0, error = %err, "Panorama image failed to load");
                session.panorama_failed(viewer.viewer, &err.to_string());
            }
            _ => {}
        }
    }
}

/// Refit the panorama projection for the live viewer's resize subscription.
///
/// A listener fits once when it is added and again on every window resize.
/// Listeners of disposed viewers are gone with their viewer, so late resizes
/// change nothing.
fn respond_to_resize(
    mut resized: MessageReader<WindowResized>,
    listeners: Query<Ref<ResizeListener>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    session: Res<TourSession>,
    mut look: ResMut<LookSettings>,
) {
    let latest = resized.read().last().map(|e| Vec2::new(e.width, e.height));
    let Some(viewer) = session.viewer() else {
        return;
    };
    let Some(listener) = listeners.iter().find(|l| l.viewer == viewer) else {
        return;
    };

    let size = match latest {
        Some(size) => size,
        None if listener.is_added() => match windows.single() {
            Ok(window) => Vec2::new(window.width(), window.height()),
            Err(_) => return,
        },
        None => return,
    };
    if size.y <= 0.0 {
        return;
    }

    look.aspect = size.x / size.y;
    tracing::debug!(
        viewer = viewer.0,
        listener = listener.listener.0,
        width = size.x,
        height = size.y,
        "Panorama refit to viewport"
    );
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use bevy::gltf::Gltf;
    use hamitour_core::{Catalog, SessionSettings, Spot, SpotId, StaticSpotDirectory, ViewerConfig};
    use std::sync::Arc;

    use crate::markers::{HotspotMarker, MarkerBake};

    pub(crate) fn surface_app() -> App {
        let mut app = App::new();
        app.add_plugins((MinimalPlugins, AssetPlugin::default()))
            .init_asset::<Mesh>()
            .init_asset::<StandardMaterial>()
            .init_asset::<Image>()
            .init_asset::<Gltf>()
            .add_message::<WindowResized>()
            .init_resource::<IconCache>()
            .init_resource::<ViewerEntities>()
            .init_resource::<ShownModel>()
            .init_resource::<LookSettings>()
            .insert_resource(TourConfig(ViewerConfig::default()))
            .insert_resource(TourSession::new(
                Arc::new(Catalog::builtin().unwrap()),
                SessionSettings::default(),
            ))
            .add_systems(Update, (apply_surface_ops, respond_to_resize).chain());
        app
    }

    pub(crate) fn tour_spots() -> StaticSpotDirectory {
        StaticSpotDirectory::from_spots([
            Spot {
                id: SpotId::new("faYghVBuX9xcHpYLAgdH"),
                name: "Mossy Forest".into(),
                description: String::new(),
                image_ref: "panos/mossy.jpg".into(),
            },
            Spot {
                id: SpotId::new("QGRePSC5lFbcbJ8ICvtB"),
                name: "Twin Falls".into(),
                description: String::new(),
                image_ref: "panos/falls.jpg".into(),
            },
        ])
    }

    /// Open the mossy forest and report its panorama loaded, queueing its markers
    pub(crate) fn open_mossy(app: &mut App, spots: &StaticSpotDirectory) -> ViewerHandle {
        let mut session = app.world_mut().resource_mut::<TourSession>();
        assert!(session.open_from(SpotId::new("faYghVBuX9xcHpYLAgdH"), spots));
        let viewer = session.viewer().unwrap();
        assert!(session.panorama_loaded(viewer));
        viewer
    }

    fn count<C: Component>(app: &mut App) -> usize {
        let world = app.world_mut();
        world.query::<&C>().iter(world).count()
    }

    fn resize(app: &mut App, width: f32, height: f32) {
        app.world_mut().write_message(WindowResized {
            window: Entity::PLACEHOLDER,
            width,
            height,
        });
    }

    #[test]
    fn test_panorama_mesh_has_geometry() {
        let mesh = panorama_mesh(10.0);
        assert!(mesh.count_vertices() > 0);
        assert!(mesh.indices().is_some());
    }

    #[test]
    fn test_replacement_open_in_one_batch_leaves_one_viewer() {
        let mut app = surface_app();
        let spots = tour_spots();

        let first = open_mossy(&mut app, &spots);
        app.world_mut()
            .resource_mut::<TourSession>()
            .open_from(SpotId::new("QGRePSC5lFbcbJ8ICvtB"), &spots);
        app.update();
        app.update();

        assert_eq!(count::<PanoramaViewer>(&mut app), 1);
        assert_eq!(count::<ResizeListener>(&mut app), 1);
        assert_eq!(count::<HotspotMarker>(&mut app), 0);
        assert_eq!(count::<MarkerBake>(&mut app), 0);
        assert_eq!(app.world().resource::<Assets<Mesh>>().len(), 1);
        assert_eq!(app.world().resource::<Assets<StandardMaterial>>().len(), 1);
        // Marker textures went with their viewer
        assert_eq!(app.world().resource::<Assets<Image>>().len(), 0);

        let scopes = app.world().resource::<ViewerEntities>();
        assert_eq!(scopes.live_viewers(), 1);
        assert_eq!(scopes.entity_count(first), 0);
    }

    #[test]
    fn test_create_then_dispose_in_one_batch_leaves_nothing() {
        let mut app = surface_app();
        let spots = tour_spots();

        open_mossy(&mut app, &spots);
        app.world_mut().resource_mut::<TourSession>().close();
        app.update();

        assert_eq!(count::<PanoramaViewer>(&mut app), 0);
        assert_eq!(count::<ResizeListener>(&mut app), 0);
        assert_eq!(count::<HotspotMarker>(&mut app), 0);
        assert_eq!(app.world().resource::<Assets<Mesh>>().len(), 0);
        assert_eq!(app.world().resource::<ViewerEntities>().live_viewers(), 0);
    }

    #[test]
    fn test_markers_are_tracked_with_their_viewer() {
        let mut app = surface_app();
        let viewer = open_mossy(&mut app, &tour_spots());
        app.update();

        assert_eq!(count::<HotspotMarker>(&mut app), 4);
        // Sphere, resize listener, then a quad, bake camera and UI root per marker
        assert_eq!(app.world().resource::<ViewerEntities>().entity_count(viewer), 2 + 4 * 3);
    }

    #[test]
    fn test_resize_refits_only_the_live_viewer() {
        let mut app = surface_app();
        open_mossy(&mut app, &tour_spots());
        app.update();

        resize(&mut app, 400.0, 800.0);
        app.update();
        assert_eq!(app.world().resource::<LookSettings>().aspect, 0.5);

        app.world_mut().resource_mut::<TourSession>().close();
        app.update();
        assert_eq!(count::<ResizeListener>(&mut app), 0);

        resize(&mut app, 1600.0, 800.0);
        app.update();
        assert_eq!(app.world().resource::<LookSettings>().aspect, 0.5);
    }
}
