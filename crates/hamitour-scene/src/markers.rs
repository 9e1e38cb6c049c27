//! Hotspot markers - baked icon/caption billboards and click picking
//!
//! Each marker's icon and caption are rendered once into a square texture by
//! a short-lived 2D camera targeting an image. The UI tree and camera are
//! removed once the icon has loaded, leaving only the textured quad.

use bevy::asset::{LoadState, RenderAssetUsages};
use bevy::camera::RenderTarget;
use bevy::prelude::*;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat, TextureUsages};
use bevy::ui::BoxShadow;
use bevy::window::PrimaryWindow;
use std::collections::HashMap;

use hamitour_core::{HotspotKind, MarkerHandle, MarkerLayout, MarkerSpec, SessionStatus, ViewerHandle};

use crate::camera::PanoramaCamera;
use crate::panorama::{OwnedAssets, ViewerEntities};
use crate::surface::TourSession;

/// Pointer travel in pixels beyond which a press is a drag, not a click
const CLICK_SLOP: f32 = 8.0;
/// Frames to keep rendering after the icon has loaded
const BAKE_SETTLE_FRAMES: u8 = 2;
const HALO_ALPHA: f32 = 0.85;

/// A clickable hotspot in the panorama
#[derive(Component, Debug)]
pub struct HotspotMarker {
    pub handle: MarkerHandle,
    pub kind: HotspotKind,
    /// Hit radius in world units
    pub radius: f32,
}

/// Camera rendering one marker texture
#[derive(Component)]
pub struct MarkerBake {
    ui_root: Entity,
    icon: Handle<Image>,
    settled_frames: u8,
}

/// Icon images shared between markers, keyed by URL
#[derive(Resource, Default)]
pub struct IconCache {
    icons: HashMap<String, Handle<Image>>,
}

impl IconCache {
    pub fn get_or_load(&mut self, url: &str, asset_server: &AssetServer) -> Handle<Image> {
        self.icons
            .entry(url.to_string())
            .or_insert_with(|| asset_server.load(url.to_string()))
            .clone()
    }

    /// Drop every cached handle. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.icons.len();
        self.icons.clear();
        count
    }
}

/// Press/release tracking used to tell clicks from drags
#[derive(Resource, Default)]
pub struct PointerGesture {
    start_position: Option<Vec2>,
    is_dragging: bool,
}

pub struct MarkersPlugin;

impl Plugin for MarkersPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<IconCache>()
            .init_resource::<PointerGesture>()
            .add_systems(Update, (finish_marker_bakes, face_panorama_camera, pick_markers));
    }
}

/// Rotation that turns a quad's front (+Z) toward `eye`
pub fn billboard_rotation(position: Vec3, eye: Vec3) -> Quat {
    Transform::from_translation(position)
        .looking_at(position * 2.0 - eye, Vec3::Y)
        .rotation
}

/// Distance along the ray to the point closest to `center`, if that point is
/// within `radius`
pub fn ray_hit_distance(origin: Vec3, direction: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let t = (center - origin).dot(direction);
    if t < 0.0 {
        return None;
    }
    let closest = origin + direction * t;
    (closest.distance_squared(center) <= radius * radius).then_some(t)
}

fn marker_texture(canvas: u32) -> Image {
    let mut image = Image::new_fill(
        Extent3d {
            width: canvas,
            height: canvas,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        &[0, 0, 0, 0],
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::default(),
    );
    image.texture_descriptor.usage =
        TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST | TextureUsages::RENDER_ATTACHMENT;
    image
}

/// White glow behind a model marker's icon
pub fn marker_halo(blur: f32) -> BoxShadow {
    BoxShadow::new(
        Color::WHITE.with_alpha(HALO_ALPHA),
        Val::ZERO,
        Val::ZERO,
        Val::ZERO,
        Val::Px(blur.max(0.0)),
    )
}

fn absolute(x: u32, y: u32, width: u32, height: u32) -> Node {
    Node {
        position_type: PositionType::Absolute,
        left: Val::Px(x as f32),
        top: Val::Px(y as f32),
        width: Val::Px(width as f32),
        height: Val::Px(height as f32),
        ..default()
    }
}

/// Bake camera plus UI tree drawing `layout` into `target`.
/// Returns the camera and the UI root.
fn spawn_bake(
    commands: &mut Commands,
    target: Handle<Image>,
    icon: Handle<Image>,
    layout: &MarkerLayout,
    halo_blur: Option<f32>,
) -> [Entity; 2] {
    let camera = commands
        .spawn((
            Camera2d,
            Camera {
                target: RenderTarget::Image(target.into()),
                clear_color: ClearColorConfig::Custom(Color::NONE),
                order: -1,
                ..default()
            },
        ))
        .id();

    let canvas = layout.canvas_size;
    let root = commands
        .spawn((absolute(0, 0, canvas, canvas), UiTargetCamera(camera)))
        .with_children(|parent| {
            let rect = layout.icon;
            let mut icon_node = parent.spawn((
                absolute(rect.x, rect.y, rect.width, rect.height),
                ImageNode::new(icon.clone()),
            ));
            if let Some(blur) = halo_blur {
                icon_node.insert(marker_halo(blur));
            }

            if let Some(caption) = &layout.caption {
                let rect = caption.rect;
                let mut node = absolute(rect.x, rect.y, rect.width, rect.height);
                node.justify_content = JustifyContent::Center;
                node.align_items = AlignItems::Center;
                parent
                    .spawn((node, BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.45))))
                    .with_child((
                        Text::new(caption.text.clone()),
                        TextFont {
                            font_size: caption.font_size,
                            ..default()
                        },
                        TextColor(Color::WHITE),
                    ));
            }
        })
        .id();

    commands.entity(camera).insert(MarkerBake {
        ui_root: root,
        icon,
        settled_frames: 0,
    });
    [camera, root]
}

/// Spawn the billboard for one marker spec
#[allow(clippy::too_many_arguments)]
pub(crate) fn spawn_marker(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    images: &mut Assets<Image>,
    icons: &mut IconCache,
    scopes: &mut ViewerEntities,
    asset_server: &AssetServer,
    viewer: ViewerHandle,
    spec: &MarkerSpec,
) {
    let texture = images.add(marker_texture(spec.layout.canvas_size));
    let icon = icons.get_or_load(&spec.icon_ref, asset_server);
    for entity in spawn_bake(commands, texture.clone(), icon, &spec.layout, spec.halo_blur) {
        scopes.track(viewer, entity);
    }

    let mesh = meshes.add(Rectangle::new(spec.world_size, spec.world_size));
    let material = materials.add(StandardMaterial {
        base_color_texture: Some(texture.clone()),
        unlit: true,
        alpha_mode: AlphaMode::Blend,
        cull_mode: None,
        ..default()
    });

    let translation = Vec3::from_array(spec.translation);
    let quad = commands
        .spawn((
            Mesh3d(mesh.clone()),
            MeshMaterial3d(material.clone()),
            Transform::from_translation(translation).with_rotation(billboard_rotation(translation, Vec3::ZERO)),
            HotspotMarker {
                handle: spec.handle,
                kind: spec.kind,
                radius: spec.world_size * 0.5,
            },
        ))
        .id();
    scopes.track(viewer, quad);
    scopes.own(
        viewer,
        OwnedAssets {
            images: vec![texture],
            meshes: vec![mesh],
            materials: vec![material],
        },
    );
}

/// Stop bake cameras once their icon has been drawn
fn finish_marker_bakes(
    mut commands: Commands,
    mut bakes: Query<(Entity, &mut Camera, &mut MarkerBake)>,
    asset_server: Res<AssetServer>,
) {
    for (entity, mut camera, mut bake) in bakes.iter_mut() {
        match asset_server.get_load_state(bake.icon.id()) {
            Some(LoadState::Loaded) => {}
            Some(LoadState::Failed(err)) => {
                tracing::warn!(error = %err, "Marker icon failed to load");
            }
            _ => continue,
        }
        bake.settled_frames += 1;
        if bake.settled_frames > BAKE_SETTLE_FRAMES {
            camera.is_active = false;
            commands.entity(bake.ui_root).try_despawn();
            commands.entity(entity).try_despawn();
        }
    }
}

fn face_panorama_camera(
    camera_query: Query<&GlobalTransform, With<PanoramaCamera>>,
    mut markers: Query<&mut Transform, With<HotspotMarker>>,
) {
    let Ok(camera) = camera_query.single() else {
        return;
    };
    let eye = camera.translation();
    for mut transform in markers.iter_mut() {
        transform.rotation = billboard_rotation(transform.translation, eye);
    }
}

/// Activate the nearest marker under a click or tap
#[allow(clippy::too_many_arguments)]
fn pick_markers(
    mut session: ResMut<TourSession>,
    mut gesture: ResMut<PointerGesture>,
    camera_query: Query<(&Camera, &GlobalTransform), With<PanoramaCamera>>,
    markers: Query<(&HotspotMarker, &GlobalTransform)>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    touch_input: Res<Touches>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut contexts: bevy_egui::EguiContexts,
) {
    let Ok(window) = windows.single() else {
        return;
    };

    let mut click: Option<Vec2> = None;

    if mouse_button.just_pressed(MouseButton::Left) {
        gesture.start_position = window.cursor_position();
        gesture.is_dragging = false;
    }
    if let (Some(start), Some(cursor)) = (gesture.start_position, window.cursor_position()) {
        if cursor.distance(start) > CLICK_SLOP {
            gesture.is_dragging = true;
        }
    }
    if mouse_button.just_released(MouseButton::Left) {
        if !gesture.is_dragging {
            click = gesture.start_position;
        }
        gesture.start_position = None;
    }

    for touch in touch_input.iter() {
        if touch_input.just_pressed(touch.id()) {
            gesture.start_position = Some(touch.position());
            gesture.is_dragging = false;
        } else if let Some(start) = gesture.start_position {
            if touch.position().distance(start) > CLICK_SLOP {
                gesture.is_dragging = true;
            }
        }
    }
    for touch in touch_input.iter_just_released() {
        if !gesture.is_dragging {
            click = Some(touch.start_position());
        }
        gesture.start_position = None;
    }

    let Some(position) = click else {
        return;
    };
    let egui_wants_pointer = contexts
        .ctx_mut()
        .map(|ctx| ctx.wants_pointer_input())
        .unwrap_or(false);
    if egui_wants_pointer
        || session.status() != SessionStatus::Ready
        || session.state().active_model().is_some()
    {
        return;
    }

    let Ok((camera, camera_transform)) = camera_query.single() else {
        return;
    };
    let Ok(ray) = camera.viewport_to_world(camera_transform, position) else {
        return;
    };

    let closest = markers
        .iter()
        .filter_map(|(marker, transform)| {
            ray_hit_distance(ray.origin, *ray.direction, transform.translation(), marker.radius)
                .map(|t| (t, marker.handle))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0));

    if let Some((_, handle)) = closest {
        if let Some(kind) = session.activate_hotspot(handle) {
            tracing::debug!(marker = handle.0, ?kind, "Hotspot activated");
        }
    }
}
