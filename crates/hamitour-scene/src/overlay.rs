//! Model inspection overlay: layout, glTF loading and load reporting

use bevy::asset::LoadState;
use bevy::camera::visibility::RenderLayers;
use bevy::gltf::Gltf;
use bevy::prelude::*;

use hamitour_core::ModelTicket;

use crate::camera::MODEL_LAYER;
use crate::surface::TourSession;

/// Screen layout of the overlay modal, in logical pixels.
///
/// Landscape windows put the model pane left of the info pane; portrait
/// windows stack them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayLayout {
    pub modal: Rect,
    pub viewport: Rect,
    pub info: Rect,
}

impl OverlayLayout {
    pub fn compute(width: f32, height: f32) -> Self {
        let modal_w = width * if width < 800.0 { 0.94 } else { 0.8 };
        let modal_h = height * if width < 800.0 { 0.9 } else { 0.8 };
        let min = Vec2::new((width - modal_w) * 0.5, (height - modal_h) * 0.5);
        let modal = Rect::from_corners(min, min + Vec2::new(modal_w, modal_h));

        let (viewport, info) = if width >= height {
            let split = modal.min.x + modal_w * 0.6;
            (
                Rect::new(modal.min.x, modal.min.y, split, modal.max.y),
                Rect::new(split, modal.min.y, modal.max.x, modal.max.y),
            )
        } else {
            let split = modal.min.y + modal_h * 0.55;
            (
                Rect::new(modal.min.x, modal.min.y, modal.max.x, split),
                Rect::new(modal.min.x, split, modal.max.x, modal.max.y),
            )
        };

        Self { modal, viewport, info }
    }

    pub fn viewport_contains(&self, point: Vec2) -> bool {
        self.viewport.contains(point)
    }

    /// Model pane as a physical-pixel position and size
    pub fn physical_viewport(&self, scale_factor: f32) -> (UVec2, UVec2) {
        let position = (self.viewport.min * scale_factor).round();
        let size = (self.viewport.size() * scale_factor).round();
        (
            position.max(Vec2::ZERO).as_uvec2(),
            size.max(Vec2::ZERO).as_uvec2(),
        )
    }
}

/// Root of the inspected model
#[derive(Component)]
pub struct InspectedModel {
    pub ticket: ModelTicket,
    pub url: String,
    pub gltf: Handle<Gltf>,
    pub scale: Vec3,
    pub offset: Vec3,
    started: bool,
    spawned: bool,
}

/// The model entity currently shown, recorded when its spawn is queued
#[derive(Resource, Debug, Default)]
pub struct ShownModel(Option<(ModelTicket, Entity)>);

impl ShownModel {
    pub fn ticket(&self) -> Option<ModelTicket> {
        self.0.map(|(ticket, _)| ticket)
    }
}

pub struct OverlayPlugin;

impl Plugin for OverlayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ShownModel>()
            .add_systems(Update, (track_model_loads, propagate_model_layer).chain());
    }
}

/// Replace whatever model is shown with the one at `url`
pub(crate) fn show_inspected_model(
    commands: &mut Commands,
    shown: &mut ShownModel,
    asset_server: &AssetServer,
    ticket: ModelTicket,
    url: String,
    scale: Vec3,
    offset: Vec3,
) {
    hide_inspected_model(commands, shown);
    let gltf: Handle<Gltf> = asset_server.load(url.clone());
    let entity = commands
        .spawn((
            InspectedModel {
                ticket,
                url,
                gltf,
                scale,
                offset,
                started: false,
                spawned: false,
            },
            Transform::from_translation(offset).with_scale(scale),
            Visibility::default(),
            RenderLayers::layer(MODEL_LAYER),
        ))
        .id();
    shown.0 = Some((ticket, entity));
}

pub(crate) fn hide_inspected_model(commands: &mut Commands, shown: &mut ShownModel) {
    if let Some((ticket, entity)) = shown.0.take() {
        commands.entity(entity).try_despawn();
        tracing::debug!(generation = ticket.generation.0, "Inspected model removed");
    }
}

/// Report glTF progress to the session and spawn the scene once decoded
fn track_model_loads(
    mut commands: Commands,
    mut session: ResMut<TourSession>,
    mut models: Query<(Entity, &mut InspectedModel)>,
    asset_server: Res<AssetServer>,
    gltf_assets: Res<Assets<Gltf>>,
) {
    for (entity, mut model) in models.iter_mut() {
        if model.spawned {
            continue;
        }
        if !model.started {
            model.started = true;
            session.model_load_started(model.ticket);
        }

        match asset_server.get_load_state(model.gltf.id()) {
            Some(LoadState::Loaded) => {
                model.spawned = true;
                let scene = gltf_assets.get(&model.gltf).and_then(|gltf| {
                    gltf.default_scene
                        .clone()
                        .or_else(|| gltf.scenes.first().cloned())
                });
                match scene {
                    Some(scene) => {
                        tracing::info!(url = %model.url, "Model loaded");
                        commands.entity(entity).with_child((
                            SceneRoot(scene),
                            RenderLayers::layer(MODEL_LAYER),
                        ));
                        session.model_loaded(model.ticket);
                    }
                    None => {
                        session.model_failed(model.ticket, "model file contains no scene");
                    }
                }
            }
            Some(LoadState::Failed(err)) => {
                model.spawned = true;
                session.model_failed(model.ticket, &err.to_string());
            }
            _ => {}
        }
    }
}

/// glTF scenes spawn their meshes without render layers; move them onto the
/// model layer so the panorama camera never sees them.
fn propagate_model_layer(
    mut commands: Commands,
    models: Query<Entity, With<InspectedModel>>,
    children: Query<&Children>,
    unlayered: Query<(), (With<Transform>, Without<RenderLayers>)>,
) {
    for root in models.iter() {
        for descendant in children.iter_descendants(root) {
            if unlayered.contains(descendant) {
                commands
                    .entity(descendant)
                    .insert(RenderLayers::layer(MODEL_LAYER));
            }
        }
    }
}
