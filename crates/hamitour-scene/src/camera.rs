//! Panorama look-around and model orbit cameras
//!
//! The panorama camera sits at the sphere's center and only rotates. The
//! inspection camera orbits the model on its own render layer and viewport,
//! and only one of the two responds to input at a time.

use bevy::camera::visibility::RenderLayers;
use bevy::camera::Viewport;
use bevy::input::mouse::{MouseMotion, MouseWheel};
use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use crate::overlay::OverlayLayout;
use crate::surface::TourSession;
use crate::TourConfig;

/// Render layer for the inspected model and its lights
pub const MODEL_LAYER: usize = 1;

const MIN_FOV_DEGREES: f32 = 30.0;
const MAX_FOV_DEGREES: f32 = 100.0;
const PITCH_LIMIT: f32 = 1.45;

/// Marker component for the panorama camera
#[derive(Component)]
pub struct PanoramaCamera;

/// Marker component for the model inspection camera
#[derive(Component)]
pub struct OverlayCamera;

/// Panorama look-around state
#[derive(Debug, Clone, Resource)]
pub struct LookSettings {
    pub yaw: f32,
    pub pitch: f32,
    /// Vertical field of view in degrees, before portrait fitting
    pub fov: f32,
    pub target_fov: f32,
    pub auto_rotate: bool,
    /// Radians per second
    pub auto_rotate_speed: f32,
    pub sensitivity: f32,
    pub zoom_speed: f32,
    pub smooth_factor: f32,
    /// Viewport width over height, kept current by the viewer's resize listener
    pub aspect: f32,
    dragging: bool,
}

impl Default for LookSettings {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            fov: 75.0,
            target_fov: 75.0,
            auto_rotate: true,
            auto_rotate_speed: 0.3,
            sensitivity: 0.003,
            zoom_speed: 2.5,
            smooth_factor: 0.15,
            aspect: 1.0,
            dragging: false,
        }
    }
}

/// Orbit state for the model inspection camera
#[derive(Debug, Clone, Resource)]
pub struct OrbitSettings {
    pub distance: f32,
    pub target_distance: f32,
    pub azimuth: f32,
    pub elevation: f32,
    pub target: Vec3,
    pub sensitivity: f32,
    pub zoom_speed: f32,
    pub smooth_factor: f32,
    pub fov: f32,
    home: (f32, f32, f32),
}

impl Default for OrbitSettings {
    fn default() -> Self {
        Self::looking_from(Vec3::new(0.0, 1.5, 5.0), Vec3::new(0.0, 1.0, 0.0), 45.0)
    }
}

impl OrbitSettings {
    /// Orbit that starts at `eye` looking at `target`
    pub fn looking_from(eye: Vec3, target: Vec3, fov: f32) -> Self {
        let offset = eye - target;
        let distance = offset.length().max(0.01);
        let azimuth = offset.x.atan2(offset.z);
        let elevation = (offset.y / distance).clamp(-1.0, 1.0).asin();
        Self {
            distance,
            target_distance: distance,
            azimuth,
            elevation,
            target,
            sensitivity: 0.005,
            zoom_speed: 0.1,
            smooth_factor: 0.15,
            fov,
            home: (distance, azimuth, elevation),
        }
    }

    pub fn eye(&self) -> Vec3 {
        let horizontal = self.distance * self.elevation.cos();
        self.target
            + Vec3::new(
                horizontal * self.azimuth.sin(),
                self.distance * self.elevation.sin(),
                horizontal * self.azimuth.cos(),
            )
    }

    /// Return to the starting view, used when a new model opens
    pub fn reset(&mut self) {
        let (distance, azimuth, elevation) = self.home;
        self.distance = distance;
        self.target_distance = distance;
        self.azimuth = azimuth;
        self.elevation = elevation;
    }
}

/// Vertical fov that keeps the horizontal view from collapsing on portrait
/// screens. Landscape windows use `base_fov` unchanged.
pub fn fit_vertical_fov(base_fov_degrees: f32, aspect: f32) -> f32 {
    if aspect >= 1.0 || aspect <= 0.0 {
        return base_fov_degrees;
    }
    let half = (base_fov_degrees.to_radians() * 0.5).tan() / aspect;
    (2.0 * half.atan()).to_degrees().min(MAX_FOV_DEGREES + 20.0)
}

/// Direction the panorama camera looks for a given yaw and pitch
pub fn look_direction(yaw: f32, pitch: f32) -> Vec3 {
    Vec3::new(
        -yaw.sin() * pitch.cos(),
        pitch.sin(),
        -yaw.cos() * pitch.cos(),
    )
}

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<LookSettings>()
            .init_resource::<OrbitSettings>()
            .add_systems(Startup, setup_cameras)
            .add_systems(
                Update,
                (update_panorama_camera, update_overlay_camera, fit_overlay_viewport),
            );
    }
}

fn setup_cameras(mut commands: Commands, config: Res<TourConfig>, mut look: ResMut<LookSettings>, mut orbit: ResMut<OrbitSettings>) {
    let panorama = &config.panorama;
    look.fov = panorama.camera_fov_degrees;
    look.target_fov = panorama.camera_fov_degrees;
    look.auto_rotate = panorama.auto_rotate;
    look.auto_rotate_speed = panorama.auto_rotate_speed;

    let overlay = &config.overlay;
    *orbit = OrbitSettings::looking_from(
        Vec3::from_array(overlay.camera_position),
        Vec3::from_array(overlay.target),
        overlay.fov_degrees,
    );

    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            fov: look.fov.to_radians(),
            far: panorama.sphere_radius * 2.0,
            ..default()
        }),
        Transform::IDENTITY.looking_to(look_direction(look.yaw, look.pitch), Vec3::Y),
        PanoramaCamera,
    ));

    commands.spawn((
        Camera3d::default(),
        Camera {
            order: 1,
            is_active: false,
            clear_color: ClearColorConfig::Custom(Color::srgb(0.06, 0.07, 0.06)),
            ..default()
        },
        Projection::Perspective(PerspectiveProjection {
            fov: orbit.fov.to_radians(),
            ..default()
        }),
        Transform::from_translation(orbit.eye()).looking_at(orbit.target, Vec3::Y),
        RenderLayers::layer(MODEL_LAYER),
        OverlayCamera,
    ));

    // Lights only reach the model layer; the panorama is unlit
    commands.spawn((
        DirectionalLight {
            illuminance: 8000.0,
            ..default()
        },
        Transform::from_xyz(2.0, 4.0, 3.0).looking_at(Vec3::ZERO, Vec3::Y),
        RenderLayers::layer(MODEL_LAYER),
    ));
    commands.spawn((
        DirectionalLight {
            illuminance: 2500.0,
            ..default()
        },
        Transform::from_xyz(-3.0, 2.0, -2.0).looking_at(Vec3::ZERO, Vec3::Y),
        RenderLayers::layer(MODEL_LAYER),
    ));
}

fn egui_wants_pointer(contexts: &mut bevy_egui::EguiContexts) -> bool {
    contexts
        .ctx_mut()
        .map(|ctx| ctx.wants_pointer_input())
        .unwrap_or(false)
}

#[allow(clippy::too_many_arguments)]
fn update_panorama_camera(
    mut camera_query: Query<(&mut Transform, &mut Projection), With<PanoramaCamera>>,
    mut settings: ResMut<LookSettings>,
    mut mouse_motion: MessageReader<MouseMotion>,
    mut mouse_wheel: MessageReader<MouseWheel>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    touch_input: Res<Touches>,
    session: Res<TourSession>,
    time: Res<Time>,
    mut contexts: bevy_egui::EguiContexts,
) {
    // The overlay owns input while a model is open
    let overlay_open = session.state().active_model().is_some();
    let blocked = overlay_open || egui_wants_pointer(&mut contexts);

    let mut total_motion = Vec2::ZERO;
    for motion in mouse_motion.read() {
        total_motion += motion.delta;
    }

    settings.dragging = false;
    if mouse_button.pressed(MouseButton::Left) && !blocked {
        settings.dragging = true;
        settings.yaw += total_motion.x * settings.sensitivity;
        settings.pitch = (settings.pitch + total_motion.y * settings.sensitivity)
            .clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    if touch_input.iter().count() == 1 && !blocked {
        for touch in touch_input.iter() {
            let delta = touch.delta();
            if delta != Vec2::ZERO {
                settings.dragging = true;
                settings.yaw += delta.x * settings.sensitivity;
                settings.pitch = (settings.pitch + delta.y * settings.sensitivity)
                    .clamp(-PITCH_LIMIT, PITCH_LIMIT);
            }
        }
    }

    if !blocked {
        for scroll in mouse_wheel.read() {
            settings.target_fov = (settings.target_fov - scroll.y * settings.zoom_speed)
                .clamp(MIN_FOV_DEGREES, MAX_FOV_DEGREES);
        }
    } else {
        for _ in mouse_wheel.read() {}
    }

    let dt = time.delta_secs();
    if settings.auto_rotate && !settings.dragging && !overlay_open {
        settings.yaw += settings.auto_rotate_speed * dt;
    }

    let lerp_factor = 1.0 - (-settings.smooth_factor * 60.0 * dt).exp();
    settings.fov += (settings.target_fov - settings.fov) * lerp_factor;

    if let Ok((mut transform, mut projection)) = camera_query.single_mut() {
        *transform = Transform::IDENTITY
            .looking_to(look_direction(settings.yaw, settings.pitch), Vec3::Y);
        if let Projection::Perspective(perspective) = projection.as_mut() {
            perspective.fov = fit_vertical_fov(settings.fov, settings.aspect).to_radians();
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn update_overlay_camera(
    mut camera_query: Query<(&mut Camera, &mut Transform), With<OverlayCamera>>,
    mut settings: ResMut<OrbitSettings>,
    mut mouse_motion: MessageReader<MouseMotion>,
    mut mouse_wheel: MessageReader<MouseWheel>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    touch_input: Res<Touches>,
    windows: Query<&Window, With<PrimaryWindow>>,
    session: Res<TourSession>,
    time: Res<Time>,
) {
    let Ok((mut camera, mut transform)) = camera_query.single_mut() else {
        return;
    };

    let open = session.state().active_model().is_some();
    if camera.is_active != open {
        camera.is_active = open;
        if open {
            settings.reset();
        }
    }
    if !open {
        for _ in mouse_motion.read() {}
        for _ in mouse_wheel.read() {}
        return;
    }

    // Only drags that start inside the model viewport orbit it
    let inside = windows.single().ok().and_then(|window| {
        let cursor = window.cursor_position()?;
        let layout = OverlayLayout::compute(window.width(), window.height());
        Some(layout.viewport_contains(cursor))
    });

    let mut total_motion = Vec2::ZERO;
    for motion in mouse_motion.read() {
        total_motion += motion.delta;
    }

    if mouse_button.pressed(MouseButton::Left) && inside == Some(true) {
        settings.azimuth -= total_motion.x * settings.sensitivity;
        settings.elevation = (settings.elevation + total_motion.y * settings.sensitivity)
            .clamp(-1.4, 1.4);
    }

    if touch_input.iter().count() == 1 {
        for touch in touch_input.iter() {
            let delta = touch.delta();
            settings.azimuth -= delta.x * settings.sensitivity;
            settings.elevation = (settings.elevation + delta.y * settings.sensitivity)
                .clamp(-1.4, 1.4);
        }
    }

    if inside == Some(true) {
        for scroll in mouse_wheel.read() {
            let zoom_factor = 1.0 - scroll.y * settings.zoom_speed;
            settings.target_distance = (settings.target_distance * zoom_factor).clamp(0.5, 50.0);
        }
    } else {
        for _ in mouse_wheel.read() {}
    }

    let dt = time.delta_secs();
    let lerp_factor = 1.0 - (-settings.smooth_factor * 60.0 * dt).exp();
    settings.distance += (settings.target_distance - settings.distance) * lerp_factor;

    *transform = Transform::from_translation(settings.eye()).looking_at(settings.target, Vec3::Y);
}

/// Keep the inspection camera's viewport on the overlay's model pane
fn fit_overlay_viewport(
    mut camera_query: Query<&mut Camera, With<OverlayCamera>>,
    windows: Query<&Window, With<PrimaryWindow>>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let Ok(mut camera) = camera_query.single_mut() else {
        return;
    };

    let layout = OverlayLayout::compute(window.width(), window.height());
    let scale = window.scale_factor();
    let (position, size) = layout.physical_viewport(scale);
    let max = window.physical_size();
    if size.x == 0 || size.y == 0 || position.x + size.x > max.x || position.y + size.y > max.y {
        camera.viewport = None;
        return;
    }

    let changed = camera
        .viewport
        .as_ref()
        .is_none_or(|v| v.physical_position != position || v.physical_size != size);
    if changed {
        camera.viewport = Some(Viewport {
            physical_position: position,
            physical_size: size,
            ..default()
        });
    }
}
