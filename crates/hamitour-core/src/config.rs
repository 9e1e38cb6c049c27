//! Viewer configuration loading

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::hotspot::MarkerStyle;
use crate::session::SessionSettings;
use crate::spot::{Spot, SpotId, SpotRecordFormat, StaticSpotDirectory};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Spot shown when no `?spot=` is given, and the target of the Back action
    #[serde(default)]
    pub home_spot_id: Option<SpotId>,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub panorama: PanoramaConfig,
    #[serde(default)]
    pub markers: MarkersConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub spots: SpotsConfig,
    #[serde(default)]
    pub teleport: TeleportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seconds without decoder progress before the panorama is failed (0 to disable)
    #[serde(default = "default_decode_timeout")]
    pub decode_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            decode_timeout_secs: default_decode_timeout(),
        }
    }
}

fn default_decode_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanoramaConfig {
    #[serde(default = "default_sphere_radius")]
    pub sphere_radius: f32,
    /// Fraction of the radius markers are kept within
    #[serde(default = "default_marker_inset")]
    pub marker_inset: f32,
    #[serde(default = "default_camera_fov")]
    pub camera_fov_degrees: f32,
    #[serde(default = "default_true")]
    pub auto_rotate: bool,
    /// Radians per second
    #[serde(default = "default_auto_rotate_speed")]
    pub auto_rotate_speed: f32,
}

impl Default for PanoramaConfig {
    fn default() -> Self {
        Self {
            sphere_radius: default_sphere_radius(),
            marker_inset: default_marker_inset(),
            camera_fov_degrees: default_camera_fov(),
            auto_rotate: true,
            auto_rotate_speed: default_auto_rotate_speed(),
        }
    }
}

fn default_sphere_radius() -> f32 {
    5000.0
}

fn default_marker_inset() -> f32 {
    0.9
}

fn default_camera_fov() -> f32 {
    75.0
}

fn default_auto_rotate_speed() -> f32 {
    0.3
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkersConfig {
    #[serde(default = "default_canvas_size")]
    pub canvas_size: u32,
    #[serde(default = "default_caption_height")]
    pub caption_height: u32,
    #[serde(default = "default_caption_font_size")]
    pub caption_font_size: f32,
    /// Caption for model markers without one; empty disables it
    #[serde(default = "default_model_caption")]
    pub model_caption: String,
}

impl Default for MarkersConfig {
    fn default() -> Self {
        Self {
            canvas_size: default_canvas_size(),
            caption_height: default_caption_height(),
            caption_font_size: default_caption_font_size(),
            model_caption: default_model_caption(),
        }
    }
}

fn default_canvas_size() -> u32 {
    256
}

fn default_caption_height() -> u32 {
    50
}

fn default_caption_font_size() -> f32 {
    20.0
}

fn default_model_caption() -> String {
    "Click to view 3D model".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    #[serde(default = "default_overlay_camera")]
    pub camera_position: [f32; 3],
    #[serde(default = "default_overlay_target")]
    pub target: [f32; 3],
    #[serde(default = "default_overlay_fov")]
    pub fov_degrees: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            camera_position: default_overlay_camera(),
            target: default_overlay_target(),
            fov_degrees: default_overlay_fov(),
        }
    }
}

fn default_overlay_camera() -> [f32; 3] {
    [0.0, 1.5, 5.0]
}

fn default_overlay_target() -> [f32; 3] {
    [0.0, 1.0, 0.0]
}

fn default_overlay_fov() -> f32 {
    45.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotsConfig {
    /// URL template for spot records, `{id}` is replaced by the spot id
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub format: SpotRecordFormat,
    /// Spots served without a network lookup
    #[serde(default)]
    pub inline: Vec<Spot>,
}

impl Default for SpotsConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            format: SpotRecordFormat::Plain,
            inline: Vec::new(),
        }
    }
}

impl SpotsConfig {
    pub fn endpoint_for(&self, id: &SpotId) -> Option<String> {
        self.endpoint
            .as_ref()
            .map(|template| template.replace("{id}", id.as_str()))
    }

    pub fn directory(&self) -> StaticSpotDirectory {
        StaticSpotDirectory::from_spots(self.inline.iter().cloned())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeleportConfig {
    /// Drop cached GPU assets shortly after each teleport
    #[serde(default)]
    pub environment_reset: bool,
    #[serde(default = "default_reset_delay")]
    pub reset_delay_ms: u64,
}

impl Default for TeleportConfig {
    fn default() -> Self {
        Self {
            environment_reset: false,
            reset_delay_ms: default_reset_delay(),
        }
    }
}

fn default_reset_delay() -> u64 {
    100
}

impl ViewerConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn marker_style(&self) -> MarkerStyle {
        let caption = self.markers.model_caption.trim();
        MarkerStyle {
            canvas_size: self.markers.canvas_size,
            caption_height: self.markers.caption_height,
            caption_font_size: self.markers.caption_font_size,
            model_caption: (!caption.is_empty()).then(|| caption.to_string()),
        }
    }

    /// Convert to the settings consumed by the panorama session
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            decode_timeout: (self.session.decode_timeout_secs > 0)
                .then(|| Duration::from_secs(self.session.decode_timeout_secs)),
            marker_style: self.marker_style(),
            sphere_radius: self.panorama.sphere_radius,
            marker_inset: self.panorama.marker_inset,
            environment_reset: self.teleport.environment_reset,
            reset_delay: Duration::from_millis(self.teleport.reset_delay_ms),
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<ViewerConfig, ConfigError> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config = ViewerConfig::from_toml(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(ViewerConfig::default())
    }
}
