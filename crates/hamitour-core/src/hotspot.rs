//! Hotspot definitions and the marker factory
//!
//! A hotspot is an interactive point inside a panorama. The factory turns a
//! [`HotspotDef`] into a [`MarkerSpec`]: where the billboard goes inside the
//! panorama sphere, how big it is, and how the icon and caption are laid out
//! on one square raster. The factory keeps no state and does not interpret
//! the payload; activation is dispatched by the session.

use serde::{Deserialize, Serialize};

use crate::resources::MarkerHandle;
use crate::spot::SpotId;

/// Descriptive text shown beside an inspected model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesInfo {
    pub name: String,
    pub description: String,
    /// Photo of the species
    #[serde(rename = "image")]
    pub image_ref: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPayload {
    pub model_url: String,
    /// Per-asset scale normalizing the authored size
    #[serde(default = "unit_scale")]
    pub view_scale: [f32; 3],
    /// Per-asset translation centering the model in the inspection viewport
    #[serde(default)]
    pub view_offset: [f32; 3],
    /// Blur radius in pixels of the white glow behind the marker icon; 0 disables it
    #[serde(default = "default_halo_blur")]
    pub halo_blur: f32,
    pub info: SpeciesInfo,
}

fn unit_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn default_halo_blur() -> f32 {
    10.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeleportPayload {
    pub target_spot_id: SpotId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HotspotPayload {
    Model(ModelPayload),
    Teleport(TeleportPayload),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HotspotKind {
    Model,
    Teleport,
}

/// One interactive point at a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotDef {
    #[serde(rename = "icon")]
    pub icon_ref: String,
    /// Scene-relative position inside the panorama sphere
    pub position: [f32; 3],
    /// Billboard edge length in scene units
    pub size: f32,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(flatten)]
    pub payload: HotspotPayload,
}

impl HotspotDef {
    pub fn kind(&self) -> HotspotKind {
        match self.payload {
            HotspotPayload::Model(_) => HotspotKind::Model,
            HotspotPayload::Teleport(_) => HotspotKind::Teleport,
        }
    }

    pub fn teleport_target(&self) -> Option<&SpotId> {
        match &self.payload {
            HotspotPayload::Teleport(t) => Some(&t.target_spot_id),
            HotspotPayload::Model(_) => None,
        }
    }
}

/// Raster parameters for baked marker textures
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerStyle {
    /// Edge length of the square raster in pixels
    pub canvas_size: u32,
    /// Pixels reserved at the bottom of the raster for the caption
    pub caption_height: u32,
    pub caption_font_size: f32,
    /// Caption used by model hotspots that do not declare one
    pub model_caption: Option<String>,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            canvas_size: 256,
            caption_height: 50,
            caption_font_size: 20.0,
            model_caption: Some("Click to view 3D model".to_string()),
        }
    }
}

/// Axis-aligned pixel rectangle, origin top-left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptionLayout {
    pub text: String,
    pub rect: PixelRect,
    pub font_size: f32,
}

/// Placement of the icon and caption on the marker raster
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerLayout {
    pub canvas_size: u32,
    pub icon: PixelRect,
    pub caption: Option<CaptionLayout>,
}

impl MarkerLayout {
    pub fn new(style: &MarkerStyle, caption: Option<&str>) -> Self {
        let canvas = style.canvas_size.max(1);
        match caption.filter(|c| !c.trim().is_empty()) {
            Some(text) => {
                let reserved = style.caption_height.min(canvas / 2);
                let side = canvas - reserved;
                Self {
                    canvas_size: canvas,
                    icon: PixelRect {
                        x: (canvas - side) / 2,
                        y: 0,
                        width: side,
                        height: side,
                    },
                    caption: Some(CaptionLayout {
                        text: text.to_string(),
                        rect: PixelRect {
                            x: 0,
                            y: side,
                            width: canvas,
                            height: reserved,
                        },
                        font_size: style.caption_font_size,
                    }),
                }
            }
            None => Self {
                canvas_size: canvas,
                icon: PixelRect {
                    x: 0,
                    y: 0,
                    width: canvas,
                    height: canvas,
                },
                caption: None,
            },
        }
    }
}

/// Everything a renderer needs to build one hotspot marker
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    /// Passed back to the session when the marker is clicked
    pub handle: MarkerHandle,
    pub kind: HotspotKind,
    pub icon_ref: String,
    pub translation: [f32; 3],
    /// Billboard edge length after placement
    pub world_size: f32,
    pub layout: MarkerLayout,
    /// Glow drawn behind the icon, in raster pixels
    pub halo_blur: Option<f32>,
}

/// Pull a point that lies outside the sphere back inside it, shrinking the
/// marker by the same factor so its apparent size from the center is kept.
pub fn place_inside_sphere(position: [f32; 3], size: f32, limit: f32) -> ([f32; 3], f32) {
    let [x, y, z] = position;
    let distance = (x * x + y * y + z * z).sqrt();
    if distance <= limit || distance <= f32::EPSILON {
        return (position, size);
    }
    let k = limit / distance;
    ([x * k, y * k, z * k], size * k)
}

/// Builds marker specs for one panorama sphere
#[derive(Debug, Clone)]
pub struct HotspotFactory<'a> {
    style: &'a MarkerStyle,
    /// Largest distance from the center a marker may sit at
    limit: f32,
}

impl<'a> HotspotFactory<'a> {
    pub fn new(style: &'a MarkerStyle, sphere_radius: f32, inset: f32) -> Self {
        Self {
            style,
            limit: sphere_radius * inset.clamp(0.1, 1.0),
        }
    }

    pub fn build(&self, def: &HotspotDef, handle: MarkerHandle) -> MarkerSpec {
        let caption = match (&def.caption, def.kind()) {
            (Some(c), _) => Some(c.as_str()),
            (None, HotspotKind::Model) => self.style.model_caption.as_deref(),
            (None, HotspotKind::Teleport) => None,
        };
        let (translation, world_size) = place_inside_sphere(def.position, def.size, self.limit);
        let halo_blur = match &def.payload {
            HotspotPayload::Model(model) if model.halo_blur > 0.0 => Some(model.halo_blur),
            _ => None,
        };

        MarkerSpec {
            handle,
            kind: def.kind(),
            icon_ref: def.icon_ref.clone(),
            translation,
            world_size,
            layout: MarkerLayout::new(self.style, caption),
            halo_blur,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn teleport_def(caption: Option<&str>) -> HotspotDef {
        HotspotDef {
            icon_ref: "arrow.png".into(),
            position: [2000.0, -500.0, 1600.0],
            size: 500.0,
            caption: caption.map(str::to_string),
            payload: HotspotPayload::Teleport(TeleportPayload {
                target_spot_id: SpotId::new("zvuINqT41VhWCKpenjZw"),
            }),
        }
    }

    #[test]
    fn test_layout_with_caption_reserves_bottom_band() {
        let style = MarkerStyle::default();
        let layout = MarkerLayout::new(&style, Some("Enter Camp 3"));
        assert_eq!(layout.canvas_size, 256);
        assert_eq!(layout.icon.width, 206);
        assert_eq!(layout.icon.x, 25);
        let caption = layout.caption.unwrap();
        assert_eq!(caption.rect.y, 206);
        assert_eq!(caption.rect.height, 50);
        assert_eq!(caption.text, "Enter Camp 3");
    }

    #[test]
    fn test_layout_without_caption_fills_canvas() {
        let layout = MarkerLayout::new(&MarkerStyle::default(), Some("   "));
        assert!(layout.caption.is_none());
        assert_eq!(layout.icon.width, 256);
    }

    #[test]
    fn test_place_inside_sphere() {
        let (p, s) = place_inside_sphere([1000.0, -800.0, 700.0], 500.0, 4500.0);
        assert_eq!(p, [1000.0, -800.0, 700.0]);
        assert_eq!(s, 500.0);

        let (p, s) = place_inside_sphere([8000.0, -6000.0, 0.0], 3300.0, 5000.0);
        let d = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
        assert!((d - 5000.0).abs() < 0.01);
        assert!((s - 1650.0).abs() < 0.01);
    }

    #[test]
    fn test_factory_teleport_without_caption() {
        let style = MarkerStyle::default();
        let factory = HotspotFactory::new(&style, 5000.0, 0.9);
        let spec = factory.build(&teleport_def(None), MarkerHandle(7));
        assert_eq!(spec.kind, HotspotKind::Teleport);
        assert_eq!(spec.handle, MarkerHandle(7));
        assert!(spec.layout.caption.is_none());
        assert_eq!(spec.halo_blur, None);
    }

    #[test]
    fn test_factory_model_gets_default_caption() {
        let style = MarkerStyle::default();
        let factory = HotspotFactory::new(&style, 5000.0, 0.9);
        let def = HotspotDef {
            icon_ref: "icon.png".into(),
            position: [2500.0, -3500.0, 4000.0],
            size: 2000.0,
            caption: None,
            payload: HotspotPayload::Model(ModelPayload {
                model_url: "/3dmodels/pit viper.glb".into(),
                view_scale: [0.2, 0.2, 0.2],
                view_offset: [0.0, 0.5, 0.2],
                halo_blur: 50.0,
                info: SpeciesInfo {
                    name: "Philippine Pit Viper".into(),
                    description: String::new(),
                    image_ref: String::new(),
                },
            }),
        };
        let spec = factory.build(&def, MarkerHandle(1));
        assert_eq!(
            spec.layout.caption.map(|c| c.text),
            Some("Click to view 3D model".to_string())
        );
        // Sits just inside the sphere, scaled down with it
        let [x, y, z] = spec.translation;
        assert!((x * x + y * y + z * z).sqrt() <= 4500.0 + 0.01);
        assert!(spec.world_size < 2000.0);
        assert_eq!(spec.halo_blur, Some(50.0));
    }
}
