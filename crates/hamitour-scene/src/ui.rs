//! egui UI: loading and error states, spot info and the model inspection modal

use bevy::asset::LoadState;
use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass, EguiTextureHandle};

use hamitour_core::{ModelSession, ModelStatus, ModelTicket, PanoramaSessionState, SessionStatus, SpotId};

use crate::overlay::OverlayLayout;
use crate::surface::TourSession;
use crate::{NavigateTo, TourConfig};

const SCIENTIFIC_NAME_PREFIX: &str = "Scientific Name:";

/// One rendered line of a species description
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptionLine {
    /// Shown in italics under its label
    ScientificName(String),
    Paragraph(String),
}

/// Split a description into display lines, dropping blank ones
pub fn description_lines(description: &str) -> Vec<DescriptionLine> {
    description
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match line.strip_prefix(SCIENTIFIC_NAME_PREFIX) {
            Some(name) => DescriptionLine::ScientificName(name.trim().to_string()),
            None => DescriptionLine::Paragraph(line.to_string()),
        })
        .collect()
}

/// Spot title and Back are hidden while a model is being inspected
pub fn spot_panel_visible(state: &PanoramaSessionState) -> bool {
    state.status == SessionStatus::Ready && state.active_model().is_none()
}

/// Largest size that fits `native` into the bounds without upscaling
pub fn photo_display_size(native: Vec2, max_width: f32, max_height: f32) -> Vec2 {
    if native.x <= 0.0 || native.y <= 0.0 {
        return Vec2::ZERO;
    }
    let scale = (max_width / native.x).min(max_height / native.y).min(1.0).max(0.0);
    native * scale
}

struct PhotoTexture {
    ticket: ModelTicket,
    handle: Handle<Image>,
    texture: egui::TextureId,
}

/// Photo of the inspected species, registered with egui per model open
#[derive(Resource, Default)]
pub struct SpeciesPhoto {
    shown: Option<PhotoTexture>,
}

enum PhotoView {
    Loading,
    Ready(egui::TextureId, Vec2),
    Unavailable,
}

#[derive(SystemParam)]
pub struct UiParams<'w, 's> {
    pub contexts: EguiContexts<'w, 's>,
    pub session: ResMut<'w, TourSession>,
    pub config: Res<'w, TourConfig>,
    pub navigate: MessageWriter<'w, NavigateTo>,
    pub asset_server: Res<'w, AssetServer>,
    pub images: Res<'w, Assets<Image>>,
    pub photo: ResMut<'w, SpeciesPhoto>,
}

pub struct TourUiPlugin;

impl Plugin for TourUiPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SpeciesPhoto>()
            .add_systems(EguiPrimaryContextPass, ui_system);
    }
}

/// Load and register the photo for the open model, dropping the previous one
fn sync_species_photo(params: &mut UiParams) -> Option<PhotoView> {
    let wanted = params
        .session
        .state()
        .active_model()
        .filter(|model| !model.info.image_ref.is_empty())
        .map(|model| (model.ticket, model.info.image_ref.clone()));

    let current = params.photo.shown.as_ref().map(|photo| photo.ticket);
    if wanted.as_ref().map(|(ticket, _)| *ticket) != current {
        let next = wanted.map(|(ticket, url)| {
            tracing::debug!(url = %url, "Loading species photo");
            let handle: Handle<Image> = params.asset_server.load(url);
            let texture = params.contexts.add_image(EguiTextureHandle::Strong(handle.clone()));
            PhotoTexture { ticket, handle, texture }
        });
        params.photo.shown = next;
    }

    let photo = params.photo.shown.as_ref()?;
    if let Some(image) = params.images.get(&photo.handle) {
        return Some(PhotoView::Ready(photo.texture, image.size_f32()));
    }
    match params.asset_server.get_load_state(photo.handle.id()) {
        Some(LoadState::Failed(_)) => Some(PhotoView::Unavailable),
        _ => Some(PhotoView::Loading),
    }
}

fn ui_system(mut params: UiParams) {
    let photo = sync_species_photo(&mut params);
    let Ok(ctx) = params.contexts.ctx_mut() else { return };

    let back = back_target(params.config.home_spot_id.as_ref(), params.session.current_spot_id());

    match params.session.status() {
        SessionStatus::Idle => {
            egui::Area::new(egui::Id::new("idle"))
                .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
                .show(ctx, |ui| {
                    ui.label(egui::RichText::new("No spot selected").size(18.0).color(egui::Color32::WHITE));
                });
        }
        SessionStatus::Fetching | SessionStatus::Rendering => {
            egui::Area::new(egui::Id::new("loading"))
                .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
                .show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add(egui::Spinner::new().size(48.0));
                        ui.label(egui::RichText::new("Loading panorama...").color(egui::Color32::WHITE));
                    });
                });
        }
        SessionStatus::Error => {
            let message = params
                .session
                .state()
                .error_message()
                .unwrap_or_else(|| "Something went wrong.".to_string());
            let retryable = params
                .session
                .state()
                .error
                .as_ref()
                .is_some_and(|e| e.is_retryable());

            egui::CentralPanel::default()
                .frame(egui::Frame::new().fill(egui::Color32::from_rgb(18, 20, 18)))
                .show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(ui.available_height() * 0.35);
                        ui.heading("Unable to show this spot");
                        ui.add_space(8.0);
                        ui.colored_label(egui::Color32::from_rgb(230, 90, 90), &message);
                        ui.add_space(16.0);
                        ui.horizontal(|ui| {
                            if retryable && ui.button("Retry").clicked() {
                                params.session.retry();
                            }
                            if let Some(home) = &back {
                                if ui.button("Back").clicked() {
                                    params.navigate.write(NavigateTo(home.clone()));
                                }
                            }
                        });
                    });
                });
        }
        SessionStatus::Ready if spot_panel_visible(params.session.state()) => {
            if let Some(spot) = params.session.state().spot.clone() {
                egui::Window::new(spot.name.clone())
                    .id(egui::Id::new("spot_info"))
                    .anchor(egui::Align2::LEFT_TOP, egui::vec2(12.0, 12.0))
                    .collapsible(true)
                    .resizable(false)
                    .default_width(280.0)
                    .show(ctx, |ui| {
                        if !spot.description.is_empty() {
                            ui.label(&spot.description);
                        }
                        if let Some(home) = &back {
                            ui.separator();
                            if ui.button("⬅ Back").clicked() {
                                params.navigate.write(NavigateTo(home.clone()));
                            }
                        }
                    });
            }
        }
        SessionStatus::Ready => {}
    }

    let model = params.session.state().active_model().cloned();
    if let Some(model) = model {
        let close_clicked = model_modal(ctx, &model, photo.as_ref());
        let escape = ctx.input(|i| i.key_pressed(egui::Key::Escape));
        if close_clicked || escape {
            params.session.close_model();
        }
    }
}

fn to_egui(rect: Rect) -> egui::Rect {
    egui::Rect::from_min_max(egui::pos2(rect.min.x, rect.min.y), egui::pos2(rect.max.x, rect.max.y))
}

/// Draw the model modal. Returns true when the close button was clicked.
fn model_modal(ctx: &egui::Context, model: &ModelSession, photo: Option<&PhotoView>) -> bool {
    #[allow(deprecated)]
    let screen = ctx.screen_rect();
    let layout = OverlayLayout::compute(screen.width(), screen.height());
    let viewport = to_egui(layout.viewport);
    let info = to_egui(layout.info);

    // Dim everything except the model pane, where the inspection camera draws
    let painter = ctx.layer_painter(egui::LayerId::new(egui::Order::Background, egui::Id::new("model_dim")));
    let dim = egui::Color32::from_black_alpha(190);
    for band in [
        egui::Rect::from_min_max(screen.min, egui::pos2(screen.max.x, viewport.min.y)),
        egui::Rect::from_min_max(egui::pos2(screen.min.x, viewport.max.y), screen.max),
        egui::Rect::from_min_max(egui::pos2(screen.min.x, viewport.min.y), egui::pos2(viewport.min.x, viewport.max.y)),
        egui::Rect::from_min_max(egui::pos2(viewport.max.x, viewport.min.y), egui::pos2(screen.max.x, viewport.max.y)),
    ] {
        painter.rect_filled(band, 0.0, dim);
    }
    painter.rect_stroke(
        viewport,
        0.0,
        egui::Stroke::new(1.0, egui::Color32::from_gray(90)),
        egui::StrokeKind::Outside,
    );

    if matches!(model.status, ModelStatus::Opening | ModelStatus::Loading) {
        egui::Area::new(egui::Id::new("model_loading"))
            .fixed_pos(viewport.center() - egui::vec2(60.0, 30.0))
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.add(egui::Spinner::new().size(36.0));
                    ui.label(egui::RichText::new("Loading 3D model...").color(egui::Color32::WHITE));
                });
            });
    }

    let mut close_clicked = false;
    egui::Area::new(egui::Id::new("model_info"))
        .fixed_pos(info.min)
        .order(egui::Order::Foreground)
        .show(ctx, |ui| {
            egui::Frame::new()
                .fill(egui::Color32::from_rgb(28, 30, 28))
                .inner_margin(egui::Margin::same(16))
                .show(ui, |ui| {
                    let inner = info.size() - egui::vec2(32.0, 32.0);
                    ui.set_min_size(inner);
                    ui.set_max_size(inner);

                    ui.horizontal(|ui| {
                        ui.heading(&model.info.name);
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if ui.button("✕").clicked() {
                                close_clicked = true;
                            }
                        });
                    });
                    ui.separator();

                    if let Some(error) = &model.error_message {
                        egui::Frame::new()
                            .fill(egui::Color32::from_rgb(120, 30, 30))
                            .inner_margin(egui::Margin::same(8))
                            .show(ui, |ui| {
                                ui.colored_label(egui::Color32::WHITE, error);
                            });
                        ui.add_space(8.0);
                    }

                    egui::ScrollArea::vertical().show(ui, |ui| {
                        match photo {
                            Some(PhotoView::Ready(texture, native)) => {
                                let size = photo_display_size(*native, ui.available_width(), info.height() * 0.4);
                                ui.vertical_centered(|ui| {
                                    ui.add(egui::Image::new((*texture, egui::vec2(size.x, size.y))));
                                });
                                ui.add_space(8.0);
                            }
                            Some(PhotoView::Loading) => {
                                ui.add(egui::Spinner::new().size(20.0));
                            }
                            Some(PhotoView::Unavailable) => {
                                ui.hyperlink_to("📷 Photo", &model.info.image_ref);
                            }
                            None => {}
                        }
                        for line in description_lines(&model.info.description) {
                            match line {
                                DescriptionLine::ScientificName(name) => {
                                    ui.horizontal_wrapped(|ui| {
                                        ui.label(egui::RichText::new(SCIENTIFIC_NAME_PREFIX).strong());
                                        ui.label(egui::RichText::new(name).italics());
                                    });
                                }
                                DescriptionLine::Paragraph(text) => {
                                    ui.label(text);
                                }
                            }
                            ui.add_space(6.0);
                        }
                    });
                });
        });

    close_clicked
}

/// Back target for the current spot, if any
pub fn back_target(home: Option<&SpotId>, current: Option<&SpotId>) -> Option<SpotId> {
    home.filter(|home| Some(*home) != current).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_lines() {
        let lines = description_lines(
            "Scientific Name: Rhacophorus angulirostris\n\n  Endemic to the highlands.  \n\nNocturnal.",
        );
        assert_eq!(
            lines,
            vec![
                DescriptionLine::ScientificName("Rhacophorus angulirostris".into()),
                DescriptionLine::Paragraph("Endemic to the highlands.".into()),
                DescriptionLine::Paragraph("Nocturnal.".into()),
            ]
        );
    }

    #[test]
    fn test_description_without_scientific_name() {
        assert_eq!(
            description_lines("Just a note"),
            vec![DescriptionLine::Paragraph("Just a note".into())]
        );
        assert!(description_lines("\n \n").is_empty());
    }

    #[test]
    fn test_photo_display_size() {
        let native = Vec2::new(1200.0, 800.0);
        assert_eq!(photo_display_size(native, 300.0, 400.0), Vec2::new(300.0, 200.0));
        assert_eq!(photo_display_size(native, 900.0, 100.0), Vec2::new(150.0, 100.0));
        // Never upscaled
        assert_eq!(photo_display_size(Vec2::new(200.0, 100.0), 600.0, 600.0), Vec2::new(200.0, 100.0));
        assert_eq!(photo_display_size(Vec2::ZERO, 600.0, 600.0), Vec2::ZERO);
    }

    #[test]
    fn test_spot_panel_hidden_while_inspecting() {
        use crate::panorama::tests::{open_mossy, surface_app, tour_spots};
        use hamitour_core::HotspotKind;

        let mut app = surface_app();
        open_mossy(&mut app, &tour_spots());
        let mut session = app.world_mut().resource_mut::<TourSession>();
        assert!(spot_panel_visible(session.state()));

        let marker = session
            .attached_hotspots()
            .iter()
            .find(|h| h.def.kind() == HotspotKind::Model)
            .map(|h| h.handle)
            .unwrap();
        session.activate_hotspot(marker);
        assert!(!spot_panel_visible(session.state()));

        session.close_model();
        assert!(spot_panel_visible(session.state()));

        session.close();
        assert!(!spot_panel_visible(session.state()));
    }

    #[test]
    fn test_back_target() {
        let home = SpotId::new("home");
        let other = SpotId::new("other");
        assert_eq!(back_target(Some(&home), Some(&other)), Some(home.clone()));
        assert_eq!(back_target(Some(&home), Some(&home)), None);
        assert_eq!(back_target(None, Some(&other)), None);
    }
}
