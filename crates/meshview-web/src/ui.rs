//! UI overlays using bevy_egui

use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};
use meshview_core::{ModelFormat, Rgb, ViewerPhase};

use crate::app::{Viewer, ViewerSettings};
use crate::file_picker::{open_file_dialog, DragHover, PendingPicks};
use crate::scene::OrbitCamera;
use crate::transport::StoredModels;

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        // Runs in EguiPrimaryContextPass for proper input handling (bevy_egui 0.38+)
        app.add_systems(EguiPrimaryContextPass, ui_system);
    }
}

fn ui_system(
    mut contexts: EguiContexts,
    mut viewer: ResMut<Viewer>,
    mut orbit: ResMut<OrbitCamera>,
    settings: Res<ViewerSettings>,
    picks: Res<PendingPicks>,
    hover: Res<DragHover>,
    stored: Res<StoredModels>,
) {
    // Get the egui context - early return if not available
    let Ok(ctx) = contexts.ctx_mut() else { return };

    egui::TopBottomPanel::top("header").show(ctx, |ui| {
        ui.horizontal(|ui| {
            ui.heading("3D Model Viewer");
            if let Some(name) = viewer.0.file_name() {
                ui.separator();
                ui.label(name);
            }
        });
    });

    match viewer.0.phase().clone() {
        ViewerPhase::NoFile | ViewerPhase::Error { .. } => {
            picker_window(ctx, &mut viewer, &settings, &picks, &hover, &stored);
        }
        ViewerPhase::Uploading => {
            egui::Window::new("Uploading")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
                .show(ctx, |ui| {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Uploading model...");
                    });
                });
        }
        ViewerPhase::Viewing { .. } => {
            if viewer.0.camera_frame().is_none() {
                egui::Area::new(egui::Id::new("loading"))
                    .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
                    .show(ctx, |ui| {
                        ui.horizontal(|ui| {
                            ui.spinner();
                            ui.label("Loading model...");
                        });
                    });
            }
            view_controls(ctx, &mut viewer, &mut orbit);
        }
    }
}

/// File selection: drop zone, button, errors and previously uploaded models
fn picker_window(
    ctx: &egui::Context,
    viewer: &mut Viewer,
    settings: &ViewerSettings,
    picks: &PendingPicks,
    hover: &DragHover,
    stored: &StoredModels,
) {
    egui::Window::new("Open a model")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
        .show(ctx, |ui| {
            ui.set_min_width(320.0);

            if let Some(error) = viewer.0.error().map(str::to_string) {
                ui.horizontal(|ui| {
                    ui.colored_label(egui::Color32::RED, error);
                    if offers_new_model(viewer.0.phase()) && ui.button("New Model").clicked() {
                        viewer.0.new_model();
                    }
                });
                ui.add_space(8.0);
            }

            let stroke_color = if hover.is_hovering() {
                egui::Color32::from_rgb(66, 133, 244)
            } else {
                egui::Color32::GRAY
            };
            egui::Frame::group(ui.style())
                .stroke(egui::Stroke::new(2.0, stroke_color))
                .show(ui, |ui| {
                    ui.set_min_width(300.0);
                    ui.vertical_centered(|ui| {
                        ui.add_space(16.0);
                        ui.label(format!(
                            "Drag and drop a model here ({})",
                            supported_formats()
                        ));
                        ui.add_space(8.0);
                        ui.label("or");
                        ui.add_space(8.0);
                        if ui.button("Select File").clicked() {
                            open_file_dialog(picks);
                        }
                        ui.add_space(16.0);
                    });
                });

            if let Some(notice) = viewer.0.notice() {
                ui.add_space(4.0);
                ui.colored_label(egui::Color32::from_rgb(200, 120, 0), notice);
            }

            if stored.loading || !stored.models.is_empty() {
                ui.add_space(8.0);
                ui.separator();
                ui.label("Previously uploaded");
                if stored.loading {
                    ui.spinner();
                }
                egui::ScrollArea::vertical()
                    .max_height(160.0)
                    .show(ui, |ui| {
                        for name in &stored.models {
                            if ui.selectable_label(false, name).clicked() {
                                let url = settings.upload().model_url(name);
                                if let Err(rejection) = viewer.0.open_existing(name, url) {
                                    viewer.0.reject(&rejection);
                                }
                            }
                        }
                    });
            }
        });
}

/// Bottom toolbar shown while a model is on screen
fn view_controls(ctx: &egui::Context, viewer: &mut Viewer, orbit: &mut OrbitCamera) {
    egui::TopBottomPanel::bottom("view_controls").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if offers_new_model(viewer.0.phase()) && ui.button("New Model").clicked() {
                viewer.0.new_model();
                return;
            }

            let reset = viewer.0.reset_camera();
            if ui
                .add_enabled(reset.is_some(), egui::Button::new("Reset View"))
                .clicked()
            {
                if let Some(frame) = reset {
                    orbit.frame(&frame);
                }
            }

            let display = viewer.0.display();
            let mut wireframe = display.wireframe;
            if ui.toggle_value(&mut wireframe, "Wireframe").clicked() {
                viewer.0.toggle_wireframe();
            }

            ui.separator();
            ui.label("Color");
            let mut rgb = display.color.to_array();
            if ui.color_edit_button_srgb(&mut rgb).changed() {
                viewer.0.set_color(Rgb::from_array(rgb));
            }
            ui.monospace(display.color.to_hex());
        });
    });
}

/// Phases with a model or an error to dismiss
fn offers_new_model(phase: &ViewerPhase) -> bool {
    matches!(phase, ViewerPhase::Viewing { .. } | ViewerPhase::Error { .. })
}

fn supported_formats() -> String {
    ModelFormat::ALL
        .iter()
        .map(|f| f.name())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_model_offered_after_error() {
        let mut viewer = meshview_core::ViewerState::default();
        assert!(!offers_new_model(viewer.phase()));

        let file = meshview_core::accept_file("part.stl", b"solid".to_vec()).unwrap();
        let session = viewer.select_file(&file).unwrap();
        assert!(!offers_new_model(viewer.phase()));

        viewer.upload_finished(
            session,
            Err(meshview_core::UploadError::Rejected {
                status: 500,
                detail: None,
            }),
        );
        assert!(offers_new_model(viewer.phase()));

        viewer.new_model();
        assert_eq!(viewer.phase(), &ViewerPhase::NoFile);
        assert!(viewer.error().is_none());
        assert!(!offers_new_model(viewer.phase()));
    }

    #[test]
    fn test_supported_formats_lists_every_format() {
        let formats = supported_formats();
        for format in ModelFormat::ALL {
            assert!(formats.contains(format.name()));
        }
    }
}
