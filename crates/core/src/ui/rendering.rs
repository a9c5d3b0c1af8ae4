//! Rendering helpers for the analysis window.
//!
//! Everything here draws from borrowed state and never mutates it.

use crate::gemini::AnalysisResult;
use crate::report;
use eframe::egui;
use egui_commonmark::{CommonMarkCache, CommonMarkViewer};
use image::DynamicImage;

/// Converts a decoded image into egui's texture input format.
pub fn to_color_image(image: &DynamicImage) -> egui::ColorImage {
    let image_buffer = image.to_rgba8();
    let size = [image.width() as usize, image.height() as usize];
    let pixels = image_buffer.as_flat_samples();
    egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice())
}

/// Draws the uploaded image scaled to fit the available width.
pub fn draw_image_preview(ui: &mut egui::Ui, texture: &egui::TextureHandle, caption: &str) {
    let available = ui.available_width();
    let size = texture.size_vec2();
    let scale = if size.x > available { available / size.x } else { 1.0 };

    ui.add(egui::Image::new((texture.id(), size * scale)));
    ui.label(egui::RichText::new(caption).small().color(egui::Color32::GRAY));
}

/// Draws an analysis result.
///
/// Structured and raw text results are rendered as Markdown; errors are
/// shown in red with any details in a code block.
pub fn draw_result(ui: &mut egui::Ui, cache: &mut CommonMarkCache, result: &AnalysisResult) {
    match result {
        AnalysisResult::Structured(_) | AnalysisResult::RawText(_) => {
            ui.label(egui::RichText::new("Analysis Complete!").color(egui::Color32::LIGHT_GREEN));
            ui.add_space(6.0);
            egui::ScrollArea::vertical()
                .id_salt("analysis_result")
                .show(ui, |ui| {
                    CommonMarkViewer::new().show(ui, cache, &report::to_markdown(result));
                });
        }
        AnalysisResult::Error(err) => {
            ui.label(egui::RichText::new(&err.message).color(egui::Color32::RED));
            ui.label(
                egui::RichText::new(err.kind.to_string())
                    .small()
                    .color(egui::Color32::GRAY),
            );
            if let Some(details) = err.details.as_deref().filter(|d| !d.trim().is_empty()) {
                ui.add_space(4.0);
                egui::ScrollArea::vertical()
                    .id_salt("analysis_error_details")
                    .max_height(240.0)
                    .show(ui, |ui| {
                        ui.code(details);
                    });
            }
        }
    }
}

/// Draws a red banner line.
pub fn draw_error_banner(ui: &mut egui::Ui, message: &str) {
    ui.label(egui::RichText::new(message).color(egui::Color32::RED));
}
