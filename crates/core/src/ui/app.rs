//! Main window.
//!
//! This module contains `PlantDoctorApp`, which implements `eframe::App`.
//! It translates widget interactions into [`AppState`] events, runs
//! analyses on a background thread, and renders from the current state.

use super::rendering::{draw_error_banner, draw_image_preview, draw_result, to_color_image};
use super::settings::{AVAILABLE_MODELS, Settings};
use super::state::{AppState, Phase};
use crate::config::ConfigBuilder;
use crate::error::{AppError, Result};
use crate::gemini::AnalysisResult;
use crate::image_processing::SUPPORTED_EXTENSIONS;
use crate::report;
use eframe::egui;
use egui_commonmark::CommonMarkCache;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

/// The plant disease detection window.
pub struct PlantDoctorApp {
    state: AppState,

    // Configuration seeded from the environment; settings are layered on top
    base_config: ConfigBuilder,
    settings: Settings,
    show_settings: bool,

    // Image preview
    texture: Option<egui::TextureHandle>,
    pending_image: Option<egui::ColorImage>,

    // Background analysis results
    rx: Receiver<AnalysisResult>,
    tx: Sender<AnalysisResult>,

    markdown_cache: CommonMarkCache,
}

impl PlantDoctorApp {
    /// Creates the window state.
    ///
    /// # Arguments
    /// * `base_config` - Configuration seeded from the environment
    /// * `initial_image` - Optional image to load on startup
    pub fn new(base_config: ConfigBuilder, initial_image: Option<PathBuf>) -> Self {
        let (tx, rx) = channel();

        let mut settings = Settings::load(base_config.model());
        // An explicit model wins over the saved one at startup
        if let Some(model) = base_config.explicit_model() {
            settings.model = model.to_string();
        }
        let state = AppState::new(settings.apply_to(&base_config));

        let mut app = Self {
            state,
            base_config,
            settings,
            show_settings: false,
            texture: None,
            pending_image: None,
            rx,
            tx,
            markdown_cache: CommonMarkCache::default(),
        };

        if let Some(path) = initial_image {
            // Failures are already recorded as the state's notice
            let _ = app.load_path(&path);
        }

        app
    }

    /// Reads a file from disk and feeds it to the upload handler.
    fn load_path(&mut self, path: &Path) -> Result<()> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                let error = AppError::decoding(format!("Failed to read {}: {}", path.display(), e));
                tracing::warn!(error = %error, "upload failed");
                self.state.set_notice(error.to_string());
                return Err(error);
            }
        };

        self.load_bytes(name, &bytes)
    }

    fn load_bytes(&mut self, name: String, bytes: &[u8]) -> Result<()> {
        let upload = self.state.on_file_uploaded(name, bytes)?;
        self.pending_image = Some(to_color_image(&upload.image));
        self.texture = None;
        Ok(())
    }

    /// Starts an analysis on a background thread.
    ///
    /// The thread owns its own single-threaded runtime and reports the
    /// result through the channel.
    fn submit_analysis(&mut self, ctx: &egui::Context) {
        let job = match self.state.on_analyze_triggered() {
            Ok(job) => job,
            // The state keeps the error as its notice
            Err(_) => return,
        };

        let tx = self.tx.clone();
        let ctx = ctx.clone();

        thread::spawn(move || {
            let result = job.run_blocking();
            let _ = tx.send(result);
            ctx.request_repaint();
        });
    }

    /// Delivers finished analyses to the state.
    fn process_results(&mut self) {
        while let Ok(result) = self.rx.try_recv() {
            self.state.on_analysis_finished(result);
        }
    }

    /// Loads files dropped onto the window.
    fn process_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());

        // Only the last dropped file is kept, as with a single upload
        if let Some(file) = dropped.into_iter().last() {
            let _ = if let Some(bytes) = file.bytes {
                self.load_bytes(file.name, &bytes)
            } else if let Some(path) = file.path {
                self.load_path(&path)
            } else {
                Ok(())
            };
        }
    }

    fn upload_pending_texture(&mut self, ctx: &egui::Context) {
        if let Some(color_image) = self.pending_image.take() {
            self.texture = Some(ctx.load_texture(
                "uploaded_image",
                color_image,
                egui::TextureOptions::LINEAR,
            ));
        }
    }

    fn pick_file(&mut self) {
        let picked = rfd::FileDialog::new()
            .add_filter("Images", SUPPORTED_EXTENSIONS)
            .pick_file();

        if let Some(path) = picked {
            let _ = self.load_path(&path);
        }
    }

    /// Persists settings and pushes them into the state's configuration.
    fn apply_settings(&mut self) {
        if let Err(e) = self.settings.save() {
            tracing::warn!(error = %e, "failed to save settings");
        }
        self.state.set_config(self.settings.apply_to(&self.base_config));
    }

    fn render_header(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("AI-Powered Plant Disease Detection 🌿");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("⚙ Settings").clicked() {
                    self.show_settings = !self.show_settings;
                }
            });
        });
        ui.label("Upload a plant image to detect diseases and get treatment recommendations");

        if let Some(message) = self.state.config_error() {
            draw_error_banner(ui, &message);
        }

        if self.show_settings {
            self.render_settings_ui(ui);
        }
        ui.add_space(4.0);
    }

    /// Renders the settings panel.
    fn render_settings_ui(&mut self, ui: &mut egui::Ui) {
        let before = self.settings.clone();

        ui.separator();
        egui::ComboBox::from_label("Model")
            .selected_text(&self.settings.model)
            .show_ui(ui, |ui| {
                for model in AVAILABLE_MODELS {
                    ui.selectable_value(&mut self.settings.model, model.to_string(), *model);
                }
            });

        ui.horizontal(|ui| {
            ui.label("API Key:");
            ui.add(
                egui::TextEdit::singleline(&mut self.settings.api_key)
                    .password(true)
                    .hint_text("Paste Gemini API Key"),
            );
        });

        if self.settings != before {
            self.apply_settings();
        }
    }

    fn render_image_column(&mut self, ui: &mut egui::Ui) {
        let busy = self.state.is_busy();
        if ui
            .add_enabled(!busy, egui::Button::new("Choose an image..."))
            .clicked()
        {
            self.pick_file();
        }
        ui.label(
            egui::RichText::new("JPG, JPEG or PNG. You can also drop a file onto the window.")
                .small()
                .color(egui::Color32::GRAY),
        );

        if let Some(notice) = self.state.notice() {
            draw_error_banner(ui, notice);
        }

        ui.add_space(8.0);
        if let (Some(texture), Some(upload)) = (&self.texture, self.state.upload()) {
            draw_image_preview(ui, texture, &format!("Uploaded Image: {}", upload.name));
        }
    }

    fn render_analysis_column(&mut self, ui: &mut egui::Ui) {
        if self.state.upload().is_none() {
            return;
        }

        let ctx = ui.ctx().clone();
        if ui
            .add_enabled(self.state.can_analyze(), egui::Button::new("Analyze Plant"))
            .clicked()
        {
            self.submit_analysis(&ctx);
        }
        ui.add_space(8.0);

        match self.state.phase() {
            Phase::Idle => {}
            Phase::Analyzing => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Analyzing image...");
                });
            }
            Phase::Finished(result) => {
                if ui.button("Copy").clicked() {
                    match arboard::Clipboard::new() {
                        Ok(mut clipboard) => {
                            if let Err(e) = clipboard.set_text(report::to_markdown(result)) {
                                tracing::warn!(error = %e, "failed to copy result");
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "clipboard unavailable"),
                    }
                }
                draw_result(ui, &mut self.markdown_cache, result);
            }
        }
    }
}

impl eframe::App for PlantDoctorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_results();
        self.process_dropped_files(ctx);
        self.upload_pending_texture(ctx);

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            self.render_header(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.columns(2, |columns| {
                self.render_image_column(&mut columns[0]);
                self.render_analysis_column(&mut columns[1]);
            });
        });
    }
}

/// Opens the window and blocks until it is closed.
///
/// # Arguments
/// * `base_config` - Configuration seeded from the environment
/// * `initial_image` - Optional image to load on startup
pub fn run(base_config: ConfigBuilder, initial_image: Option<PathBuf>) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Plant Disease Detection")
            .with_inner_size([1100.0, 720.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Plant Disease Detection",
        options,
        Box::new(move |_cc| {
            Ok(Box::new(PlantDoctorApp::new(base_config, initial_image)) as Box<dyn eframe::App>)
        }),
    )
    .map_err(|e| AppError::ui(format!("Failed to run UI: {}", e)))
}
