//! User interface components for plant-doctor.
//!
//! This module provides the desktop window: load a plant photo, run the
//! analysis, and read the diagnosis.
//!
//! # Architecture
//!
//! The UI is split into focused submodules:
//! - [`state`]: Event handlers and the state they mutate (no egui types)
//! - [`settings`]: User preferences and persistence
//! - `rendering`: Drawing helpers that read state
//! - `app`: The `eframe::App` wiring
//!
//! # Usage
//!
//! ```ignore
//! use plant_doctor_core::{config::ConfigBuilder, ui};
//!
//! ui::run_app(ConfigBuilder::from_env(), Some("leaf.jpg".into()))?;
//! ```

mod app;
mod rendering;
pub mod settings;
pub mod state;

// Public API exports
pub use app::PlantDoctorApp;
pub use settings::{AVAILABLE_MODELS, Settings};
pub use state::{AnalysisJob, AppState, Phase, Upload};

use crate::config::ConfigBuilder;
use crate::error::Result;
use std::path::PathBuf;

/// Launches the desktop window and blocks until it is closed.
///
/// The window starts even without an API key; it then shows a
/// configuration error and keeps the analyze button disabled.
///
/// # Arguments
/// * `config` - Configuration seeded from the environment
/// * `initial_image` - Optional image file to load on startup
pub fn run_app(config: ConfigBuilder, initial_image: Option<PathBuf>) -> Result<()> {
    app::run(config, initial_image)
}
