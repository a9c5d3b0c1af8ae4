//! Plant Doctor Core Library
//!
//! This library provides the core functionality for the plant-doctor tool:
//! send a plant photo to Google's Gemini API and present the returned
//! diagnosis (disease, severity, treatment, prevention, overall health).
//!
//! # Overview
//!
//! - **Image Processing**: Upload decoding and base64 PNG encoding via [`image_processing`]
//! - **AI Integration**: The `generateContent` request/response adapter via [`gemini`]
//! - **Presentation**: Result sections and Markdown via [`report`]
//! - **User Interface**: Desktop window via [`ui`]
//!
//! # Quick Start
//!
//! The simplest way to use the library is through the [`PlantDoctor`] facade:
//!
//! ```ignore
//! use plant_doctor_core::PlantDoctor;
//!
//! // Initialize with environment configuration
//! let doctor = PlantDoctor::new()?;
//!
//! let image = doctor.load_image("leaf.jpg")?;
//! let result = doctor.analyze(&image).await;
//! println!("{}", plant_doctor_core::report::to_markdown(&result));
//! ```
//!
//! # Module Structure
//!
//! - [`config`]: Configuration loading and management
//! - [`error`]: Error types and result aliases
//! - [`gemini`]: Gemini client and the analysis result type
//! - [`image_processing`]: Image decoding and encoding utilities
//! - [`report`]: Rendering analysis results for display
//! - [`ui`]: User interface components

pub mod config;
pub mod error;
pub mod gemini;
pub mod image_processing;
pub mod report;
pub mod ui;

// Re-export primary types for convenience
pub use config::{Config, ConfigBuilder};
pub use error::{AppError, Result};
pub use gemini::{AnalysisResult, ErrorKind, GeminiClient};
pub use image_processing::{EncodedImage, ImageProcessor};

use image::DynamicImage;
use std::path::Path;

/// Main entry point for headless analysis.
///
/// Holds a validated configuration and a ready client. Constructing one
/// fails when no API key is configured, so no request can be made
/// without a key.
///
/// # Example
///
/// ```ignore
/// use plant_doctor_core::PlantDoctor;
///
/// let doctor = PlantDoctor::new()?;
/// let result = doctor.analyze_file("leaf.jpg").await?;
/// ```
pub struct PlantDoctor {
    config: Config,
    client: GeminiClient,
}

impl PlantDoctor {
    /// Creates an instance from environment configuration.
    ///
    /// Loads configuration from environment variables (including `.env` files).
    ///
    /// # Errors
    ///
    /// Returns an error if `GEMINI_API_KEY` is missing or the client
    /// cannot be created.
    pub fn new() -> Result<Self> {
        Self::with_config(Config::load()?)
    }

    /// Creates an instance with custom configuration.
    ///
    /// Use this when you need to override environment-based configuration,
    /// such as specifying a different model, API key, or endpoint.
    pub fn with_config(config: Config) -> Result<Self> {
        let client = GeminiClient::new(&config)?;
        Ok(Self { config, client })
    }

    /// Reads and decodes a JPEG or PNG file.
    pub fn load_image(&self, path: impl AsRef<Path>) -> Result<DynamicImage> {
        let bytes = std::fs::read(path.as_ref())?;
        ImageProcessor::decode_upload(&bytes)
    }

    /// Analyzes a decoded image. See [`GeminiClient::analyze`].
    pub async fn analyze(&self, image: &DynamicImage) -> AnalysisResult {
        self.client.analyze(image).await
    }

    /// Loads a file and analyzes it.
    ///
    /// # Errors
    ///
    /// Only file reading and decoding fail with `Err`; analysis failures
    /// are returned as [`AnalysisResult::Error`].
    pub async fn analyze_file(&self, path: impl AsRef<Path>) -> Result<AnalysisResult> {
        let image = self.load_image(path)?;
        Ok(self.analyze(&image).await)
    }

    /// Returns a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Initializes the library by loading environment variables.
///
/// Call this once at application startup before using any other functions.
/// This loads `.env` files if present.
pub fn init() {
    let _ = dotenvy::dotenv();
}
