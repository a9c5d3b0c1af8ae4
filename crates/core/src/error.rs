//! Error types for the plant-doctor-core library.
//!
//! This module provides granular error variants for different failure modes,
//! enabling precise error handling and user-friendly error messages.
//!
//! Failures of the analysis call itself are not raised through [`AppError`];
//! they are folded into [`crate::gemini::AnalysisResult::Error`] so the UI
//! never has to handle a fault from the client.

use thiserror::Error;

/// Errors that can occur within the plant-doctor-core library.
///
/// Each variant represents a specific failure mode with contextual information
/// to help diagnose and handle errors appropriately.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors (invalid values).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required environment variable was not found.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// The image could not be serialized to PNG.
    #[error("Image encoding failed: {0}")]
    Encoding(String),

    /// The uploaded file could not be decoded as a supported image.
    #[error("Image decoding failed: {0}")]
    Decoding(String),

    /// The uploaded file is in a format other than JPEG or PNG.
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An analysis was requested before any image was loaded.
    #[error("No image loaded, upload a plant photo first")]
    NoImage,

    /// An analysis was requested while another one is still running.
    #[error("An analysis is already in progress")]
    Busy,

    /// UI-related errors (rendering, window management).
    #[error("UI error: {0}")]
    Ui(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an image encoding error with the given message.
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    /// Creates an image decoding error with the given message.
    pub fn decoding(msg: impl Into<String>) -> Self {
        Self::Decoding(msg.into())
    }

    /// Creates a UI error with the given message.
    pub fn ui(msg: impl Into<String>) -> Self {
        Self::Ui(msg.into())
    }

    /// Returns true for errors caused by missing or invalid configuration.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::MissingEnvVar(_))
    }
}

/// A convenient alias for Result with [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;
