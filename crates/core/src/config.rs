//! Configuration loading and validation.
//!
//! Configuration is read from the environment once, at startup, and then
//! passed around explicitly. The analysis client never looks at the
//! environment itself.

use crate::error::{AppError, Result};
use std::env;
use url::Url;

/// Environment variable holding the Gemini API key.
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";
/// Environment variable overriding the model name.
pub const MODEL_VAR: &str = "GEMINI_MODEL";
/// Environment variable overriding the API base URL.
pub const BASE_URL_VAR: &str = "GEMINI_API_BASE_URL";

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";

/// Validated configuration for the analysis client.
///
/// A `Config` always carries a non-empty API key; use [`Config::builder`]
/// or [`Config::load`] to obtain one.
#[derive(Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub model_name: String,
    pub base_url: Url,
}

impl Config {
    /// Loads configuration from the environment (including `.env` files).
    ///
    /// # Errors
    ///
    /// Returns [`AppError::MissingEnvVar`] if `GEMINI_API_KEY` is unset or blank.
    pub fn load() -> Result<Self> {
        ConfigBuilder::from_env().build()
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Full URL of the `generateContent` endpoint for the configured model.
    pub fn endpoint(&self) -> Result<Url> {
        let path = format!("{}:generateContent", normalize_model_name(&self.model_name));
        self.base_url
            .join(&path)
            .map_err(|e| AppError::config(format!("Invalid endpoint URL: {}", e)))
    }
}

// Hand-written so the key never ends up in logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("gemini_api_key", &"<redacted>")
            .field("model_name", &self.model_name)
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

/// Builder for [`Config`].
///
/// Every field is optional until [`ConfigBuilder::build`], which enforces
/// that an API key is present.
#[derive(Clone, Default)]
pub struct ConfigBuilder {
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
}

impl ConfigBuilder {
    /// Seeds a builder from the process environment.
    ///
    /// Loads a `.env` file if one exists. Missing variables are left unset,
    /// so this never fails; validation happens in [`ConfigBuilder::build`].
    pub fn from_env() -> Self {
        // Load .env file if it exists, ignore if it doesn't
        let _ = dotenvy::dotenv();

        Self {
            api_key: env::var(API_KEY_VAR).ok(),
            model: env::var(MODEL_VAR).ok(),
            base_url: env::var(BASE_URL_VAR).ok(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// The API key currently held by the builder, if any.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// The model name that [`ConfigBuilder::build`] would use.
    pub fn model(&self) -> &str {
        self.explicit_model().unwrap_or(DEFAULT_MODEL)
    }

    /// The model set explicitly through the environment or an override.
    pub fn explicit_model(&self) -> Option<&str> {
        self.model.as_deref().filter(|m| !m.trim().is_empty())
    }

    /// Returns true when a non-blank API key is set.
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Validates the collected values and produces a [`Config`].
    ///
    /// # Errors
    ///
    /// - [`AppError::MissingEnvVar`] if no API key is set
    /// - [`AppError::Config`] if the base URL cannot be parsed
    pub fn build(self) -> Result<Config> {
        let api_key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::MissingEnvVar(API_KEY_VAR.to_string()))?
            .to_string();

        let model_name = self.model().trim().to_string();

        let raw_base = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(DEFAULT_BASE_URL);

        // Url::join drops the last path segment unless the base ends in '/'
        let raw_base = if raw_base.ends_with('/') {
            raw_base.to_string()
        } else {
            format!("{}/", raw_base)
        };

        let base_url = Url::parse(&raw_base)
            .map_err(|e| AppError::config(format!("Invalid base URL '{}': {}", raw_base, e)))?;

        Ok(Config {
            gemini_api_key: api_key,
            model_name,
            base_url,
        })
    }
}

/// Ensures a model name has the `models/` prefix expected by the REST API.
pub fn normalize_model_name(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_api_key() {
        let err = Config::builder().build().unwrap_err();
        assert!(matches!(err, AppError::MissingEnvVar(ref v) if v == API_KEY_VAR));
        assert!(err.is_config());
    }

    #[test]
    fn blank_api_key_is_rejected() {
        let result = Config::builder().with_api_key("   ").build();
        assert!(matches!(result, Err(AppError::MissingEnvVar(_))));
    }

    #[test]
    fn blank_model_falls_back_to_default() {
        let builder = ConfigBuilder::default().with_model("  ");
        assert_eq!(builder.explicit_model(), None);
        assert_eq!(builder.model(), DEFAULT_MODEL);
    }

    #[test]
    fn defaults_are_applied() {
        let config = Config::builder().with_api_key("key").build().unwrap();
        assert_eq!(config.model_name, DEFAULT_MODEL);
        assert_eq!(config.base_url.as_str(), DEFAULT_BASE_URL);
    }

    #[test]
    fn endpoint_points_at_generate_content() {
        let config = Config::builder().with_api_key("key").build().unwrap();
        assert_eq!(
            config.endpoint().unwrap().as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn base_url_without_trailing_slash_keeps_its_path() {
        let config = Config::builder()
            .with_api_key("key")
            .with_base_url("http://localhost:8080/v1beta")
            .with_model("models/gemini-flash-latest")
            .build()
            .unwrap();
        assert_eq!(
            config.endpoint().unwrap().as_str(),
            "http://localhost:8080/v1beta/models/gemini-flash-latest:generateContent"
        );
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        let result = Config::builder()
            .with_api_key("key")
            .with_base_url("not a url")
            .build();
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn debug_output_redacts_key() {
        let config = Config::builder().with_api_key("super-secret").build().unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super-secret"));
    }

    #[test]
    fn normalize_adds_prefix_once() {
        assert_eq!(normalize_model_name("gemini-pro"), "models/gemini-pro");
        assert_eq!(normalize_model_name("models/gemini-pro"), "models/gemini-pro");
    }
}
