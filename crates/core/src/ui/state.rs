//! UI state and event handlers.
//!
//! The window is driven by three events, each with its own handler:
//! a file was uploaded, analysis was triggered, and analysis finished.
//! Handlers are the only code that mutates [`AppState`]; rendering only
//! reads it. None of this depends on egui, so it is tested directly.

use crate::config::{API_KEY_VAR, Config, ConfigBuilder};
use crate::error::{AppError, Result};
use crate::gemini::{AnalysisResult, ErrorKind, GeminiClient};
use crate::image_processing::ImageProcessor;
use image::DynamicImage;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// A decoded upload, shared with the analysis job without copying pixels.
#[derive(Clone)]
pub struct Upload {
    pub name: String,
    pub image: Arc<DynamicImage>,
}

/// Where the window is in the analyze cycle.
///
/// `Idle` -> `Analyzing` -> `Finished` -> (`Analyzing` again, or `Idle` on a new upload)
#[derive(Clone, Debug, PartialEq)]
pub enum Phase {
    /// Nothing requested yet for the current image.
    Idle,
    /// A request is in flight; re-entry is refused.
    Analyzing,
    /// The last analysis completed.
    Finished(AnalysisResult),
}

/// Work handed to the background thread for one analysis.
pub struct AnalysisJob {
    config: Config,
    image: Arc<DynamicImage>,
}

impl AnalysisJob {
    pub fn new(config: Config, image: Arc<DynamicImage>) -> Self {
        Self { config, image }
    }

    /// Runs the analysis. Never fails; failures come back as
    /// [`AnalysisResult::Error`].
    pub async fn run(self) -> AnalysisResult {
        match GeminiClient::new(&self.config) {
            Ok(client) => client.analyze(&self.image).await,
            Err(e) => AnalysisResult::error(ErrorKind::RequestFailed, e.to_string()),
        }
    }

    /// Runs the analysis to completion on the current thread.
    ///
    /// Used from the window's worker thread, which has no runtime of its own.
    pub fn run_blocking(self) -> AnalysisResult {
        block_on_analysis(self.run())
    }
}

/// Drives an analysis future on a fresh single-threaded runtime.
///
/// A panic inside the future is turned into a `RequestFailed` result so the
/// window always receives exactly one result per job.
pub(crate) fn block_on_analysis<F>(future: F) -> AnalysisResult
where
    F: Future<Output = AnalysisResult>,
{
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            return AnalysisResult::error(
                ErrorKind::RequestFailed,
                format!("Failed to create async runtime: {}", e),
            );
        }
    };

    match panic::catch_unwind(AssertUnwindSafe(|| runtime.block_on(future))) {
        Ok(result) => result,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(%reason, "analysis worker panicked");
            AnalysisResult::error(
                ErrorKind::RequestFailed,
                format!("Analysis aborted: {}", reason),
            )
        }
    }
}

pub struct AppState {
    config: ConfigBuilder,
    upload: Option<Upload>,
    phase: Phase,
    notice: Option<String>,
}

impl AppState {
    pub fn new(config: ConfigBuilder) -> Self {
        Self {
            config,
            upload: None,
            phase: Phase::Idle,
            notice: None,
        }
    }

    pub fn config(&self) -> &ConfigBuilder {
        &self.config
    }

    /// Replaces the configuration (e.g. after the settings panel changed).
    pub fn set_config(&mut self, config: ConfigBuilder) {
        self.config = config;
    }

    pub fn upload(&self) -> Option<&Upload> {
        self.upload.as_ref()
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Last upload or trigger problem to show the user, if any.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn set_notice(&mut self, message: impl Into<String>) {
        self.notice = Some(message.into());
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.phase, Phase::Analyzing)
    }

    /// Message shown while no API key is configured.
    pub fn config_error(&self) -> Option<String> {
        if self.config.has_api_key() {
            None
        } else {
            Some(format!(
                "Please configure your Gemini API key: set {} in the environment or .env file, or enter it in Settings",
                API_KEY_VAR
            ))
        }
    }

    pub fn can_analyze(&self) -> bool {
        !self.is_busy() && self.upload.is_some() && self.config.has_api_key()
    }

    /// Handles "file uploaded": decodes the bytes and makes them the
    /// current image.
    ///
    /// On failure the previous image stays loaded and the error becomes
    /// the notice.
    pub fn on_file_uploaded(&mut self, name: impl Into<String>, bytes: &[u8]) -> Result<&Upload> {
        if self.is_busy() {
            return Err(self.reject(AppError::Busy));
        }

        let name = name.into();
        let image = match ImageProcessor::decode_upload(bytes) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "rejected upload");
                return Err(self.reject(e));
            }
        };

        tracing::info!(
            file = %name,
            width = image.width(),
            height = image.height(),
            "image loaded"
        );

        self.notice = None;
        self.phase = Phase::Idle;
        Ok(&*self.upload.insert(Upload {
            name,
            image: Arc::new(image),
        }))
    }

    /// Handles "analyze triggered".
    ///
    /// Returns the job to run off the UI thread. Refuses, without touching
    /// the network, when busy, when no API key is configured, or when no
    /// image is loaded.
    pub fn on_analyze_triggered(&mut self) -> Result<AnalysisJob> {
        if self.is_busy() {
            return Err(self.reject(AppError::Busy));
        }

        let config = match self.config.clone().build() {
            Ok(config) => config,
            Err(e) => return Err(self.reject(e)),
        };

        let Some(upload) = &self.upload else {
            return Err(self.reject(AppError::NoImage));
        };
        let image = Arc::clone(&upload.image);

        self.notice = None;
        self.phase = Phase::Analyzing;
        Ok(AnalysisJob::new(config, image))
    }

    /// Handles "analysis finished".
    pub fn on_analysis_finished(&mut self, result: AnalysisResult) {
        self.phase = Phase::Finished(result);
    }

    fn reject(&mut self, error: AppError) -> AppError {
        self.notice = Some(error.to_string());
        error
    }
}
