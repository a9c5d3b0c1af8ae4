//! Gemini image analysis client.
//!
//! Builds a single `generateContent` request carrying the diagnosis prompt and
//! the inline PNG image, sends it, and folds every possible outcome into an
//! [`AnalysisResult`]. Callers never see an `Err` from [`GeminiClient::analyze`].

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::image_processing::{ENCODED_MIME_TYPE, EncodedImage, ImageProcessor};
use image::DynamicImage;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, info, warn};
use url::Url;

/// Header carrying the API key. The key is never put in the URL or body.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

pub const TEMPERATURE: f32 = 0.4;
pub const TOP_K: u32 = 32;
pub const TOP_P: f32 = 1.0;
pub const MAX_OUTPUT_TOKENS: u32 = 2048;

/// Instruction sent alongside every image.
pub const DIAGNOSIS_PROMPT: &str = "\
Analyze this plant image and provide the following information:
1. Identify if there are any visible diseases
2. If disease is detected, provide:
   - Disease name
   - Severity level (Low/Medium/High)
   - Treatment recommendations
   - Preventive measures
3. General plant health assessment

Format the response in JSON format.";

// -- Request types --

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub contents: Vec<RequestContent>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestContent {
    pub parts: Vec<RequestPart>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: TEMPERATURE,
            top_k: TOP_K,
            top_p: TOP_P,
            max_output_tokens: MAX_OUTPUT_TOKENS,
        }
    }
}

impl AnalysisRequest {
    /// Builds the request for one image with the fixed prompt and sampling
    /// parameters.
    pub fn new(image: EncodedImage) -> Self {
        Self {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::Text {
                        text: DIAGNOSIS_PROMPT.to_string(),
                    },
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: ENCODED_MIME_TYPE.to_string(),
                            data: image.into_inner(),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig::default(),
        }
    }
}

// -- Response types --

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    // Outer None: key absent. Some(None): key present but null.
    #[serde(default, deserialize_with = "present")]
    candidates: Option<Option<Vec<Candidate>>>,
}

fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

// -- Result types --

/// Classification of a failed analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The image could not be serialized to PNG.
    Encoding,
    /// The API answered 200 without any candidates.
    NoResponse,
    /// The API answered with a non-200 status.
    Api(u16),
    /// Transport failure or an unreadable response.
    RequestFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encoding => f.write_str("EncodingError"),
            Self::NoResponse => f.write_str("NoResponse"),
            Self::Api(status) => write!(f, "ApiError:{}", status),
            Self::RequestFailed => f.write_str("RequestFailed"),
        }
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AnalysisError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

/// Outcome of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisResult {
    /// The model answered with a JSON object.
    Structured(Map<String, Value>),
    /// The model answered, but not with a JSON object.
    RawText(String),
    /// The analysis failed.
    Error(AnalysisError),
}

impl AnalysisResult {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error(AnalysisError::new(kind, message))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Interprets the model's generated text.
    ///
    /// Text that parses as a JSON object becomes
    /// [`AnalysisResult::Structured`]; anything else is kept verbatim as
    /// [`AnalysisResult::RawText`].
    pub fn from_generated_text(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(fields)) => Self::Structured(fields),
            _ => Self::RawText(text.to_string()),
        }
    }
}

/// Maps a 200 response body to a result.
fn interpret_success_body(body: &str) -> AnalysisResult {
    let envelope: GenerateContentResponse = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            return AnalysisResult::Error(
                AnalysisError::new(
                    ErrorKind::RequestFailed,
                    format!("Failed to parse API response: {}", e),
                )
                .with_details(body),
            );
        }
    };

    let Some(candidates) = envelope.candidates else {
        return AnalysisResult::error(ErrorKind::NoResponse, "No response from API");
    };

    let text = candidates
        .as_deref()
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.content.parts.first())
        .and_then(|part| part.text.as_deref());

    match text {
        Some(text) => AnalysisResult::from_generated_text(text),
        None => AnalysisResult::Error(
            AnalysisError::new(
                ErrorKind::RequestFailed,
                "Malformed API response: missing candidates[0].content.parts[0].text",
            )
            .with_details(body),
        ),
    }
}

/// Client for the Gemini `generateContent` endpoint.
///
/// Construction requires a validated [`Config`], so a client without an
/// API key cannot exist.
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: HeaderValue,
    model_name: String,
}

impl GeminiClient {
    /// Creates a client for the model and endpoint in `config`.
    ///
    /// No request timeout is set; a hung connection blocks until the
    /// transport gives up.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if the endpoint URL or API key header
    /// cannot be built, or the HTTP client fails to initialize.
    pub fn new(config: &Config) -> Result<Self> {
        let endpoint = config.endpoint()?;

        let mut api_key = HeaderValue::from_str(&config.gemini_api_key)
            .map_err(|e| AppError::config(format!("Invalid API key header: {}", e)))?;
        api_key.set_sensitive(true);

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint,
            api_key,
            model_name: config.model_name.clone(),
        })
    }

    /// Analyzes a plant image.
    ///
    /// Performs exactly one request and always returns one of the three
    /// [`AnalysisResult`] variants.
    pub async fn analyze(&self, image: &DynamicImage) -> AnalysisResult {
        let encoded = match ImageProcessor::encode(image) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(error = %e, "image encoding failed");
                return AnalysisResult::error(ErrorKind::Encoding, e.to_string());
            }
        };

        self.analyze_encoded(encoded).await
    }

    /// Analyzes an already encoded image.
    pub async fn analyze_encoded(&self, image: EncodedImage) -> AnalysisResult {
        info!(
            model = %self.model_name,
            payload_bytes = image.len(),
            "sending plant image for analysis"
        );

        let request = AnalysisRequest::new(image);
        let result = self.send(&request).await;

        match &result {
            AnalysisResult::Structured(fields) => {
                info!(fields = fields.len(), "analysis returned structured result")
            }
            AnalysisResult::RawText(text) => {
                info!(chars = text.len(), "analysis returned non-JSON text")
            }
            AnalysisResult::Error(err) => {
                warn!(kind = %err.kind, message = %err.message, "analysis failed")
            }
        }

        result
    }

    async fn send(&self, request: &AnalysisRequest) -> AnalysisResult {
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(API_KEY_HEADER, self.api_key.clone())
            .json(request)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                return AnalysisResult::error(
                    ErrorKind::RequestFailed,
                    format!("API request failed: {}", e),
                );
            }
        };

        let status = response.status();
        debug!(status = status.as_u16(), "received API response");

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return AnalysisResult::error(
                    ErrorKind::RequestFailed,
                    format!("Failed to read API response: {}", e),
                );
            }
        };

        if status != StatusCode::OK {
            return AnalysisResult::Error(
                AnalysisError::new(
                    ErrorKind::Api(status.as_u16()),
                    format!("API Error: {}", status.as_u16()),
                )
                .with_details(body),
            );
        }

        interpret_success_body(&body)
    }
}
