//! Gemini `generateContent` contract for schema-constrained JSON output.
//!
//! The provider returns the model's JSON as a *string* nested at
//! `candidates[0].content.parts[0].text`, so every structured response is
//! decoded twice. That quirk is confined to [`decode_structured`]; switching
//! providers only touches this module.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::UpstreamConfig;
use crate::retry::{HttpError, RequestSpec, RetryingHttpClient};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const JSON_MIME_TYPE: &str = "application/json";

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("Missing API key")]
    MissingApiKey,

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("Invalid response envelope: {0}")]
    Envelope(String),

    #[error("Structured payload does not match schema: {0}")]
    Payload(#[from] serde_json::Error),
}

impl UpstreamError {
    /// True when the provider answered but the content was unusable.
    pub fn is_malformed(&self) -> bool {
        matches!(self, UpstreamError::Envelope(_) | UpstreamError::Payload(_))
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub system_instruction: Content,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
    pub response_schema: serde_json::Value,
}

impl GenerateContentRequest {
    /// A single-turn request whose answer must be JSON matching `schema`.
    pub fn structured(
        system_instruction: &str,
        prompt: &str,
        schema: serde_json::Value,
    ) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: system_instruction.to_string(),
                }],
            },
            generation_config: GenerationConfig {
                response_mime_type: JSON_MIME_TYPE.to_string(),
                response_schema: schema,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
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

// ============================================================================
// Decoding
// ============================================================================

/// Extract `candidates[0].content.parts[0].text` from a response body.
pub fn decode_candidate_text(body: &str) -> Result<String, UpstreamError> {
    let envelope: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| UpstreamError::Envelope(format!("body is not a response object: {}", e)))?;

    envelope
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| UpstreamError::Envelope("no candidate text in response".to_string()))
}

/// Decode the embedded JSON text of a response body into `T`.
pub fn decode_structured<T: DeserializeOwned>(body: &str) -> Result<T, UpstreamError> {
    let text = decode_candidate_text(body)?;
    Ok(serde_json::from_str(&text)?)
}

// ============================================================================
// GeminiClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: RetryingHttpClient,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiClient {
    /// A missing key is accepted here; calls then fail fast with
    /// [`UpstreamError::MissingApiKey`] without touching the network.
    pub fn new(http: RetryingHttpClient, config: &UpstreamConfig) -> Self {
        Self::with_api_key(http, config, config.resolved_api_key())
    }

    /// As [`new`](Self::new), with the credential supplied by the caller
    /// instead of being resolved from config and environment.
    pub fn with_api_key(
        http: RetryingHttpClient,
        config: &UpstreamConfig,
        api_key: Option<String>,
    ) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `request` and decode the model's structured answer into `T`.
    pub async fn generate_structured<T: DeserializeOwned>(
        &self,
        request: &GenerateContentRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<T, UpstreamError> {
        let api_key = self.api_key.as_deref().ok_or(UpstreamError::MissingApiKey)?;

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, api_key
        );
        let body = serde_json::to_value(request)?;
        let spec = RequestSpec::post_json(url, body);

        let response = match cancel {
            Some(token) => self.http.send_cancellable(&spec, token).await?,
            None => self.http.send(&spec).await?,
        };

        decode_structured(&response.body)
    }
}

// ============================================================================
// TESTS
// ============================================================================
