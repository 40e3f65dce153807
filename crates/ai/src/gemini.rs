// Gemini backend
//
// Blocking client for the generateContent REST endpoint.
// One HTTP request per attempt; the client timeout bounds each attempt.

use std::time::Duration;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use gridassist_config::ai::ResolvedAIConfig;

use crate::backend::{BackendError, GenerateRequest, ModelBackend, Part, Tool};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub struct GeminiBackend {
    http: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL, timeout)
    }

    /// Point the client at a different host (proxies, tests).
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("gridassist/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ResolvedAIConfig) -> Result<Self, BackendError> {
        let api_key = config.api_key.clone().ok_or(BackendError::MissingKey)?;
        let timeout = Duration::from_secs(config.timeout_secs);
        match &config.endpoint {
            Some(endpoint) => Self::with_base_url(api_key, endpoint.clone(), timeout),
            None => Self::new(api_key, timeout),
        }
    }

    fn url(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

impl ModelBackend for GeminiBackend {
    fn generate(&self, request: &GenerateRequest) -> Result<String, BackendError> {
        let body = WireRequest::from(request);

        let response = self
            .http
            .post(self.url(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout(e.to_string())
                } else {
                    BackendError::Network(e.to_string())
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().unwrap_or_default();
            let message = serde_json::from_str::<WireError>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);
            return Err(BackendError::Api { status: status.as_u16(), message });
        }

        let body: WireResponse = response
            .json()
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        body.text()
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<WireGenerationConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Serialize)]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<WirePart>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum WirePart {
    Text(String),
    InlineData {
        #[serde(rename = "mimeType")]
        mime_type: String,
        data: String,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTool {
    google_search: serde_json::Value,
}

impl From<&GenerateRequest> for WireRequest {
    fn from(request: &GenerateRequest) -> Self {
        let system_instruction = request.system_instruction.as_ref().map(|text| WireContent {
            role: None,
            parts: vec![WirePart::Text(text.clone())],
        });

        let contents = request
            .contents
            .iter()
            .map(|content| WireContent {
                role: Some(content.role.as_str()),
                parts: content.parts.iter().map(wire_part).collect(),
            })
            .collect();

        let config = &request.config;
        let generation_config = if config.temperature.is_some() || config.response_mime_type.is_some() {
            Some(WireGenerationConfig {
                temperature: config.temperature,
                response_mime_type: config.response_mime_type.clone(),
            })
        } else {
            None
        };

        let tools = request
            .tools
            .iter()
            .map(|tool| match tool {
                Tool::GoogleSearch => WireTool { google_search: serde_json::json!({}) },
            })
            .collect();

        Self { system_instruction, contents, generation_config, tools }
    }
}

fn wire_part(part: &Part) -> WirePart {
    match part {
        Part::Text(text) => WirePart::Text(text.clone()),
        Part::InlineData { mime_type, data } => WirePart::InlineData {
            mime_type: mime_type.clone(),
            data: base64::engine::general_purpose::STANDARD.encode(data),
        },
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    prompt_feedback: Option<WirePromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    content: Option<WireResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireResponseContent {
    #[serde(default)]
    parts: Vec<WireResponsePart>,
}

#[derive(Deserialize)]
struct WireResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireError {
    error: WireErrorDetail,
}

#[derive(Deserialize)]
struct WireErrorDetail {
    message: String,
}

impl WireResponse {
    /// Concatenated text parts of the first candidate.
    fn text(self) -> Result<String, BackendError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(BackendError::EmptyResponse(format!("prompt blocked: {}", reason)));
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::EmptyResponse("no candidates".to_string()))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
            return Err(BackendError::EmptyResponse(format!("finish reason {}", reason)));
        }
        Ok(text)
    }
}
