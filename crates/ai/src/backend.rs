// Model backend abstraction
//
// A backend turns one GenerateRequest into text for one named model.
// Everything above it (fallback, task contracts) is vendor-neutral.

use std::fmt;

/// Author of a content block sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    /// Raw bytes; the backend encodes them for the wire.
    InlineData { mime_type: String, data: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self { role: Role::User, parts: vec![Part::Text(text.into())] }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self { role: Role::Model, parts: vec![Part::Text(text.into())] }
    }
}

/// Sampling knobs passed through verbatim on every attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    /// e.g. `application/json` to ask for bare JSON output.
    pub response_mime_type: Option<String>,
}

/// Capabilities the model may use while answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    GoogleSearch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub system_instruction: Option<String>,
    pub contents: Vec<Content>,
    pub config: GenerationConfig,
    pub tools: Vec<Tool>,
}

/// A single model attempt failed.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// No API key available
    MissingKey,
    /// Connection or transport failure
    Network(String),
    /// Attempt exceeded the per-request timeout
    Timeout(String),
    /// Non-success HTTP status
    Api { status: u16, message: String },
    /// Response body could not be decoded
    Parse(String),
    /// Model answered without any text (blocked, empty candidates)
    EmptyResponse(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::MissingKey => write!(f, "API key not configured"),
            BackendError::Network(msg) => write!(f, "Network error: {}", msg),
            BackendError::Timeout(msg) => write!(f, "Request timed out: {}", msg),
            BackendError::Api { status, message } => write!(f, "API error ({}): {}", status, message),
            BackendError::Parse(msg) => write!(f, "Failed to parse response: {}", msg),
            BackendError::EmptyResponse(msg) => write!(f, "Empty response: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

/// One content-generation call against one named model.
///
/// Implementations are blocking; callers run them off the UI thread.
pub trait ModelBackend {
    fn generate(&self, request: &GenerateRequest) -> Result<String, BackendError>;
}

impl<B: ModelBackend + ?Sized> ModelBackend for &B {
    fn generate(&self, request: &GenerateRequest) -> Result<String, BackendError> {
        (**self).generate(request)
    }
}

impl<B: ModelBackend + ?Sized> ModelBackend for Box<B> {
    fn generate(&self, request: &GenerateRequest) -> Result<String, BackendError> {
        (**self).generate(request)
    }
}
