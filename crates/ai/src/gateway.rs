//! Model invocation gateway.
//!
//! Issues one request to the start model and, on any backend failure, walks
//! forward through the ordered model list:
//!
//! - the failed model joins an exclusion set
//! - the next candidate is the first non-excluded model strictly after the
//!   current model's position (from the top when the current model is not
//!   in the list)
//! - selection never wraps, so an `invoke` makes at most `len + 1` attempts
//!   (`len` when the start model is listed)
//!
//! Every fallback transition is reported through `on_retry(failed, next)`
//! before the next attempt. Request contents, config and tools are identical
//! across attempts; only the model name changes.

use std::collections::HashSet;
use std::fmt;

use crate::backend::{BackendError, Content, GenerateRequest, GenerationConfig, ModelBackend, Tool};

/// Which models a task may use, and how hot to sample.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPlan {
    pub start_model: String,
    pub models: Vec<String>,
    pub temperature: Option<f32>,
}

impl ModelPlan {
    /// Start at the first listed model.
    pub fn new(models: Vec<String>) -> Self {
        let start_model = models.first().cloned().unwrap_or_default();
        Self { start_model, models, temperature: None }
    }

    pub fn starting_at(mut self, model: impl Into<String>) -> Self {
        self.start_model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvokeRequest {
    pub start_model: String,
    pub models: Vec<String>,
    pub system_instruction: Option<String>,
    pub contents: Vec<Content>,
    pub config: GenerationConfig,
    pub tools: Vec<Tool>,
}

impl InvokeRequest {
    pub fn new(plan: &ModelPlan, contents: Vec<Content>) -> Self {
        Self {
            start_model: plan.start_model.clone(),
            models: plan.models.clone(),
            system_instruction: None,
            contents,
            config: GenerationConfig { temperature: plan.temperature, response_mime_type: None },
            tools: Vec::new(),
        }
    }

    pub fn system(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn tool(mut self, tool: Tool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn json_output(mut self) -> Self {
        self.config.response_mime_type = Some("application/json".to_string());
        self
    }
}

/// Successful invocation: the text plus the model that actually produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub text: String,
    pub final_model: String,
    /// Models that failed before `final_model` answered, in attempt order.
    pub failed: Vec<String>,
}

impl Invocation {
    pub fn fell_back(&self) -> bool {
        !self.failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// Neither a start model nor a model list was supplied
    NoModels,
    /// Every eligible model failed
    AllModelsExhausted { tried: Vec<String>, last_error: BackendError },
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::NoModels => write!(f, "No models configured"),
            GatewayError::AllModelsExhausted { tried, last_error } => write!(
                f,
                "All models failed (tried {}); last error: {}",
                tried.join(", "),
                last_error
            ),
        }
    }
}

impl std::error::Error for GatewayError {}

pub struct Gateway<B> {
    backend: B,
}

impl<B: ModelBackend> Gateway<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Invoke without observing fallback transitions.
    pub fn invoke_quiet(&self, request: &InvokeRequest) -> Result<Invocation, GatewayError> {
        self.invoke(request, |_, _| {})
    }

    pub fn invoke<F>(&self, request: &InvokeRequest, mut on_retry: F) -> Result<Invocation, GatewayError>
    where
        F: FnMut(&str, &str),
    {
        let mut current = if request.start_model.is_empty() {
            request.models.first().cloned().ok_or(GatewayError::NoModels)?
        } else {
            request.start_model.clone()
        };

        let mut excluded: HashSet<String> = HashSet::new();
        let mut failed = Vec::new();

        loop {
            log::debug!("invoking model {} (attempt {})", current, failed.len() + 1);

            let attempt = GenerateRequest {
                model: current.clone(),
                system_instruction: request.system_instruction.clone(),
                contents: request.contents.clone(),
                config: request.config.clone(),
                tools: request.tools.clone(),
            };

            let error = match self.backend.generate(&attempt) {
                Ok(text) => {
                    return Ok(Invocation { text, final_model: current, failed });
                }
                Err(e) => e,
            };

            excluded.insert(current.clone());
            failed.push(current.clone());

            match next_model(&request.models, &current, &excluded) {
                Some(next) => {
                    log::warn!("model {} failed ({}), falling back to {}", current, error, next);
                    on_retry(&current, &next);
                    current = next;
                }
                None => {
                    log::warn!("model {} failed ({}), no models left", current, error);
                    return Err(GatewayError::AllModelsExhausted { tried: failed, last_error: error });
                }
            }
        }
    }
}

/// First non-excluded model strictly after `current` in `models`.
fn next_model(models: &[String], current: &str, excluded: &HashSet<String>) -> Option<String> {
    let from = models
        .iter()
        .position(|m| m == current)
        .map(|p| p + 1)
        .unwrap_or(0);
    models[from..].iter().find(|m| !excluded.contains(*m)).cloned()
}
