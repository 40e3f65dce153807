// Scripted backend shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;

use gridassist_ai::{BackendError, GenerateRequest, ModelBackend};

/// Answers per model name; unknown models fail with a network error.
/// Every request is recorded.
#[derive(Default)]
pub struct ScriptedBackend {
    replies: HashMap<String, Result<String, BackendError>>,
    pub requests: RefCell<Vec<GenerateRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok(mut self, model: &str, text: &str) -> Self {
        self.replies.insert(model.to_string(), Ok(text.to_string()));
        self
    }

    pub fn fail(mut self, model: &str) -> Self {
        self.replies.insert(
            model.to_string(),
            Err(BackendError::Api { status: 503, message: format!("{} overloaded", model) }),
        );
        self
    }

    pub fn models_called(&self) -> Vec<String> {
        self.requests.borrow().iter().map(|r| r.model.clone()).collect()
    }

    pub fn last_request(&self) -> GenerateRequest {
        self.requests.borrow().last().cloned().expect("no request recorded")
    }
}

impl ModelBackend for ScriptedBackend {
    fn generate(&self, request: &GenerateRequest) -> Result<String, BackendError> {
        self.requests.borrow_mut().push(request.clone());
        self.replies
            .get(&request.model)
            .cloned()
            .unwrap_or_else(|| Err(BackendError::Network(format!("{} unreachable", request.model))))
    }
}

pub fn models(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
