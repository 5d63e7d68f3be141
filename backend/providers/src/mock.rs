use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use poemforge_core::{GenerationError, LlmProvider, LlmRequest, LlmResponse};

/// A mock LLM provider that replays scripted results, then a fixed reply.
pub struct MockProvider {
    name: String,
    fixed_response: Option<String>,
    script: Mutex<VecDeque<Result<String, GenerationError>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fixed_response: None,
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.fixed_response = Some(response.into());
        self
    }

    /// Results returned in order before falling back to the fixed response.
    pub fn with_script(self, script: Vec<Result<String, GenerationError>>) -> Self {
        *self.script.lock().unwrap_or_else(|p| p.into_inner()) = script.into();
        self
    }

    /// Number of `complete` calls seen so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, GenerationError> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(request.clone());

        let scripted = self.script.lock().unwrap_or_else(|p| p.into_inner()).pop_front();
        let content = match scripted {
            Some(result) => result?,
            None => self
                .fixed_response
                .clone()
                .unwrap_or_else(|| "Mock response".to_string()),
        };

        Ok(LlmResponse {
            content,
            provider: self.name.clone(),
            model: "mock".to_string(),
            tokens_used: 0,
            latency_ms: 0,
        })
    }
}
