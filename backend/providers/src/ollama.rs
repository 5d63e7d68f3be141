//! Local models served by Ollama (`/api/chat`, non-streaming).

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use poemforge_core::{GenerationError, LlmProvider, LlmRequest, LlmResponse};

use crate::{check_status, decode_error, transport_error};

const OLLAMA_BASE_URL: &str = "http://localhost:11434";

pub struct OllamaProvider {
    client: Client,
    base_url: String,
}

impl OllamaProvider {
    pub fn new() -> Self {
        Self { client: Client::new(), base_url: OLLAMA_BASE_URL.to_string() }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Ollama tags have no vendor namespace: `meta-llama/llama3` becomes `llama3`.
fn local_model_name(model: &str) -> &str {
    model.rsplit('/').next().unwrap_or(model)
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<Turn<'a>>,
    stream: bool,
    options: Sampling,
}

#[derive(Serialize)]
struct Turn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct Sampling {
    temperature: f32,
    num_predict: u32,
}

impl<'a> ChatBody<'a> {
    fn from_request(request: &'a LlmRequest) -> Self {
        let system = (!request.system_prompt.is_empty())
            .then(|| Turn { role: "system", content: &request.system_prompt });
        Self {
            model: local_model_name(&request.model),
            messages: system
                .into_iter()
                .chain([Turn { role: "user", content: &request.user_prompt }])
                .collect(),
            stream: false,
            options: Sampling { temperature: request.temperature, num_predict: request.max_tokens },
        }
    }
}

#[derive(Deserialize)]
struct ChatReply {
    message: ReplyMessage,
    #[serde(default)]
    eval_count: u64,
    #[serde(default)]
    prompt_eval_count: u64,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, GenerationError> {
        let start = Instant::now();
        let body = ChatBody::from_request(request);
        debug!(model = body.model, base_url = %self.base_url, "Ollama chat request");

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("ollama", e))?;
        let reply: ChatReply = check_status("ollama", response)
            .await?
            .json()
            .await
            .map_err(|e| decode_error("ollama", e))?;

        Ok(LlmResponse {
            content: reply.message.content,
            provider: "ollama".to_string(),
            model: body.model.to_string(),
            tokens_used: reply.eval_count + reply.prompt_eval_count,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(system: &str) -> LlmRequest {
        LlmRequest {
            model: "meta-llama/llama3.2".into(),
            system_prompt: system.into(),
            user_prompt: "write".into(),
            max_tokens: 64,
            temperature: 0.8,
        }
    }

    #[test]
    fn body_strips_namespace_and_orders_messages() {
        let req = request("be a poet");
        let json = serde_json::to_value(ChatBody::from_request(&req)).unwrap();
        assert_eq!(json["model"], "llama3.2");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "write");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 64);
    }

    #[test]
    fn empty_system_prompt_is_omitted() {
        let req = request("");
        let json = serde_json::to_value(ChatBody::from_request(&req)).unwrap();
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        assert_eq!(OllamaProvider::new().with_base_url("http://gpu:11434/").base_url, "http://gpu:11434");
    }
}
