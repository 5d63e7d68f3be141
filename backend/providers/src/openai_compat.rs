//! Any endpoint speaking the OpenAI `/chat/completions` dialect: Groq,
//! OpenRouter, OpenAI itself, or a self-hosted gateway.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use poemforge_core::{GenerationError, LlmProvider, LlmRequest, LlmResponse};

use crate::{check_status, decode_error, transport_error};

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiCompatProvider {
    name: String,
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiCompatProvider {
    pub fn new(name: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            client: Client::new(),
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_string(),
        }
    }

    pub fn groq(api_key: impl Into<String>) -> Self {
        Self::new("groq", api_key).with_base_url(GROQ_BASE_URL)
    }

    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new("openrouter", api_key).with_base_url(OPENROUTER_BASE_URL)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a LlmRequest> for CompletionBody<'a> {
    fn from(request: &'a LlmRequest) -> Self {
        let mut messages = Vec::with_capacity(2);
        if !request.system_prompt.is_empty() {
            messages.push(Message { role: "system", content: &request.system_prompt });
        }
        messages.push(Message { role: "user", content: &request.user_prompt });
        Self {
            model: &request.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

#[derive(Deserialize)]
struct CompletionReply {
    #[serde(default)]
    choices: Vec<ReplyChoice>,
    #[serde(default)]
    usage: Option<ReplyUsage>,
}

#[derive(Deserialize)]
struct ReplyChoice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    // null when the model refuses or only calls tools
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ReplyUsage {
    #[serde(default)]
    total_tokens: u64,
}

impl CompletionReply {
    fn text(&mut self) -> String {
        self.choices
            .first_mut()
            .and_then(|c| c.message.content.take())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, GenerationError> {
        let start = Instant::now();
        debug!(provider = %self.name, model = %request.model, "Chat completion request");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&CompletionBody::from(request))
            .send()
            .await
            .map_err(|e| transport_error(&self.name, e))?;
        let mut reply: CompletionReply = check_status(&self.name, response)
            .await?
            .json()
            .await
            .map_err(|e| decode_error(&self.name, e))?;

        Ok(LlmResponse {
            content: reply.text(),
            provider: self.name.clone(),
            model: request.model.clone(),
            tokens_used: reply.usage.map_or(0, |u| u.total_tokens),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}
