use std::path::Path;

use async_trait::async_trait;

use crate::error::{GenerationError, LoadError, RetrievalError};
use crate::types::LoadedDocument;

/// Trait for chat-completion services used by the poets and the judge.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., "gemini", "groq").
    fn name(&self) -> &str;

    /// Send a completion request and return the response text.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, GenerationError>;
}

/// Semantic search over an indexed document.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return up to `k` chunk texts most similar to `text`, best first.
    async fn query(&self, text: &str, k: usize) -> Result<Vec<String>, RetrievalError>;
}

/// Turns a file on disk into ordered text chunks.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self, path: &Path) -> Result<LoadedDocument, LoadError>;
}

/// Request to an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Response from an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub tokens_used: u64,
    pub latency_ms: u64,
}
