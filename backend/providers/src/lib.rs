pub mod gemini;
pub mod mock;
pub mod ollama;
pub mod openai_compat;

use std::sync::Arc;

use poemforge_core::{GenerationError, LlmProvider};

pub use gemini::GeminiProvider;
pub use mock::MockProvider;
pub use ollama::OllamaProvider;
pub use openai_compat::OpenAiCompatProvider;

/// Provider selection, resolved from config at startup.
#[derive(Debug, Clone)]
pub enum ProviderKind {
    /// Any `/chat/completions` endpoint (Groq, OpenRouter, OpenAI).
    OpenAiCompatible {
        name: String,
        base_url: String,
        api_key: String,
    },
    Gemini {
        api_key: String,
        base_url: Option<String>,
    },
    Ollama {
        base_url: Option<String>,
    },
    /// Canned reply; useful for dry runs.
    Mock { response: String },
}

pub fn create_provider(kind: ProviderKind) -> Arc<dyn LlmProvider> {
    match kind {
        ProviderKind::OpenAiCompatible {
            name,
            base_url,
            api_key,
        } => Arc::new(OpenAiCompatProvider::new(name, api_key).with_base_url(base_url)),
        ProviderKind::Gemini { api_key, base_url } => {
            let provider = GeminiProvider::new(api_key);
            match base_url {
                Some(url) => Arc::new(provider.with_base_url(url)),
                None => Arc::new(provider),
            }
        }
        ProviderKind::Ollama { base_url } => {
            let provider = OllamaProvider::new();
            match base_url {
                Some(url) => Arc::new(provider.with_base_url(url)),
                None => Arc::new(provider),
            }
        }
        ProviderKind::Mock { response } => Arc::new(MockProvider::new("mock").with_response(response)),
    }
}

/// Network-level failures are always worth another attempt.
pub(crate) fn transport_error(provider: &str, err: reqwest::Error) -> GenerationError {
    GenerationError::transient(provider, format!("HTTP request failed: {err}"))
}

/// A 2xx body we cannot decode is not going to decode on retry either.
pub(crate) fn decode_error(provider: &str, err: reqwest::Error) -> GenerationError {
    GenerationError::fatal(provider, format!("failed to parse response: {err}"))
}

/// Pass successful responses through, classify the rest.
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, GenerationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GenerationError::from_status(provider, status.as_u16(), &body))
}
