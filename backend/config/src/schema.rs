//! PoemForge runtime configuration schema.
//!
//! Every section has a default, so an empty or absent file yields a runnable
//! config. Keys are camelCase in YAML.

use serde::{Deserialize, Serialize};

/// Root configuration. Files are merge-patched onto `Default`, so any
/// subset of fields may be given.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoemForgeConfig {
    pub poets: PoetsConfig,
    pub judge: ModelConfig,
    pub embeddings: EmbeddingsConfig,
    pub vision: VisionConfig,
    pub tts: TtsConfig,
    pub retrieval: RetrievalConfig,
    pub run: RunConfig,
    pub logging: LoggingConfig,
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

/// Which chat-completion backend serves a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderBackend {
    Gemini,
    Groq,
    OpenRouter,
    OpenAi,
    Ollama,
    Mock,
}

impl ProviderBackend {
    /// Backends that run without credentials.
    pub fn needs_api_key(&self) -> bool {
        !matches!(self, Self::Ollama | Self::Mock)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    /// Display name used in output files and narration
    pub label: String,
    pub provider: ProviderBackend,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable holding the key when `apiKey` is unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl ModelConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_deref(), self.api_key_env.as_deref())
    }
}

/// Inline key first, then the named environment variable. Blank values count as unset.
pub(crate) fn resolve_key(inline: Option<&str>, env_name: Option<&str>) -> Option<String> {
    inline
        .filter(|k| !k.trim().is_empty())
        .map(str::to_string)
        .or_else(|| {
            env_name
                .and_then(|name| std::env::var(name).ok())
                .filter(|k| !k.trim().is_empty())
        })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoetsConfig {
    /// Speaks on odd turns
    pub a: ModelConfig,
    /// Speaks on even turns
    pub b: ModelConfig,
}

// ---------------------------------------------------------------------------
// Retrieval, vision, audio
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// all-MiniLM-L6-v2 run locally; falls back to hashing when unavailable.
    #[default]
    MiniLm,
    Hashing,
    OpenAi,
    Gemini,
}

impl EmbeddingBackend {
    pub fn is_hosted(self) -> bool {
        matches!(self, Self::OpenAi | Self::Gemini)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingsConfig {
    pub provider: EmbeddingBackend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Directory with `model.onnx` and `tokenizer.json` for `minilm`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl EmbeddingsConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_deref(), self.api_key_env.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisionBackend {
    #[default]
    Gemini,
    OpenAi,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisionConfig {
    pub provider: VisionBackend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl VisionConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_deref(), self.api_key_env.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsBackend {
    #[default]
    Google,
    OpenAi,
    ElevenLabs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TtsConfig {
    pub provider: TtsBackend,
    /// Language code for the keyless Google voice
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl TtsConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_deref(), self.api_key_env.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Facts fetched per verse turn
    pub verse_facts_k: usize,
    /// Facts fetched for the judge
    pub judge_facts_k: usize,
}

// ---------------------------------------------------------------------------
// Run, logging, output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunConfig {
    pub verses: usize,
    pub call_timeout_secs: u64,
    /// Retries after the first attempt for transient generation errors
    pub generation_retries: u32,
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputConfig {
    pub dir: String,
    pub audio_dir: String,
}
