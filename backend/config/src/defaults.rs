//! Default values, matching the stock two-poet setup.

use crate::schema::{
    LoggingConfig, ModelConfig, OutputConfig, PoemForgeConfig, PoetsConfig, ProviderBackend,
    RetrievalConfig, RunConfig, TtsConfig, VisionBackend, VisionConfig,
};

pub const DEFAULT_VERSES: usize = 6;
pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;
pub const DEFAULT_VERSE_FACTS_K: usize = 2;
pub const DEFAULT_JUDGE_FACTS_K: usize = 3;
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_GENERATION_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;

pub const GOOGLE_API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const GROQ_API_KEY_ENV: &str = "GROQ_API_KEY";

pub fn poet_a() -> ModelConfig {
    ModelConfig {
        label: "Google Poet (Gemini)".into(),
        provider: ProviderBackend::Gemini,
        model: "models/gemini-2.5-flash".into(),
        temperature: 0.8,
        max_tokens: 2048,
        base_url: None,
        api_key: None,
        api_key_env: Some(GOOGLE_API_KEY_ENV.into()),
    }
}

pub fn poet_b() -> ModelConfig {
    ModelConfig {
        label: "Groq Poet (Llama)".into(),
        provider: ProviderBackend::Groq,
        model: "llama-3.3-70b-versatile".into(),
        temperature: 0.8,
        max_tokens: 2048,
        base_url: None,
        api_key: None,
        api_key_env: Some(GROQ_API_KEY_ENV.into()),
    }
}

pub fn judge() -> ModelConfig {
    ModelConfig {
        label: "Judge (Gemini)".into(),
        provider: ProviderBackend::Gemini,
        model: "models/gemini-flash-latest".into(),
        temperature: 0.3,
        max_tokens: 4096,
        base_url: None,
        api_key: None,
        api_key_env: Some(GOOGLE_API_KEY_ENV.into()),
    }
}

impl Default for PoemForgeConfig {
    fn default() -> Self {
        Self {
            poets: PoetsConfig::default(),
            judge: judge(),
            embeddings: Default::default(),
            vision: Default::default(),
            tts: Default::default(),
            retrieval: Default::default(),
            run: Default::default(),
            logging: Default::default(),
            output: Default::default(),
        }
    }
}

impl Default for PoetsConfig {
    fn default() -> Self {
        Self { a: poet_a(), b: poet_b() }
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            provider: VisionBackend::Gemini,
            model: None,
            api_key: None,
            api_key_env: Some(GOOGLE_API_KEY_ENV.into()),
        }
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            provider: Default::default(),
            language: "en".into(),
            voice: None,
            api_key: None,
            api_key_env: None,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            verse_facts_k: DEFAULT_VERSE_FACTS_K,
            judge_facts_k: DEFAULT_JUDGE_FACTS_K,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            verses: DEFAULT_VERSES,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
            generation_retries: DEFAULT_GENERATION_RETRIES,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into(), dir: "logs".into() }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { dir: "results".into(), audio_dir: "audio_outputs".into() }
    }
}
