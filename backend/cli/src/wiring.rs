//! Builds runtime collaborators from the loaded config. Secrets are resolved
//! here once and handed to constructors.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use poemforge_agent::{Judge, PoemPipeline, Poet, RetryPolicy, TurnOrchestrator};
use poemforge_config::{
    EmbeddingBackend, EmbeddingsConfig, ModelConfig, PoemForgeConfig, ProviderBackend, TtsBackend,
    TtsConfig, VisionBackend, VisionConfig,
};
use poemforge_core::{LlmProvider, Retriever};
use poemforge_memory::{
    create_provider as create_embedder, EmbeddingProvider, EmbeddingProviderKind, MiniLmFiles, DEFAULT_MINILM_DIR,
};
use poemforge_providers::openai_compat::{GROQ_BASE_URL, OPENAI_BASE_URL, OPENROUTER_BASE_URL};
use poemforge_providers::{create_provider, ProviderKind};
use poemforge_tts::{create_tts, Narrator, TtsProvider, TtsProviderKind};
use poemforge_understanding::{FileDocumentLoader, RecursiveChunker, VisionProvider};

fn required_key(label: &str, key: Option<String>, env: Option<&str>) -> Result<String> {
    match key {
        Some(key) => Ok(key),
        None => bail!(
            "no API key for {label}: set apiKey in the config or export {}",
            env.unwrap_or("the variable named by apiKeyEnv")
        ),
    }
}

pub fn provider_for(cfg: &ModelConfig) -> Result<Arc<dyn LlmProvider>> {
    let key = || required_key(&cfg.label, cfg.resolve_api_key(), cfg.api_key_env.as_deref());
    let compat = |name: &str, default_url: &str| -> Result<ProviderKind> {
        Ok(ProviderKind::OpenAiCompatible {
            name: name.to_string(),
            base_url: cfg.base_url.clone().unwrap_or_else(|| default_url.to_string()),
            api_key: key()?,
        })
    };

    let kind = match cfg.provider {
        ProviderBackend::Gemini => ProviderKind::Gemini { api_key: key()?, base_url: cfg.base_url.clone() },
        ProviderBackend::Groq => compat("groq", GROQ_BASE_URL)?,
        ProviderBackend::OpenRouter => compat("openrouter", OPENROUTER_BASE_URL)?,
        ProviderBackend::OpenAi => compat("openai", OPENAI_BASE_URL)?,
        ProviderBackend::Ollama => ProviderKind::Ollama { base_url: cfg.base_url.clone() },
        ProviderBackend::Mock => ProviderKind::Mock { response: format!("A line from {}.", cfg.label) },
    };
    Ok(create_provider(kind))
}

pub fn poet_for(cfg: &ModelConfig) -> Result<Poet> {
    let provider = provider_for(cfg)?;
    Ok(Poet::new(&cfg.label, provider, &cfg.model)
        .with_temperature(cfg.temperature)
        .with_max_tokens(cfg.max_tokens))
}

pub fn call_timeout(config: &PoemForgeConfig) -> Duration {
    Duration::from_secs(config.run.call_timeout_secs)
}

pub fn retry_policy(config: &PoemForgeConfig) -> RetryPolicy {
    RetryPolicy::new(config.run.generation_retries, config.run.retry_base_delay_ms)
}

pub fn embedder(cfg: &EmbeddingsConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let key = || required_key("embeddings", cfg.resolve_api_key(), cfg.api_key_env.as_deref());
    let kind = match cfg.provider {
        EmbeddingBackend::MiniLm => EmbeddingProviderKind::MiniLm(MiniLmFiles::in_dir(
            cfg.model_dir.as_deref().unwrap_or(DEFAULT_MINILM_DIR),
        )),
        EmbeddingBackend::Hashing => EmbeddingProviderKind::Hashing,
        EmbeddingBackend::OpenAi => EmbeddingProviderKind::OpenAI { api_key: key()?, model: cfg.model.clone() },
        EmbeddingBackend::Gemini => EmbeddingProviderKind::Gemini { api_key: key()?, model: cfg.model.clone() },
    };
    Ok(create_embedder(kind))
}

/// `None` when vision is disabled or has no key; image input is then rejected
/// by the loader.
pub fn vision(cfg: &VisionConfig) -> Option<VisionProvider> {
    let key = cfg.resolve_api_key();
    let provider = match (cfg.provider, key) {
        (VisionBackend::Disabled, _) => return None,
        (_, None) => {
            warn!("Vision provider has no API key, image input disabled");
            return None;
        }
        (VisionBackend::Gemini, Some(key)) => VisionProvider::gemini(key),
        (VisionBackend::OpenAi, Some(key)) => VisionProvider::openai(key),
    };
    Some(match (provider, cfg.model.clone()) {
        (VisionProvider::Gemini { api_key, .. }, Some(model)) => VisionProvider::Gemini { api_key, model },
        (VisionProvider::OpenAI { api_key, .. }, Some(model)) => VisionProvider::OpenAI { api_key, model },
        (provider, None) => provider,
    })
}

pub fn loader(config: &PoemForgeConfig) -> FileDocumentLoader {
    let chunker = RecursiveChunker::new(config.retrieval.chunk_size, config.retrieval.chunk_overlap);
    let loader = FileDocumentLoader::new(chunker);
    match vision(&config.vision) {
        Some(v) => loader.with_vision(v),
        None => loader,
    }
}

pub fn tts(cfg: &TtsConfig) -> Result<Arc<dyn TtsProvider>> {
    let key = || required_key("tts", cfg.resolve_api_key(), cfg.api_key_env.as_deref());
    let kind = match cfg.provider {
        TtsBackend::Google => TtsProviderKind::GoogleTranslate { lang: cfg.language.clone() },
        TtsBackend::OpenAi => TtsProviderKind::OpenAi { api_key: key()?, voice: cfg.voice.clone() },
        TtsBackend::ElevenLabs => TtsProviderKind::ElevenLabs { api_key: key()?, voice_id: cfg.voice.clone() },
    };
    Ok(create_tts(kind))
}

pub fn narrator(config: &PoemForgeConfig) -> Result<Narrator> {
    Ok(Narrator::new(tts(&config.tts)?, call_timeout(config)))
}

pub fn pipeline(config: &PoemForgeConfig, retriever: Arc<dyn Retriever>) -> Result<PoemPipeline> {
    let poet_a = poet_for(&config.poets.a).context("poet A")?;
    let poet_b = poet_for(&config.poets.b).context("poet B")?;
    let judge_poet = poet_for(&config.judge).context("judge")?;
    info!(
        poet_a = poet_a.provider_name(),
        poet_b = poet_b.provider_name(),
        judge = judge_poet.provider_name(),
        "Providers ready"
    );

    let orchestrator = TurnOrchestrator::new(poet_a, poet_b, retriever.clone())
        .with_facts_k(config.retrieval.verse_facts_k)
        .with_retry_policy(retry_policy(config))
        .with_call_timeout(call_timeout(config));
    let judge = Judge::new(judge_poet, retriever)
        .with_facts_k(config.retrieval.judge_facts_k)
        .with_retry_policy(retry_policy(config))
        .with_call_timeout(call_timeout(config));
    Ok(PoemPipeline::new(orchestrator, judge))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_config() -> PoemForgeConfig {
        let mut config = PoemForgeConfig::default();
        for model in [&mut config.poets.a, &mut config.poets.b, &mut config.judge] {
            model.provider = ProviderBackend::Mock;
        }
        config
    }

    #[test]
    fn missing_key_names_the_env_var() {
        let cfg = ModelConfig {
            api_key: None,
            api_key_env: Some("POEMFORGE_TEST_UNSET_KEY".into()),
            ..PoemForgeConfig::default().poets.a
        };
        let err = provider_for(&cfg).err().unwrap();
        assert!(err.to_string().contains("POEMFORGE_TEST_UNSET_KEY"));
    }

    #[test]
    fn explicit_key_builds_provider() {
        let cfg = ModelConfig { api_key: Some("gsk-test".into()), ..PoemForgeConfig::default().poets.b };
        assert_eq!(provider_for(&cfg).unwrap().name(), "groq");
    }

    #[test]
    fn ollama_needs_no_key() {
        let cfg = ModelConfig {
            provider: ProviderBackend::Ollama,
            api_key: None,
            api_key_env: None,
            ..PoemForgeConfig::default().judge
        };
        assert!(provider_for(&cfg).is_ok());
    }

    #[test]
    fn pipeline_uses_configured_labels() {
        let config = mock_config();
        let retriever: Arc<dyn Retriever> =
            Arc::new(poemforge_memory::VectorRetriever::new(embedder(&config.embeddings).unwrap()));
        let pipeline = pipeline(&config, retriever).unwrap();
        assert_eq!(pipeline.poet_labels(), (config.poets.a.label.as_str(), config.poets.b.label.as_str()));
    }

    #[test]
    fn disabled_vision_yields_none() {
        let cfg = VisionConfig { provider: VisionBackend::Disabled, ..Default::default() };
        assert!(vision(&cfg).is_none());
        let keyed = VisionConfig {
            provider: VisionBackend::OpenAi,
            api_key: Some("sk-test".into()),
            model: Some("gpt-4o-mini".into()),
            ..Default::default()
        };
        assert!(matches!(vision(&keyed), Some(VisionProvider::OpenAI { model, .. }) if model == "gpt-4o-mini"));
    }

    #[test]
    fn google_tts_is_keyless() {
        assert!(tts(&TtsConfig::default()).is_ok());
    }
}
