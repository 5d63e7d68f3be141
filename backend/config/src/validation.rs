//! Config validation with user-friendly error messages.

use crate::schema::{ModelConfig, PoemForgeConfig, TtsBackend, VisionBackend};
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError { path: path.into(), message: message.into() });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError { path: path.into(), message: message.into() });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &PoemForgeConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_model("poets.a", &config.poets.a, &mut report);
    validate_model("poets.b", &config.poets.b, &mut report);
    validate_model("judge", &config.judge, &mut report);
    validate_retrieval(config, &mut report);
    validate_run(config, &mut report);
    validate_optional_services(config, &mut report);
    report
}

fn validate_model(path: &str, model: &ModelConfig, report: &mut ValidationReport) {
    if model.model.trim().is_empty() {
        report.error(format!("{path}.model"), "Model name cannot be empty");
    }
    if !(0.0..=2.0).contains(&model.temperature) {
        report.error(format!("{path}.temperature"), "temperature must be within 0.0..=2.0");
    }
    if model.max_tokens == 0 {
        report.error(format!("{path}.maxTokens"), "maxTokens must be > 0");
    }
    if model.provider.needs_api_key() && model.resolve_api_key().is_none() {
        let hint = model
            .api_key_env
            .as_deref()
            .map(|env| format!("set {env} or apiKey"))
            .unwrap_or_else(|| "set apiKey or apiKeyEnv".to_string());
        report.warn(format!("{path}.apiKey"), format!("No API key available; {hint}"));
    }
}

fn validate_retrieval(config: &PoemForgeConfig, report: &mut ValidationReport) {
    let r = &config.retrieval;
    if r.chunk_size == 0 {
        report.error("retrieval.chunkSize", "chunkSize must be > 0");
    }
    if r.chunk_overlap >= r.chunk_size {
        report.error("retrieval.chunkOverlap", "chunkOverlap must be smaller than chunkSize");
    }
    if r.verse_facts_k == 0 {
        report.error("retrieval.verseFactsK", "verseFactsK must be >= 1");
    }
    if r.judge_facts_k == 0 {
        report.error("retrieval.judgeFactsK", "judgeFactsK must be >= 1");
    }
}

fn validate_run(config: &PoemForgeConfig, report: &mut ValidationReport) {
    let run = &config.run;
    if run.verses == 0 {
        report.error("run.verses", "verses must be >= 1");
    }
    if run.call_timeout_secs == 0 {
        report.error("run.callTimeoutSecs", "callTimeoutSecs must be > 0");
    }
    if run.generation_retries > 10 {
        report.warn(
            "run.generationRetries",
            format!("{} retries per verse may stall a run for a long time", run.generation_retries),
        );
    }
}

fn validate_optional_services(config: &PoemForgeConfig, report: &mut ValidationReport) {
    if config.embeddings.provider.is_hosted() && config.embeddings.resolve_api_key().is_none()
    {
        report.error("embeddings.apiKey", "Hosted embeddings need an API key");
    }
    if config.vision.provider != VisionBackend::Disabled && config.vision.resolve_api_key().is_none()
    {
        report.warn("vision.apiKey", "No vision API key; image documents will be rejected");
    }
    if config.tts.provider != TtsBackend::Google && config.tts.resolve_api_key().is_none() {
        report.warn("tts.apiKey", "No TTS API key; audio narration will be skipped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ProviderBackend;

    fn offline_config() -> PoemForgeConfig {
        let mut cfg = PoemForgeConfig::default();
        for m in [&mut cfg.poets.a, &mut cfg.poets.b, &mut cfg.judge] {
            m.provider = ProviderBackend::Mock;
        }
        cfg.vision.provider = VisionBackend::Disabled;
        cfg
    }

    #[test]
    fn default_offline_config_is_clean() {
        let report = validate(&offline_config());
        assert!(report.is_valid(), "errors: {:?}", report.errors);
        assert!(report.warnings.is_empty(), "warnings: {:?}", report.warnings);
    }

    #[test]
    fn zero_verses_is_error() {
        let mut cfg = offline_config();
        cfg.run.verses = 0;
        let report = validate(&cfg);
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].path, "run.verses");
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk() {
        let mut cfg = offline_config();
        cfg.retrieval.chunk_overlap = 500;
        let report = validate(&cfg);
        assert!(report.errors.iter().any(|e| e.path == "retrieval.chunkOverlap"));
    }

    #[test]
    fn missing_key_is_warning_not_error() {
        let mut cfg = offline_config();
        cfg.judge.provider = ProviderBackend::Gemini;
        cfg.judge.api_key = None;
        cfg.judge.api_key_env = Some("POEMFORGE_TEST_UNSET_KEY_VAR".into());
        let report = validate(&cfg);
        assert!(report.is_valid());
        assert!(report.warnings[0].message.contains("POEMFORGE_TEST_UNSET_KEY_VAR"));
    }

    #[test]
    fn only_hosted_embeddings_need_a_key() {
        use crate::schema::EmbeddingBackend;
        let mut cfg = offline_config();
        for local in [EmbeddingBackend::MiniLm, EmbeddingBackend::Hashing] {
            cfg.embeddings.provider = local;
            assert!(validate(&cfg).is_valid());
        }
        cfg.embeddings.provider = EmbeddingBackend::Gemini;
        cfg.embeddings.api_key_env = Some("POEMFORGE_TEST_UNSET_EMBED_KEY".into());
        let report = validate(&cfg);
        assert_eq!(report.errors[0].path, "embeddings.apiKey");
    }

    #[test]
    fn inline_key_satisfies_check() {
        let mut cfg = offline_config();
        cfg.poets.b.provider = ProviderBackend::Groq;
        cfg.poets.b.api_key = Some("gsk_inline".into());
        assert!(validate(&cfg).warnings.is_empty());
    }
}
