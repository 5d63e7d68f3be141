//! `poemforge doctor`: configuration, keys and local retrieval checks.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;

use poemforge_config::{redact, ModelConfig, PoemForgeConfig, ValidationReport};
use poemforge_core::{DocumentChunk, Retriever};
use poemforge_memory::VectorRetriever;

use crate::terminal_output::{note_error, note_info, note_success, note_warn};
use crate::wiring;

const LIVE_PROMPT: &str = "Reply with one short line about the sea.";

pub async fn run(
    config: &PoemForgeConfig,
    report: &ValidationReport,
    config_path: &Path,
    live: bool,
) -> Result<()> {
    println!("\n🔍 Running PoemForge Doctor...\n");

    if config_path.exists() {
        note_info(&format!("Config: {}", config_path.display()));
    } else {
        note_info(&format!("Config: {} not found, using defaults", config_path.display()));
    }

    let mut ok = check_report(report);
    ok &= check_keys(config);
    ok &= check_retrieval(config).await;
    if live {
        ok &= check_live(config).await;
    }

    println!("\nEffective config (secrets masked):");
    println!("{}", serde_json::to_string_pretty(&redact(config))?);

    println!();
    if ok {
        note_success("All checks passed! PoemForge is ready.");
    } else {
        note_error("Some checks failed! Please fix the errors above.");
    }
    Ok(())
}

fn check_report(report: &ValidationReport) -> bool {
    println!("Checking configuration:");
    for w in &report.warnings {
        note_warn(&format!("{}: {}", w.path, w.message));
    }
    for e in &report.errors {
        note_error(&format!("{}: {}", e.path, e.message));
    }
    if report.is_valid() {
        note_success("Configuration is valid");
    }
    report.is_valid()
}

fn model_roles(config: &PoemForgeConfig) -> [(&'static str, &ModelConfig); 3] {
    [("poets.a", &config.poets.a), ("poets.b", &config.poets.b), ("judge", &config.judge)]
}

fn check_keys(config: &PoemForgeConfig) -> bool {
    println!("\nChecking API keys:");
    let mut all_good = true;
    for (role, model) in model_roles(config) {
        if !model.provider.needs_api_key() {
            note_success(&format!("{role} ({:?}) needs no key", model.provider));
        } else if model.resolve_api_key().is_some() {
            note_success(&format!("{role} key is set"));
        } else {
            note_error(&format!(
                "{role} key is missing (set {})",
                model.api_key_env.as_deref().unwrap_or("apiKey")
            ));
            all_good = false;
        }
    }
    if wiring::vision(&config.vision).is_none() {
        note_warn("vision is unavailable (optional, needed for image input)");
    }
    if let Err(e) = wiring::tts(&config.tts) {
        note_warn(&format!("tts is unavailable (optional): {e}"));
    }
    all_good
}

/// Index a tiny corpus and check that the related sentence ranks first.
async fn check_retrieval(config: &PoemForgeConfig) -> bool {
    println!("\nChecking retrieval:");
    let embedder = match wiring::embedder(&config.embeddings) {
        Ok(e) => e,
        Err(e) => {
            note_error(&format!("embeddings: {e}"));
            return false;
        }
    };
    let dimension = embedder.dimension();
    let retriever = VectorRetriever::new(embedder);
    let chunks: Vec<DocumentChunk> = ["Coral reefs shelter many fish.", "Granite forms from cooled magma."]
        .into_iter()
        .map(|text| DocumentChunk { text: text.into(), metadata: serde_json::json!({}) })
        .collect();

    let result = match retriever.index(&chunks).await {
        Ok(_) => retriever.query("fish on the reef", 1).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(hits) if hits.first().is_some_and(|h| h.starts_with("Coral")) => {
            note_success(&format!("embeddings ready (dimension {dimension}), search ranks correctly"));
            true
        }
        Ok(hits) => {
            note_warn(&format!("search returned an unexpected ranking: {hits:?}"));
            true
        }
        Err(e) => {
            note_error(&format!("retrieval failed: {e}"));
            false
        }
    }
}

async fn check_live(config: &PoemForgeConfig) -> bool {
    println!("\nChecking models:");
    let timeout = Duration::from_secs(config.run.call_timeout_secs.min(30));
    let mut all_good = true;
    for (role, model) in model_roles(config) {
        let poet = match wiring::poet_for(model) {
            Ok(p) => p,
            Err(e) => {
                note_error(&format!("{role}: {e}"));
                all_good = false;
                continue;
            }
        };
        match poet.compose("You are a poet.", LIVE_PROMPT, timeout).await {
            Ok(reply) => note_success(&format!("{role} ({}): {}", model.model, reply.chars().take(50).collect::<String>())),
            Err(e) => {
                note_error(&format!("{role}: {e}"));
                all_good = false;
            }
        }
    }
    all_good
}

#[cfg(test)]
mod tests {
    use super::*;
    use poemforge_config::{validate, ProviderBackend};

    #[tokio::test]
    async fn local_retrieval_check_passes() {
        assert!(check_retrieval(&PoemForgeConfig::default()).await);
    }

    #[test]
    fn keyless_backends_pass_key_check() {
        let mut config = PoemForgeConfig::default();
        for m in [&mut config.poets.a, &mut config.poets.b, &mut config.judge] {
            m.provider = ProviderBackend::Ollama;
        }
        assert!(check_keys(&config));
    }

    #[test]
    fn invalid_report_fails() {
        let mut config = PoemForgeConfig::default();
        config.run.verses = 0;
        assert!(!check_report(&validate(&config)));
    }

    #[tokio::test]
    async fn live_check_with_mock_models() {
        let mut config = PoemForgeConfig::default();
        for m in [&mut config.poets.a, &mut config.poets.b, &mut config.judge] {
            m.provider = ProviderBackend::Mock;
        }
        assert!(check_live(&config).await);
    }
}
