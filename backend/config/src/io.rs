//! Config file discovery and loading.

use crate::env::resolve_env_vars;
use crate::schema::PoemForgeConfig;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Default config file name within the config directory.
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Env var naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "POEMFORGE_CONFIG";

/// Resolve the PoemForge config directory (`~/.poemforge/`).
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".poemforge"))
        .unwrap_or_else(|| PathBuf::from(".poemforge"))
}

/// Resolve the config file path.
/// Priority: explicit path > `POEMFORGE_CONFIG` env > `~/.poemforge/config.yaml`
pub fn config_file_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    config_dir().join(CONFIG_FILE_NAME)
}

/// Load and parse the config from disk.
///
/// Returns `Ok(Default::default())` if the file doesn't exist (first run).
/// Values given in the file are merge-patched over the defaults after
/// `${VAR}` substitution.
pub async fn load_config(path: &Path) -> Result<PoemForgeConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(PoemForgeConfig::default());
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&raw)
        .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Parse YAML text into a config layered over the defaults.
pub fn parse_config(raw: &str) -> Result<PoemForgeConfig> {
    if raw.trim().is_empty() {
        return Ok(PoemForgeConfig::default());
    }
    let patch: Value = serde_yaml::from_str(raw).context("Invalid YAML")?;
    if patch.is_null() {
        return Ok(PoemForgeConfig::default());
    }
    let patch = resolve_env_vars(&patch).context("Failed to resolve env vars in config")?;
    apply_merge_patch(&PoemForgeConfig::default(), &patch)
}

/// Patch config with a JSON Merge Patch (RFC 7396).
pub fn apply_merge_patch(config: &PoemForgeConfig, patch: &Value) -> Result<PoemForgeConfig> {
    let mut value =
        serde_json::to_value(config).context("Failed to serialize config for merge patch")?;
    json_merge_patch(&mut value, patch);
    let updated: PoemForgeConfig =
        serde_json::from_value(value).context("Failed to deserialize config after merge patch")?;
    Ok(updated)
}

/// RFC 7396 JSON Merge Patch algorithm.
fn json_merge_patch(target: &mut Value, patch: &Value) {
    if let Value::Object(patch_map) = patch {
        if let Value::Object(target_map) = target {
            for (key, patch_val) in patch_map {
                if patch_val.is_null() {
                    target_map.remove(key);
                } else {
                    let entry = target_map.entry(key.clone()).or_insert(Value::Null);
                    json_merge_patch(entry, patch_val);
                }
            }
        } else {
            *target = patch.clone();
        }
    } else {
        *target = patch.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ProviderBackend;

    #[test]
    fn partial_yaml_overrides_only_named_fields() {
        let cfg = parse_config(
            "poets:\n  b:\n    model: llama-3.1-8b-instant\nrun:\n  verses: 8\n",
        )
        .unwrap();
        assert_eq!(cfg.poets.b.model, "llama-3.1-8b-instant");
        assert_eq!(cfg.poets.b.provider, ProviderBackend::Groq);
        assert_eq!(cfg.poets.b.temperature, 0.8);
        assert_eq!(cfg.run.verses, 8);
        assert_eq!(cfg.run.call_timeout_secs, 60);
        assert_eq!(cfg.poets.a.model, "models/gemini-2.5-flash");
    }

    #[test]
    fn empty_file_is_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.retrieval.chunk_size, 500);
    }

    #[test]
    fn provider_can_be_swapped() {
        let cfg = parse_config("poets:\n  a:\n    provider: ollama\n    model: llama3\n").unwrap();
        assert_eq!(cfg.poets.a.provider, ProviderBackend::Ollama);
        assert!(!cfg.poets.a.provider.needs_api_key());
    }

    #[test]
    fn bad_type_is_an_error() {
        assert!(parse_config("run:\n  verses: many\n").is_err());
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("absent.yaml")).await.unwrap();
        assert_eq!(cfg.judge.model, "models/gemini-flash-latest");
    }

    #[tokio::test]
    async fn file_is_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "output:\n  dir: out\n").unwrap();
        let cfg = load_config(&path).await.unwrap();
        assert_eq!(cfg.output.dir, "out");
        assert_eq!(cfg.output.audio_dir, "audio_outputs");
    }

    #[test]
    fn explicit_path_wins() {
        let p = config_file_path(Some(Path::new("/tmp/x.yaml")));
        assert_eq!(p, PathBuf::from("/tmp/x.yaml"));
    }
}
