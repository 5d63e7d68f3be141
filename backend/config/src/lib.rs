//! `poemforge-config`: runtime configuration.
//!
//! Provides:
//! - Typed config schema with defaults for every section
//! - YAML loading merge-patched over the defaults
//! - `${ENV_VAR}` substitution
//! - Config redaction for safe display
//! - Validation report

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use env::{resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{apply_merge_patch, config_dir, config_file_path, load_config, parse_config};
pub use redact::{redact, redact_value};
pub use schema::{
    EmbeddingBackend, EmbeddingsConfig, LoggingConfig, ModelConfig, OutputConfig,
    PoemForgeConfig, PoetsConfig, ProviderBackend, RetrievalConfig, RunConfig, TtsBackend,
    TtsConfig, VisionBackend, VisionConfig,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::Result;
use std::path::Path;

/// Load a config file and log its validation findings.
///
/// This is the main entry point for loading a config at runtime. Errors in the
/// report are logged, not returned; callers decide whether to proceed.
pub async fn load_and_prepare(path: &Path) -> Result<(PoemForgeConfig, ValidationReport)> {
    let config = load_config(path).await?;

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }

    Ok((config, report))
}
