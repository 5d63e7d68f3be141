use serde::Serialize;
use thiserror::Error;

/// Top-level error type for the PoemForge pipeline.
#[derive(Debug, Error)]
pub enum PoemError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("malformed judgment: {0}")]
    MalformedJudgment(String),

    #[error("judgment requested after {completed} of {target} verses")]
    PrematureJudgment { completed: usize, target: usize },

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PoemError {
    /// Coarse classification reported to callers alongside a failed run.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidConfiguration(_) => FailureKind::InvalidConfiguration,
            Self::Retrieval(_) => FailureKind::Retrieval,
            Self::Generation(e) if e.is_transient() => FailureKind::TransientGeneration,
            Self::Generation(_) => FailureKind::FatalGeneration,
            Self::MalformedJudgment(_) => FailureKind::MalformedJudgment,
            Self::PrematureJudgment { .. } => FailureKind::PrematureJudgment,
            Self::Load(_) => FailureKind::Load,
            Self::Synthesis(_) => FailureKind::Synthesis,
            Self::Other(_) => FailureKind::Other,
        }
    }
}

/// Failure category surfaced with a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidConfiguration,
    Retrieval,
    TransientGeneration,
    FatalGeneration,
    MalformedJudgment,
    PrematureJudgment,
    Load,
    Synthesis,
    Other,
}

/// Failure reported by a chat-completion provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    /// Rate limits, timeouts, outages. Worth retrying.
    #[error("transient failure from {provider}: {message}")]
    Transient { provider: String, message: String },

    /// Auth, quota, or request-shape errors. Retrying will not help.
    #[error("fatal failure from {provider}: {message}")]
    Fatal { provider: String, message: String },
}

impl GenerationError {
    pub fn transient(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn fatal(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fatal {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Classify a non-success HTTP status returned by a provider.
    pub fn from_status(provider: impl Into<String>, status: u16, body: &str) -> Self {
        let message = format!("HTTP {status}: {}", body.trim());
        match status {
            408 | 425 | 429 | 500..=599 => Self::transient(provider, message),
            _ => Self::fatal(provider, message),
        }
    }
}

/// The retriever could not produce facts for a query.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("retrieval failed: {0}")]
pub struct RetrievalError(pub String);

/// A document could not be turned into text chunks.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("text extraction failed: {0}")]
    Extraction(String),
}

/// Text-to-speech failed. Never fatal to a run.
#[derive(Debug, Clone, Error)]
#[error("speech synthesis failed: {0}")]
pub struct SynthesisError(pub String);
