pub mod error;
pub mod traits;
pub mod types;

pub use error::{
    FailureKind, GenerationError, LoadError, PoemError, RetrievalError, SynthesisError,
};
pub use traits::{DocumentLoader, LlmProvider, LlmRequest, LlmResponse, Retriever};
pub use types::{
    Criterion, DocumentChunk, Judgment, JudgmentNotes, LoadedDocument, Scorecard, Speaker,
    VerseTurn, Winner,
};
