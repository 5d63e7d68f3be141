pub mod embeddings;
pub mod minilm;
pub mod retriever;
pub mod store;
pub mod types;

pub use embeddings::{
    create_provider, EmbeddingProvider, EmbeddingProviderKind, GeminiEmbeddings,
    HashingEmbeddings, OpenAIEmbeddings,
};
#[cfg(feature = "onnx")]
pub use minilm::MiniLmEmbeddings;
pub use minilm::{load_minilm, MiniLmFiles, DEFAULT_MINILM_DIR, MINILM_DIMENSION};
pub use retriever::VectorRetriever;
pub use store::{cosine_similarity, ChunkStore, InMemoryChunkStore};
pub use types::{ChunkQuery, IndexedChunk, ScoredChunk};
