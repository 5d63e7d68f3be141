use serde::{Deserialize, Serialize};

/// One document chunk as held by the retrieval index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    /// Position of the chunk in the source document.
    pub position: usize,
    pub text: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Nearest-neighbour lookup against the index.
#[derive(Debug, Clone)]
pub struct ChunkQuery {
    pub embedding: Vec<f32>,
    pub k: usize,
    /// Chunks scoring below this cosine similarity are dropped.
    pub floor: f32,
}

impl ChunkQuery {
    pub fn nearest(embedding: Vec<f32>, k: usize) -> Self {
        Self { embedding, k, floor: -1.0 }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: IndexedChunk,
    pub similarity: f32,
}
