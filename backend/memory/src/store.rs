use std::cmp::Ordering;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::types::{ChunkQuery, IndexedChunk, ScoredChunk};

/// Storage for embedded chunks.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Add a chunk. A chunk already stored at the same position is replaced.
    async fn insert(&self, chunk: IndexedChunk) -> Result<()>;

    /// Up to `query.k` chunks, most similar first.
    async fn nearest(&self, query: &ChunkQuery) -> Result<Vec<ScoredChunk>>;

    async fn clear(&self) -> Result<()>;

    async fn len(&self) -> Result<usize>;
}

/// Brute-force cosine index held in memory for a single document.
/// Chunks with equal similarity come back in document order.
#[derive(Default)]
pub struct InMemoryChunkStore {
    chunks: RwLock<Vec<IndexedChunk>>,
}

impl InMemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Cosine similarity; zero for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let (mut dot, mut aa, mut bb) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        aa += x * x;
        bb += y * y;
    }
    let denom = aa.sqrt() * bb.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

fn lock_err() -> anyhow::Error {
    anyhow!("chunk store lock poisoned")
}

#[async_trait]
impl ChunkStore for InMemoryChunkStore {
    async fn insert(&self, chunk: IndexedChunk) -> Result<()> {
        let mut chunks = self.chunks.write().map_err(|_| lock_err())?;
        match chunks.binary_search_by_key(&chunk.position, |c| c.position) {
            Ok(at) => chunks[at] = chunk,
            Err(at) => chunks.insert(at, chunk),
        }
        Ok(())
    }

    async fn nearest(&self, query: &ChunkQuery) -> Result<Vec<ScoredChunk>> {
        let chunks = self.chunks.read().map_err(|_| lock_err())?;
        let mut scored: Vec<ScoredChunk> = chunks
            .iter()
            .filter_map(|c| {
                let similarity = cosine_similarity(&query.embedding, &c.embedding);
                (similarity >= query.floor).then(|| ScoredChunk { chunk: c.clone(), similarity })
            })
            .collect();
        scored.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(Ordering::Equal));
        scored.truncate(query.k);
        Ok(scored)
    }

    async fn clear(&self) -> Result<()> {
        self.chunks.write().map_err(|_| lock_err())?.clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.chunks.read().map_err(|_| lock_err())?.len())
    }
}
