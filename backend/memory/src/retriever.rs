use std::sync::Arc;

use async_trait::async_trait;
use poemforge_core::{DocumentChunk, RetrievalError, Retriever};
use tracing::debug;

use crate::embeddings::EmbeddingProvider;
use crate::store::{ChunkStore, InMemoryChunkStore};
use crate::types::{ChunkQuery, IndexedChunk};

/// Similarity retriever over the chunks of one loaded document.
pub struct VectorRetriever {
    store: Arc<dyn ChunkStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl VectorRetriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self::with_store(embedder, Arc::new(InMemoryChunkStore::new()))
    }

    pub fn with_store(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn ChunkStore>) -> Self {
        Self { store, embedder }
    }

    /// Embed and store every chunk, replacing anything indexed before.
    /// Returns the number indexed.
    pub async fn index(&self, chunks: &[DocumentChunk]) -> Result<usize, RetrievalError> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(|e| RetrievalError(format!("embedding failed: {e}")))?;

        self.store.clear().await.map_err(|e| RetrievalError(e.to_string()))?;
        for (position, (chunk, embedding)) in chunks.iter().zip(vectors).enumerate() {
            self.store
                .insert(IndexedChunk {
                    position,
                    text: chunk.text.clone(),
                    embedding,
                    metadata: chunk.metadata.clone(),
                })
                .await
                .map_err(|e| RetrievalError(e.to_string()))?;
        }
        debug!(chunks = chunks.len(), "Indexed document chunks");
        Ok(chunks.len())
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn query(&self, text: &str, k: usize) -> Result<Vec<String>, RetrievalError> {
        let stored = self
            .store
            .len()
            .await
            .map_err(|e| RetrievalError(e.to_string()))?;
        if stored == 0 {
            return Err(RetrievalError("retrieval index is empty".into()));
        }
        let vector = self
            .embedder
            .embed(text)
            .await
            .map_err(|e| RetrievalError(format!("embedding failed: {e}")))?;
        let hits = self
            .store
            .nearest(&ChunkQuery::nearest(vector, k))
            .await
            .map_err(|e| RetrievalError(e.to_string()))?;
        Ok(hits.into_iter().map(|h| h.chunk.text).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbeddings;

    fn chunk(text: &str) -> DocumentChunk {
        DocumentChunk { text: text.to_string(), metadata: serde_json::json!({"source": "t.txt"}) }
    }

    #[tokio::test]
    async fn returns_most_similar_chunks_first() {
        let r = VectorRetriever::new(Arc::new(HashingEmbeddings::default()));
        r.index(&[
            chunk("Bees pollinate flowering plants in spring"),
            chunk("The volcano erupted ash over the island"),
            chunk("Honey bees communicate with a waggle dance"),
        ])
        .await
        .unwrap();

        let facts = r.query("how do bees dance", 2).await.unwrap();
        assert_eq!(facts.len(), 2);
        assert!(facts[0].contains("waggle"));
        assert!(facts.iter().all(|f| !f.contains("volcano")));
    }

    #[tokio::test]
    async fn k_larger_than_index_returns_all() {
        let r = VectorRetriever::new(Arc::new(HashingEmbeddings::default()));
        r.index(&[chunk("one fact")]).await.unwrap();
        assert_eq!(r.query("fact", 3).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reindexing_replaces_previous_document() {
        let r = VectorRetriever::new(Arc::new(HashingEmbeddings::default()));
        r.index(&[chunk("old harbour"), chunk("old lighthouse")]).await.unwrap();
        r.index(&[chunk("new orchard")]).await.unwrap();
        assert_eq!(r.query("harbour", 5).await.unwrap(), vec!["new orchard".to_string()]);
    }

    #[tokio::test]
    async fn empty_index_is_an_error() {
        let r = VectorRetriever::new(Arc::new(HashingEmbeddings::default()));
        assert!(r.query("anything", 2).await.is_err());
    }
}
