//! Embedding providers for chunk retrieval.
//!
//! Local MiniLM (see [`crate::minilm`]) is the default. `HashingEmbeddings`
//! is the offline fallback and needs neither network nor model files.
//! Hosted providers (OpenAI, Gemini) are available through the same trait.
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::minilm::{load_minilm, MiniLmFiles};

pub const HASHING_DIMENSION: usize = 384;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Return the embedding dimension for this provider/model.
    fn dimension(&self) -> usize;
    /// Embed a single text string.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    /// Embed a batch of texts (default: sequential).
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Local feature hashing
// ---------------------------------------------------------------------------

/// Bag-of-words feature hashing into a fixed-size, L2-normalized vector.
/// Deterministic for a given input within one build.
#[derive(Debug, Clone)]
pub struct HashingEmbeddings {
    dimension: usize,
}

impl Default for HashingEmbeddings {
    fn default() -> Self {
        Self { dimension: HASHING_DIMENSION }
    }
}

impl HashingEmbeddings {
    pub fn new(dimension: usize) -> Self {
        Self { dimension: dimension.max(1) }
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let h = hasher.finish();
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        ((h % self.dimension as u64) as usize, sign)
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        for token in &tokens {
            let (idx, sign) = self.bucket(token);
            v[idx] += sign;
        }
        // Adjacent pairs add a little word-order signal
        for pair in tokens.windows(2) {
            let (idx, sign) = self.bucket(&format!("{} {}", pair[0], pair[1]));
            v[idx] += 0.5 * sign;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddings {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }
}

// ---------------------------------------------------------------------------
// OpenAI
// ---------------------------------------------------------------------------

pub struct OpenAIEmbeddings {
    api_key: String,
    model: String,
    dimension: usize,
    client: Client,
}

impl OpenAIEmbeddings {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| "text-embedding-3-small".to_string());
        let dimension = if model.contains("3-large") { 3072 } else { 1536 };
        Self { api_key, model, dimension, client: Client::new() }
    }
}

#[derive(Serialize)]
struct OpenAIEmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct OpenAIEmbedResponse {
    data: Vec<OpenAIEmbedData>,
}

#[derive(Deserialize)]
struct OpenAIEmbedData {
    embedding: Vec<f32>,
}

impl OpenAIEmbeddings {
    async fn request(&self, input: Vec<&str>) -> Result<Vec<Vec<f32>>> {
        let body = OpenAIEmbedRequest { model: &self.model, input };
        let res: OpenAIEmbedResponse = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(res.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddings {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.request(vec![text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty OpenAI embedding response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        self.request(texts.to_vec()).await
    }
}

// ---------------------------------------------------------------------------
// Google Gemini
// ---------------------------------------------------------------------------

pub struct GeminiEmbeddings {
    api_key: String,
    model: String,
    client: Client,
}

const GEMINI_API: &str = "https://generativelanguage.googleapis.com/v1beta";

impl GeminiEmbeddings {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| "text-embedding-004".to_string());
        let model = format!("models/{}", model.trim_start_matches("models/"));
        Self { api_key, model, client: Client::new() }
    }

    fn batch_body<'a>(&'a self, texts: &[&'a str]) -> GeminiBatchRequest<'a> {
        GeminiBatchRequest {
            requests: texts
                .iter()
                .map(|&text| GeminiEmbedRequest {
                    model: &self.model,
                    content: GeminiContent { parts: [GeminiPart { text }] },
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct GeminiBatchRequest<'a> {
    requests: Vec<GeminiEmbedRequest<'a>>,
}

#[derive(Serialize)]
struct GeminiEmbedRequest<'a> {
    model: &'a str,
    content: GeminiContent<'a>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: [GeminiPart<'a>; 1],
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GeminiBatchResponse {
    #[serde(default)]
    embeddings: Vec<GeminiValues>,
}

#[derive(Deserialize)]
struct GeminiValues {
    values: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddings {
    fn dimension(&self) -> usize {
        768
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .pop()
            .ok_or_else(|| anyhow!("Empty Gemini embedding response"))
    }

    /// One `batchEmbedContents` call for the whole slice.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let res: GeminiBatchResponse = self
            .client
            .post(format!("{GEMINI_API}/{}:batchEmbedContents", self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&self.batch_body(texts))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if res.embeddings.len() != texts.len() {
            return Err(anyhow!(
                "Gemini returned {} embeddings for {} texts",
                res.embeddings.len(),
                texts.len()
            ));
        }
        Ok(res.embeddings.into_iter().map(|e| e.values).collect())
    }
}

// ---------------------------------------------------------------------------
// Factory from config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub enum EmbeddingProviderKind {
    #[default]
    Hashing,
    MiniLm(MiniLmFiles),
    OpenAI { api_key: String, model: Option<String> },
    Gemini { api_key: String, model: Option<String> },
}

/// Build the configured embedder. A MiniLM model that cannot be loaded
/// degrades to local feature hashing.
pub fn create_provider(kind: EmbeddingProviderKind) -> Arc<dyn EmbeddingProvider> {
    match kind {
        EmbeddingProviderKind::Hashing => Arc::new(HashingEmbeddings::default()),
        EmbeddingProviderKind::MiniLm(files) => load_minilm(&files).unwrap_or_else(|e| {
            warn!(error = %e, "MiniLM embeddings unavailable, using hashing embeddings");
            Arc::new(HashingEmbeddings::default())
        }),
        EmbeddingProviderKind::OpenAI { api_key, model } => {
            Arc::new(OpenAIEmbeddings::new(api_key, model))
        }
        EmbeddingProviderKind::Gemini { api_key, model } => {
            Arc::new(GeminiEmbeddings::new(api_key, model))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::cosine_similarity;

    #[tokio::test]
    async fn hashing_is_deterministic_and_normalized() {
        let e = HashingEmbeddings::default();
        let a = e.embed("Rivers carve the valley").await.unwrap();
        let b = e.embed("Rivers carve the valley").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), HASHING_DIMENSION);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn shared_words_score_higher() {
        let e = HashingEmbeddings::default();
        let q = e.embed("glaciers melting").await.unwrap();
        let near = e.embed("The glaciers are melting fast").await.unwrap();
        let far = e.embed("Stock prices rose on Tuesday").await.unwrap();
        assert!(cosine_similarity(&q, &near) > cosine_similarity(&q, &far));
    }

    #[test]
    fn gemini_batch_names_model_per_request() {
        let g = GeminiEmbeddings::new("k".into(), Some("models/text-embedding-004".into()));
        let json = serde_json::to_value(g.batch_body(&["a", "b"])).unwrap();
        assert_eq!(json["requests"].as_array().unwrap().len(), 2);
        assert_eq!(json["requests"][0]["model"], "models/text-embedding-004");
        assert_eq!(json["requests"][1]["content"]["parts"][0]["text"], "b");
    }

    #[tokio::test]
    async fn unloadable_minilm_falls_back_to_hashing() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = create_provider(EmbeddingProviderKind::MiniLm(MiniLmFiles::in_dir(dir.path())));
        assert_eq!(embedder.dimension(), HASHING_DIMENSION);
        let text = "lanterns over the harbour";
        assert_eq!(
            embedder.embed(text).await.unwrap(),
            HashingEmbeddings::default().embed(text).await.unwrap()
        );
    }

    #[tokio::test]
    async fn empty_text_is_zero_vector() {
        let v = HashingEmbeddings::new(8).embed("  ...  ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn factory_defaults_to_hashing() {
        let p = create_provider(EmbeddingProviderKind::default());
        assert_eq!(p.dimension(), HASHING_DIMENSION);
    }
}
