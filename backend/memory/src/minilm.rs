//! all-MiniLM-L6-v2 sentence embeddings, run locally through ONNX Runtime.
//!
//! Inference needs the `onnx` feature and a model directory holding
//! `model.onnx` and `tokenizer.json` (the sentence-transformers export).
//! When either is missing, [`crate::create_provider`] falls back to
//! [`crate::HashingEmbeddings`], which has the same dimension.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

pub const MINILM_DIMENSION: usize = 384;
pub const DEFAULT_MINILM_DIR: &str = "models/all-MiniLM-L6-v2";

/// Token limit the model was trained with.
#[cfg_attr(not(feature = "onnx"), allow(dead_code))]
const MAX_TOKENS: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct MiniLmFiles {
    pub model: PathBuf,
    pub tokenizer: PathBuf,
}

impl MiniLmFiles {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self { model: dir.join("model.onnx"), tokenizer: dir.join("tokenizer.json") }
    }

    pub fn check(&self) -> Result<()> {
        for path in [&self.model, &self.tokenizer] {
            if !path.is_file() {
                bail!("MiniLM file not found: {}", path.display());
            }
        }
        Ok(())
    }
}

impl Default for MiniLmFiles {
    fn default() -> Self {
        Self::in_dir(DEFAULT_MINILM_DIR)
    }
}

/// Mean of the token states the attention mask keeps, L2-normalised.
/// `hidden` is row-major `[tokens, hidden_dim]`.
#[cfg_attr(not(feature = "onnx"), allow(dead_code))]
pub(crate) fn mean_pool(hidden: &[f32], mask: &[u32], hidden_dim: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden_dim];
    let mut kept = 0.0f32;
    for (state, _) in hidden.chunks_exact(hidden_dim).zip(mask).filter(|(_, m)| **m != 0) {
        kept += 1.0;
        for (acc, x) in pooled.iter_mut().zip(state) {
            *acc += x;
        }
    }
    if kept > 0.0 {
        pooled.iter_mut().for_each(|x| *x /= kept);
    }
    let norm = pooled.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-12 {
        pooled.iter_mut().for_each(|x| *x /= norm);
    }
    pooled
}

#[cfg(feature = "onnx")]
mod runtime {
    use std::sync::Mutex;

    use anyhow::{anyhow, Context, Result};
    use async_trait::async_trait;
    use ndarray::Array2;
    use ort::{session::Session, value::TensorRef};
    use tokenizers::{Tokenizer, TruncationParams};
    use tracing::{debug, info};

    use super::{mean_pool, MiniLmFiles, MAX_TOKENS, MINILM_DIMENSION};
    use crate::embeddings::EmbeddingProvider;

    pub struct MiniLmEmbeddings {
        session: Mutex<Session>,
        tokenizer: Tokenizer,
    }

    impl MiniLmEmbeddings {
        pub fn load(files: &MiniLmFiles) -> Result<Self> {
            files.check()?;
            info!(model = %files.model.display(), "Loading MiniLM embedding model");
            let session = Session::builder()
                .context("failed to create ONNX session builder")?
                .commit_from_file(&files.model)
                .with_context(|| format!("failed to load ONNX model from {}", files.model.display()))?;

            let mut tokenizer = Tokenizer::from_file(&files.tokenizer)
                .map_err(|e| anyhow!("failed to load tokenizer: {e}"))?;
            tokenizer
                .with_truncation(Some(TruncationParams { max_length: MAX_TOKENS, ..Default::default() }))
                .map_err(|e| anyhow!("failed to configure truncation: {e}"))?;

            Ok(Self { session: Mutex::new(session), tokenizer })
        }

        fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| anyhow!("tokenization failed: {e}"))?;
            let mask = encoding.get_attention_mask();
            let len = encoding.get_ids().len();

            let ids = Array2::from_shape_vec((1, len), encoding.get_ids().iter().map(|&t| i64::from(t)).collect())?;
            let attention = Array2::from_shape_vec((1, len), mask.iter().map(|&m| i64::from(m)).collect())?;
            let type_ids = Array2::<i64>::zeros((1, len));

            let mut session = self.session.lock().map_err(|_| anyhow!("MiniLM session lock poisoned"))?;
            let outputs = session
                .run(ort::inputs![
                    TensorRef::from_array_view(ids.view()).context("input_ids tensor")?,
                    TensorRef::from_array_view(attention.view()).context("attention_mask tensor")?,
                    TensorRef::from_array_view(type_ids.view()).context("token_type_ids tensor")?
                ])
                .context("ONNX inference failed")?;

            // last_hidden_state: [1, tokens, hidden]
            let (shape, hidden) = outputs[0]
                .try_extract_tensor::<f32>()
                .context("failed to read hidden states")?;
            debug!(tokens = len, shape = ?shape, "MiniLM forward pass");
            Ok(mean_pool(hidden, mask, shape[2] as usize))
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MiniLmEmbeddings {
        fn dimension(&self) -> usize {
            MINILM_DIMENSION
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.embed_one(text)
        }
    }
}

#[cfg(feature = "onnx")]
pub use runtime::MiniLmEmbeddings;

/// Load the ONNX model, or explain why it cannot be used.
#[cfg(feature = "onnx")]
pub fn load_minilm(files: &MiniLmFiles) -> Result<std::sync::Arc<dyn crate::EmbeddingProvider>> {
    Ok(std::sync::Arc::new(MiniLmEmbeddings::load(files)?))
}

#[cfg(not(feature = "onnx"))]
pub fn load_minilm(files: &MiniLmFiles) -> Result<std::sync::Arc<dyn crate::EmbeddingProvider>> {
    files.check()?;
    bail!("poemforge was built without the `onnx` feature")
}
