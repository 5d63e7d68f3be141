use std::path::Path;

use async_trait::async_trait;
use poemforge_core::{DocumentChunk, DocumentLoader, LoadError, LoadedDocument};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::chunker::RecursiveChunker;
use crate::vision::{analyze_image, ImageAnalysis, VisionProvider};

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp", "tiff"];

/// Loads text, PDF, DOCX, and (with a vision provider) image files.
pub struct FileDocumentLoader {
    chunker: RecursiveChunker,
    vision: Option<VisionProvider>,
}

impl FileDocumentLoader {
    pub fn new(chunker: RecursiveChunker) -> Self {
        Self { chunker, vision: None }
    }

    pub fn with_vision(mut self, vision: VisionProvider) -> Self {
        self.vision = Some(vision);
        self
    }

    fn chunk_text(&self, text: &str, source: &str, file_type: &str) -> Vec<DocumentChunk> {
        self.chunker
            .split(text)
            .into_iter()
            .enumerate()
            .map(|(i, text)| DocumentChunk {
                text,
                metadata: json!({ "source": source, "file_type": file_type, "chunk_index": i }),
            })
            .collect()
    }

    async fn load_image(&self, path: &Path, ext: &str) -> Result<LoadedDocument, LoadError> {
        let Some(vision) = &self.vision else {
            return Err(LoadError::UnsupportedFormat(format!(
                ".{ext} (image input requires a vision provider)"
            )));
        };
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| LoadError::Extraction(format!("{}: {e}", path.display())))?;
        let analysis = analyze_image(vision, &bytes, mime_for(ext))
            .await
            .map_err(|e| LoadError::Extraction(format!("image analysis failed: {e}")))?;

        Ok(LoadedDocument { chunks: vec![image_chunk(path, analysis)], image_derived: true })
    }
}

/// The single chunk an analysed image becomes. Lengths are in characters.
fn image_chunk(path: &Path, analysis: ImageAnalysis) -> DocumentChunk {
    let text_length = analysis.extracted_text.as_deref().map_or(0, |t| t.chars().count());
    DocumentChunk {
        metadata: json!({
            "source": path.display().to_string(),
            "type": "comprehensive_image_analysis",
            "has_text": analysis.has_text(),
            "text_length": text_length,
            "visual_length": analysis.visual_description.chars().count(),
        }),
        text: analysis.combined_context,
    }
}

impl Default for FileDocumentLoader {
    fn default() -> Self {
        Self::new(RecursiveChunker::default())
    }
}

fn mime_for(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "bmp" => "image/bmp",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

fn extract_pdf(path: &Path) -> Result<String, LoadError> {
    // pdf_extract can panic on malformed files
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text(path)
    }));
    match result {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(LoadError::Extraction(format!("PDF extraction failed: {e}"))),
        Err(_) => Err(LoadError::Extraction("PDF extraction panicked (malformed PDF)".into())),
    }
}

fn extract_docx(path: &Path) -> Result<String, LoadError> {
    docx_lite::extract_text(path).map_err(|e| {
        LoadError::Extraction(format!("failed to extract text from DOCX {}: {e}", path.display()))
    })
}

async fn blocking<F>(f: F) -> Result<String, LoadError>
where
    F: FnOnce() -> Result<String, LoadError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LoadError::Extraction(format!("extraction task failed: {e}")))?
}

#[async_trait]
impl DocumentLoader for FileDocumentLoader {
    async fn load(&self, path: &Path) -> Result<LoadedDocument, LoadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        if !path.exists() {
            return Err(LoadError::Extraction(format!("file not found: {}", path.display())));
        }

        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            info!(path = %path.display(), "Loading image document");
            return self.load_image(path, &ext).await;
        }

        let owned = path.to_path_buf();
        let text = match ext.as_str() {
            "txt" | "md" => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| LoadError::Extraction(format!("{}: {e}", path.display())))?,
            "pdf" => blocking(move || extract_pdf(&owned)).await?,
            "docx" => blocking(move || extract_docx(&owned)).await?,
            other => {
                warn!(extension = other, "Unsupported document format");
                return Err(LoadError::UnsupportedFormat(format!(".{other}")));
            }
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(LoadError::Extraction(format!(
                "no text extracted from {}",
                path.display()
            )));
        }

        let chunks = self.chunk_text(text, &path.display().to_string(), &format!(".{ext}"));
        debug!(path = %path.display(), chunks = chunks.len(), "Document chunked");
        Ok(LoadedDocument { chunks, image_derived: false })
    }
}
