/// Vision understanding: describe images using a vision LLM.
///
/// Image inputs are turned into a single grounding text by two calls, one
/// transcribing any visible text and one describing the visual content.
use anyhow::{bail, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::{debug, info};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const NO_TEXT_MARKER: &str = "[NO TEXT]";
const MIN_TEXT_CHARS: usize = 10;

const TEXT_PROMPT: &str = "Extract ALL text visible in this image.
If there is text, transcribe it exactly as it appears.
If there is NO text or very minimal text (less than 5 words), simply respond with: [NO TEXT]

Return only the extracted text, nothing else.";

const VISUAL_PROMPT: &str = "Analyze this image's visual content in detail. Provide a comprehensive description covering:

1. Main subjects, objects, and people (what do you see?)
2. Setting, environment, and background details
3. Colors, lighting, and visual mood/atmosphere
4. Composition, perspective, and spatial arrangement
5. Actions, events, or narrative elements happening
6. Notable details, patterns, textures, or symbols
7. Style and medium (photograph, illustration, artwork, diagram, etc.)
8. Overall feeling and emotional tone conveyed

Be specific and factual. Describe what IS visible, not interpretations.
Write 250-350 words in flowing prose suitable for poetry context.

Note: Focus ONLY on visual elements. Do NOT describe any text you see, that is handled separately.";

/// Supported vision providers.
#[derive(Debug, Clone)]
pub enum VisionProvider {
    OpenAI { api_key: String, model: String },
    Gemini { api_key: String, model: String },
}

impl VisionProvider {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::OpenAI { api_key: api_key.into(), model: "gpt-4o".to_string() }
    }
    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self::Gemini { api_key: api_key.into(), model: "gemini-2.0-flash".to_string() }
    }
}

/// Outcome of the two-pass image analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAnalysis {
    /// Verbatim text found in the image, if any counted
    pub extracted_text: Option<String>,
    pub visual_description: String,
    pub combined_context: String,
}

impl ImageAnalysis {
    pub fn from_parts(raw_text: &str, visual_description: &str) -> Self {
        let raw_text = raw_text.trim();
        let visual_description = visual_description.trim().to_string();
        let extracted_text = (!raw_text.to_uppercase().contains(NO_TEXT_MARKER)
            && raw_text.chars().count() > MIN_TEXT_CHARS)
            .then(|| raw_text.to_string());

        let combined_context = match &extracted_text {
            Some(text) => format!(
                "IMAGE COMPREHENSIVE ANALYSIS:\n\n\
                 TEXT CONTENT EXTRACTED FROM IMAGE:\n{text}\n\n\
                 VISUAL DESCRIPTION:\n{visual_description}\n\n\
                 This image contains both textual information and rich visual content. \
                 The poetry should be grounded in both the extracted text and the visual \
                 elements described above."
            ),
            None => format!(
                "IMAGE COMPREHENSIVE ANALYSIS:\n\n\
                 VISUAL DESCRIPTION:\n{visual_description}\n\n\
                 This image is primarily visual without significant text content. \
                 The poetry should be grounded in the visual elements and atmosphere \
                 described above."
            ),
        };

        Self { extracted_text, visual_description, combined_context }
    }

    pub fn has_text(&self) -> bool {
        self.extracted_text.is_some()
    }
}

/// Run both vision passes over one image.
pub async fn analyze_image(
    provider: &VisionProvider,
    image_bytes: &[u8],
    mime_type: &str,
) -> Result<ImageAnalysis> {
    info!("[Vision] Analyzing image text and visual content");
    let raw_text = describe_image(provider, image_bytes, mime_type, TEXT_PROMPT).await?;
    let visual = describe_image(provider, image_bytes, mime_type, VISUAL_PROMPT).await?;
    if visual.trim().is_empty() {
        bail!("vision model returned an empty description");
    }
    let analysis = ImageAnalysis::from_parts(&raw_text, &visual);
    debug!(
        has_text = analysis.has_text(),
        visual_chars = analysis.visual_description.len(),
        "[Vision] Image analysis complete"
    );
    Ok(analysis)
}

/// Describe an image from raw bytes using a vision LLM.
pub async fn describe_image(
    provider: &VisionProvider,
    image_bytes: &[u8],
    mime_type: &str,
    prompt: &str,
) -> Result<String> {
    let b64 = STANDARD.encode(image_bytes);
    match provider {
        VisionProvider::OpenAI { api_key, model } => {
            describe_via_openai(api_key, model, &b64, mime_type, prompt).await
        }
        VisionProvider::Gemini { api_key, model } => {
            describe_via_gemini(api_key, model, &b64, mime_type, prompt).await
        }
    }
}

async fn describe_via_openai(
    api_key: &str, model: &str, b64: &str, mime_type: &str, prompt: &str,
) -> Result<String> {
    debug!("[Vision] Describing image via OpenAI {}", model);
    let client = reqwest::Client::new();
    let body = serde_json::json!({
        "model": model,
        "messages": [{
            "role": "user",
            "content": [
                { "type": "text", "text": prompt },
                { "type": "image_url",
                  "image_url": { "url": format!("data:{};base64,{}", mime_type, b64) } }
            ]
        }],
        "max_tokens": 1024
    });
    let resp = client
        .post("https://api.openai.com/v1/chat/completions")
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await?;
    if !resp.status().is_success() {
        bail!("OpenAI vision error: {}", resp.text().await.unwrap_or_default());
    }
    let json: serde_json::Value = resp.json().await?;
    Ok(json["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or("")
        .to_string())
}

async fn describe_via_gemini(
    api_key: &str, model: &str, b64: &str, mime_type: &str, prompt: &str,
) -> Result<String> {
    debug!("[Vision] Describing image via Gemini {}", model);
    let client = reqwest::Client::new();
    let url = format!(
        "{}/models/{}:generateContent",
        GEMINI_BASE_URL,
        model.trim_start_matches("models/")
    );
    let body = serde_json::json!({
        "contents": [{ "parts": [
            { "text": prompt },
            { "inlineData": { "mimeType": mime_type, "data": b64 } }
        ]}]
    });
    let resp = client
        .post(&url)
        .header("x-goog-api-key", api_key)
        .json(&body)
        .send()
        .await?;
    if !resp.status().is_success() {
        bail!("Gemini vision error: {}", resp.text().await.unwrap_or_default());
    }
    let json: serde_json::Value = resp.json().await?;
    let text = json["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_text_marker_drops_text_section() {
        let a = ImageAnalysis::from_parts("[no text]", "A red barn under snow.");
        assert!(!a.has_text());
        assert!(a.combined_context.starts_with("IMAGE COMPREHENSIVE ANALYSIS:"));
        assert!(!a.combined_context.contains("TEXT CONTENT EXTRACTED"));
        assert!(a.combined_context.contains("A red barn under snow."));
    }

    #[test]
    fn short_text_does_not_count() {
        let a = ImageAnalysis::from_parts("EXIT", "A corridor.");
        assert_eq!(a.extracted_text, None);
    }

    #[test]
    fn real_text_is_included_before_visuals() {
        let a = ImageAnalysis::from_parts(
            "  Welcome to the harbor festival  ",
            "Boats with lanterns.",
        );
        assert_eq!(a.extracted_text.as_deref(), Some("Welcome to the harbor festival"));
        let text_pos = a.combined_context.find("TEXT CONTENT").unwrap();
        let visual_pos = a.combined_context.find("VISUAL DESCRIPTION").unwrap();
        assert!(text_pos < visual_pos);
    }
}
