/// TTS provider trait and implementations (Google Translate, OpenAI, ElevenLabs).
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use poemforge_core::SynthesisError;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Audio format for TTS output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AudioFormat {
    #[default]
    Mp3,
    Opus,
    Flac,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Opus => "opus",
            Self::Flac => "flac",
        }
    }
}

/// A TTS request.
#[derive(Debug, Clone)]
pub struct TtsRequest {
    pub text: String,
    pub voice: Option<String>,
    pub format: AudioFormat,
    pub speed: f32,
}

impl Default for TtsRequest {
    fn default() -> Self {
        Self {
            text: String::new(),
            voice: None,
            format: AudioFormat::Mp3,
            speed: 1.0,
        }
    }
}

/// Returns raw audio bytes.
#[async_trait]
pub trait TtsProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn synthesize(&self, req: TtsRequest) -> Result<Bytes, SynthesisError>;
}

fn http_error(provider: &str, e: reqwest::Error) -> SynthesisError {
    SynthesisError(format!("{provider}: {e}"))
}

// ---------------------------------------------------------------------------
// Google Translate TTS (no key)
// ---------------------------------------------------------------------------

const GTTS_URL: &str = "https://translate.google.com/translate_tts";
const GTTS_MAX_CHARS: usize = 200;

/// Keyless endpoint behind Google Translate's speaker button. Only MP3 output.
/// Text is sent in segments of at most 200 characters and the MP3 frames are
/// concatenated.
pub struct GoogleTranslateTts {
    lang: String,
    client: Client,
}

impl GoogleTranslateTts {
    pub fn new(lang: impl Into<String>) -> Self {
        Self { lang: lang.into(), client: Client::new() }
    }
}

impl Default for GoogleTranslateTts {
    fn default() -> Self {
        Self::new("en")
    }
}

/// Split on whitespace into segments no longer than `max` characters. Words
/// longer than `max` are hard-split.
pub(crate) fn segment_text(text: &str, max: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word = word.to_string();
        while word.chars().count() > max {
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
            let head: String = word.chars().take(max).collect();
            word = word.chars().skip(max).collect();
            segments.push(head);
        }
        let extra = if current.is_empty() { 0 } else { 1 };
        if current.chars().count() + extra + word.chars().count() > max {
            segments.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

#[async_trait]
impl TtsProvider for GoogleTranslateTts {
    fn name(&self) -> &str {
        "google-translate"
    }

    async fn synthesize(&self, req: TtsRequest) -> Result<Bytes, SynthesisError> {
        if req.format != AudioFormat::Mp3 {
            return Err(SynthesisError(format!(
                "google-translate only produces mp3, not {}",
                req.format.extension()
            )));
        }
        let segments = segment_text(&req.text, GTTS_MAX_CHARS);
        debug!("[TTS/Google] Synthesizing {} segment(s)", segments.len());
        let total = segments.len().to_string();
        let mut audio = BytesMut::new();
        for (idx, segment) in segments.iter().enumerate() {
            let idx = idx.to_string();
            let bytes = self
                .client
                .get(GTTS_URL)
                .query(&[
                    ("ie", "UTF-8"),
                    ("client", "tw-ob"),
                    ("tl", self.lang.as_str()),
                    ("q", segment.as_str()),
                    ("idx", idx.as_str()),
                    ("total", total.as_str()),
                ])
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| http_error("google-translate", e))?
                .bytes()
                .await
                .map_err(|e| http_error("google-translate", e))?;
            audio.extend_from_slice(&bytes);
        }
        Ok(audio.freeze())
    }
}

// ---------------------------------------------------------------------------
// OpenAI TTS
// ---------------------------------------------------------------------------

pub struct OpenAiTts {
    api_key: String,
    model: String,
    default_voice: String,
    client: Client,
}

impl OpenAiTts {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: "tts-1".to_string(),
            default_voice: "nova".to_string(),
            client: Client::new(),
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.default_voice = voice.into();
        self
    }
}

#[derive(Serialize)]
struct OpenAiTtsBody<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
    speed: f32,
}

#[async_trait]
impl TtsProvider for OpenAiTts {
    fn name(&self) -> &str {
        "openai"
    }

    async fn synthesize(&self, req: TtsRequest) -> Result<Bytes, SynthesisError> {
        let body = OpenAiTtsBody {
            model: &self.model,
            input: &req.text,
            voice: req.voice.as_deref().unwrap_or(&self.default_voice),
            response_format: req.format.extension(),
            speed: req.speed,
        };
        debug!("[TTS/OpenAI] Synthesizing with model={}", body.model);
        self.client
            .post("https://api.openai.com/v1/audio/speech")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| http_error("openai", e))?
            .bytes()
            .await
            .map_err(|e| http_error("openai", e))
    }
}

// ---------------------------------------------------------------------------
// ElevenLabs TTS
// ---------------------------------------------------------------------------

pub struct ElevenLabsTts {
    api_key: String,
    default_voice_id: String,
    client: Client,
}

impl ElevenLabsTts {
    pub fn new(api_key: String, voice_id: Option<String>) -> Self {
        Self {
            api_key,
            default_voice_id: voice_id.unwrap_or_else(|| "21m00Tcm4TlvDq8ikWAM".to_string()), // Rachel
            client: Client::new(),
        }
    }
}

#[derive(Serialize)]
struct ElevenLabsBody<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: ElevenLabsVoiceSettings,
}

#[derive(Serialize)]
struct ElevenLabsVoiceSettings {
    stability: f32,
    similarity_boost: f32,
    speed: f32,
}

#[async_trait]
impl TtsProvider for ElevenLabsTts {
    fn name(&self) -> &str {
        "elevenlabs"
    }

    async fn synthesize(&self, req: TtsRequest) -> Result<Bytes, SynthesisError> {
        if req.format != AudioFormat::Mp3 {
            return Err(SynthesisError("elevenlabs stream endpoint only produces mp3".into()));
        }
        let voice_id = req.voice.as_deref().unwrap_or(&self.default_voice_id);
        let url = format!("https://api.elevenlabs.io/v1/text-to-speech/{}/stream", voice_id);
        let body = ElevenLabsBody {
            text: &req.text,
            model_id: "eleven_multilingual_v2",
            voice_settings: ElevenLabsVoiceSettings {
                stability: 0.5,
                similarity_boost: 0.75,
                speed: req.speed,
            },
        };
        debug!("[TTS/ElevenLabs] Synthesizing voice_id={}", voice_id);
        self.client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| http_error("elevenlabs", e))?
            .bytes()
            .await
            .map_err(|e| http_error("elevenlabs", e))
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum TtsProviderKind {
    GoogleTranslate { lang: String },
    OpenAi { api_key: String, voice: Option<String> },
    ElevenLabs { api_key: String, voice_id: Option<String> },
}

pub fn create_tts(kind: TtsProviderKind) -> Arc<dyn TtsProvider> {
    match kind {
        TtsProviderKind::GoogleTranslate { lang } => Arc::new(GoogleTranslateTts::new(lang)),
        TtsProviderKind::OpenAi { api_key, voice } => {
            let tts = OpenAiTts::new(api_key);
            Arc::new(match voice {
                Some(v) => tts.with_voice(v),
                None => tts,
            })
        }
        TtsProviderKind::ElevenLabs { api_key, voice_id } => {
            Arc::new(ElevenLabsTts::new(api_key, voice_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_respect_limit_and_keep_words() {
        let text = "Moonlight spills across the harbor ".repeat(20);
        let segments = segment_text(&text, 40);
        assert!(segments.len() > 1);
        assert!(segments.iter().all(|s| s.chars().count() <= 40));
        assert_eq!(segments.join(" "), text.split_whitespace().collect::<Vec<_>>().join(" "));
    }

    #[test]
    fn overlong_word_is_hard_split() {
        let segments = segment_text(&"a".repeat(25), 10);
        assert_eq!(segments, vec!["a".repeat(10), "a".repeat(10), "a".repeat(5)]);
    }

    #[test]
    fn factory_names() {
        let g = create_tts(TtsProviderKind::GoogleTranslate { lang: "en".into() });
        assert_eq!(g.name(), "google-translate");
        let o = create_tts(TtsProviderKind::OpenAi { api_key: "k".into(), voice: None });
        assert_eq!(o.name(), "openai");
    }
}
