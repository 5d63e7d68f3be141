use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use poemforge_core::SynthesisError;
use tracing::{info, warn};

use crate::engine::{AudioFormat, TtsProvider, TtsRequest};

/// Spoken form of one poem: an attribution line, then the verses.
pub fn poem_narration<S: AsRef<str>>(agent: &str, verses: &[S]) -> String {
    let body = verses.iter().map(AsRef::as_ref).collect::<Vec<_>>().join("\n\n");
    format!("Poem by {agent}\n\n{body}")
}

pub fn judgment_narration(raw_judgment: &str) -> String {
    raw_judgment.trim().to_string()
}

/// A named piece of text to speak. `name` becomes the file stem.
#[derive(Debug, Clone)]
pub struct NarrationItem {
    pub name: String,
    pub text: String,
}

impl NarrationItem {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self { name: name.into(), text: text.into() }
    }
}

#[derive(Debug, Clone)]
pub struct AudioClip {
    pub name: String,
    pub format: AudioFormat,
    pub bytes: Bytes,
}

impl AudioClip {
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.format.extension())
    }
}

/// Clips that were produced plus the items that failed. A failed item never
/// aborts the others.
#[derive(Debug, Default)]
pub struct NarrationReport {
    pub clips: Vec<AudioClip>,
    pub skipped: Vec<(String, SynthesisError)>,
}

pub struct Narrator {
    provider: Arc<dyn TtsProvider>,
    timeout: Duration,
    format: AudioFormat,
}

impl Narrator {
    pub fn new(provider: Arc<dyn TtsProvider>, timeout: Duration) -> Self {
        Self { provider, timeout, format: AudioFormat::Mp3 }
    }

    async fn synthesize(&self, text: &str) -> Result<Bytes, SynthesisError> {
        if text.trim().is_empty() {
            return Err(SynthesisError("nothing to narrate".into()));
        }
        let req = TtsRequest { text: text.to_string(), format: self.format, ..Default::default() };
        let bytes = tokio::time::timeout(self.timeout, self.provider.synthesize(req))
            .await
            .map_err(|_| {
                SynthesisError(format!("{} timed out after {:?}", self.provider.name(), self.timeout))
            })??;
        if bytes.is_empty() {
            return Err(SynthesisError(format!("{} returned no audio", self.provider.name())));
        }
        Ok(bytes)
    }

    pub async fn narrate(&self, items: Vec<NarrationItem>) -> NarrationReport {
        let mut report = NarrationReport::default();
        for item in items {
            match self.synthesize(&item.text).await {
                Ok(bytes) => {
                    info!(item = %item.name, bytes = bytes.len(), "Narration synthesized");
                    report.clips.push(AudioClip { name: item.name, format: self.format, bytes });
                }
                Err(e) => {
                    warn!(item = %item.name, error = %e, "Narration skipped");
                    report.skipped.push((item.name, e));
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FakeTts;

    #[async_trait]
    impl TtsProvider for FakeTts {
        fn name(&self) -> &str {
            "fake"
        }

        async fn synthesize(&self, req: TtsRequest) -> Result<Bytes, SynthesisError> {
            if req.text.contains("fail") {
                return Err(SynthesisError("service unavailable".into()));
            }
            if req.text.contains("slow") {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Ok(Bytes::from(req.text.into_bytes()))
        }
    }

    #[test]
    fn poem_narration_layout() {
        let text = poem_narration("Gemini", &["first verse", "second verse"]);
        assert_eq!(text, "Poem by Gemini\n\nfirst verse\n\nsecond verse");
    }

    #[tokio::test]
    async fn failures_are_skipped_not_fatal() {
        let narrator = Narrator::new(Arc::new(FakeTts), Duration::from_secs(1));
        let report = narrator
            .narrate(vec![
                NarrationItem::new("poem_a", "a poem"),
                NarrationItem::new("poem_b", "please fail"),
                NarrationItem::new("judgment", "   "),
            ])
            .await;
        assert_eq!(report.clips.len(), 1);
        assert_eq!(report.clips[0].file_name(), "poem_a.mp3");
        let skipped: Vec<_> = report.skipped.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(skipped, vec!["poem_b", "judgment"]);
    }

    #[tokio::test]
    async fn slow_synthesis_times_out() {
        let narrator = Narrator::new(Arc::new(FakeTts), Duration::from_millis(100));
        let report = narrator.narrate(vec![NarrationItem::new("poem_a", "slow")]).await;
        assert!(report.clips.is_empty());
        assert!(report.skipped[0].1.to_string().contains("timed out"));
    }
}
