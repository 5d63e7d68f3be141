pub mod engine;
pub mod narration;

pub use engine::{
    create_tts, AudioFormat, ElevenLabsTts, GoogleTranslateTts, OpenAiTts, TtsProvider,
    TtsProviderKind, TtsRequest,
};
pub use narration::{
    judgment_narration, poem_narration, AudioClip, NarrationItem, NarrationReport, Narrator,
};
