//! Output record assembly and its two renderings.
//!
//! Everything here is pure: the record borrows from the session and the
//! judgment, and rendering the same inputs twice yields identical bytes.

use poemforge_core::{Judgment, Speaker, VerseTurn};
use serde::Serialize;

use crate::session_state::Session;

const CONTEXT_PREVIEW_CHARS: usize = 300;
const RULE_WIDTH: usize = 60;

/// Facts about a run that are not part of the session itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunMetadata {
    pub source_path: String,
    pub image_derived: bool,
    /// Context length in characters.
    pub context_length: usize,
    pub verse_count: usize,
    #[serde(skip)]
    pub poet_a_label: String,
    #[serde(skip)]
    pub poet_b_label: String,
}

impl RunMetadata {
    pub fn for_session(
        session: &Session,
        source_path: impl Into<String>,
        image_derived: bool,
        poet_a_label: impl Into<String>,
        poet_b_label: impl Into<String>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            image_derived,
            context_length: session.context().chars().count(),
            verse_count: session.target_verse_count(),
            poet_a_label: poet_a_label.into(),
            poet_b_label: poet_b_label.into(),
        }
    }
}

/// One speaker's verses, in turn order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoemView<'a> {
    pub speaker: Speaker,
    pub agent: &'a str,
    pub verses: Vec<&'a str>,
}

impl<'a> PoemView<'a> {
    pub fn of(session: &'a Session, speaker: Speaker, agent: &'a str) -> Self {
        Self {
            speaker,
            agent,
            verses: session.verses_by(speaker).map(VerseTurn::text).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRecord<'a> {
    pub session_id: String,
    pub context: &'a str,
    pub turns: &'a [VerseTurn],
    pub poem_a: PoemView<'a>,
    pub poem_b: PoemView<'a>,
    pub judgment: &'a Judgment,
    pub metadata: &'a RunMetadata,
}

pub fn assemble<'a>(
    session: &'a Session,
    judgment: &'a Judgment,
    metadata: &'a RunMetadata,
) -> OutputRecord<'a> {
    OutputRecord {
        session_id: session.id().to_string(),
        context: session.context(),
        turns: session.turns(),
        poem_a: PoemView::of(session, Speaker::ProviderA, &metadata.poet_a_label),
        poem_b: PoemView::of(session, Speaker::ProviderB, &metadata.poet_b_label),
        judgment,
        metadata,
    }
}

/// `poem_results.json` contents.
pub fn render_json(record: &OutputRecord<'_>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(record)
}

/// `poems.txt` contents.
pub fn render_text(record: &OutputRecord<'_>) -> String {
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);
    let preview: String = record.context.chars().take(CONTEXT_PREVIEW_CHARS).collect();

    let mut out = format!("{heavy}\nCOLLABORATIVE POEM GENERATION RESULTS\n{heavy}\n\n");
    out.push_str(&format!("Source: {}\n", record.metadata.source_path));
    if record.metadata.image_derived {
        out.push_str("Method: AI Vision Analysis (Comprehensive)\n");
    }
    out.push_str(&format!("Context: {preview}...\n\n"));

    for (i, (name, poem)) in [("A", &record.poem_a), ("B", &record.poem_b)].into_iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!("{light}\nPOEM {name} - {}\n{light}\n", poem.agent));
        for (n, verse) in poem.verses.iter().enumerate() {
            out.push_str(&format!("{}. {verse}\n", n + 1));
        }
    }

    out.push_str(&format!("\n{heavy}\nJUDGMENT\n{heavy}\n"));
    out.push_str(record.judgment.raw_text());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::parse_judgment;
    use crate::testing::{JUDGE_REPLY, session_with};

    fn metadata(session: &Session, image: bool) -> RunMetadata {
        RunMetadata::for_session(session, "docs/bees.txt", image, "Gemini Poet", "Llama Poet")
    }

    #[test]
    fn views_split_by_speaker() {
        let session = session_with("bees", &["a1", "b1", "a2", "b2", "a3"]);
        let judgment = parse_judgment(JUDGE_REPLY).unwrap();
        let meta = metadata(&session, false);
        let record = assemble(&session, &judgment, &meta);
        assert_eq!(record.poem_a.verses, ["a1", "a2", "a3"]);
        assert_eq!(record.poem_b.verses, ["b1", "b2"]);
        assert_eq!(record.poem_a.agent, "Gemini Poet");
        assert_eq!(meta.context_length, 4);
        assert_eq!(meta.verse_count, 5);
    }

    #[test]
    fn assembly_is_deterministic() {
        let session = session_with("bees", &["a1", "b1"]);
        let judgment = parse_judgment(JUDGE_REPLY).unwrap();
        let meta = metadata(&session, true);

        let first = assemble(&session, &judgment, &meta);
        let second = assemble(&session, &judgment, &meta);
        assert_eq!(first, second);
        assert_eq!(render_json(&first).unwrap(), render_json(&second).unwrap());
        assert_eq!(render_text(&first), render_text(&second));
    }

    #[test]
    fn json_carries_scores_and_metadata() {
        let session = session_with("bees", &["a1", "b1"]);
        let judgment = parse_judgment(JUDGE_REPLY).unwrap();
        let meta = metadata(&session, false);
        let json: serde_json::Value =
            serde_json::from_str(&render_json(&assemble(&session, &judgment, &meta)).unwrap()).unwrap();

        assert_eq!(json["poem_b"]["verses"][0], "b1");
        assert_eq!(json["poem_a"]["speaker"], "provider_a");
        assert_eq!(json["judgment"]["total_b"], 82);
        assert_eq!(json["judgment"]["winner"], "B");
        assert_eq!(json["judgment"]["scores_a"]["factual_accuracy"], 25);
        assert_eq!(json["metadata"]["source_path"], "docs/bees.txt");
        assert!(json["metadata"].get("poet_a_label").is_none());
        assert_eq!(json["turns"][1]["speaker"], "provider_b");
    }

    #[test]
    fn text_layout() {
        let session = session_with(&"x".repeat(400), &["a1", "b1", "a2"]);
        let judgment = parse_judgment(JUDGE_REPLY).unwrap();
        let meta = metadata(&session, true);
        let text = render_text(&assemble(&session, &judgment, &meta));

        let rule = "=".repeat(60);
        assert!(text.starts_with(&format!("{rule}\nCOLLABORATIVE POEM GENERATION RESULTS\n{rule}\n\n")));
        assert!(text.contains("Source: docs/bees.txt\nMethod: AI Vision Analysis (Comprehensive)\n"));
        assert!(text.contains(&format!("Context: {}...\n", "x".repeat(300))));
        assert!(text.contains("POEM A - Gemini Poet\n"));
        assert!(text.contains("1. a1\n2. a2\n\n"));
        assert!(text.contains(&format!("{rule}\nJUDGMENT\n{rule}\n**POEM A SCORES:**")));
    }

    #[test]
    fn text_omits_method_for_documents() {
        let session = session_with("bees", &["a1"]);
        let judgment = parse_judgment(JUDGE_REPLY).unwrap();
        let meta = metadata(&session, false);
        assert!(!render_text(&assemble(&session, &judgment, &meta)).contains("Method:"));
    }
}
