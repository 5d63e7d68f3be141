use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PoemError;

/// One of the two alternating verse providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    ProviderA,
    ProviderB,
}

impl Speaker {
    /// ProviderA owns odd turns, ProviderB even ones (1-based).
    pub fn for_turn(index: usize) -> Self {
        if index % 2 == 1 {
            Self::ProviderA
        } else {
            Self::ProviderB
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ProviderA => "A",
            Self::ProviderB => "B",
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "provider {}", self.label())
    }
}

/// A single generated verse at a fixed position in the poem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerseTurn {
    speaker: Speaker,
    index: usize,
    text: String,
}

impl VerseTurn {
    /// Speaker is derived from the turn index so the two can never disagree.
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::for_turn(index),
            index,
            text: text.into(),
        }
    }

    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// The five fixed judging criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    FactualAccuracy,
    LiteraryQuality,
    Coherence,
    Creativity,
    RhythmAndSound,
}

impl Criterion {
    pub const ALL: [Criterion; 5] = [
        Criterion::FactualAccuracy,
        Criterion::LiteraryQuality,
        Criterion::Coherence,
        Criterion::Creativity,
        Criterion::RhythmAndSound,
    ];

    pub fn max_points(&self) -> u32 {
        match self {
            Self::FactualAccuracy => 30,
            Self::LiteraryQuality => 25,
            Self::Coherence => 20,
            Self::Creativity => 15,
            Self::RhythmAndSound => 10,
        }
    }

    /// Label used in the judge rubric and its reply.
    pub fn label(&self) -> &'static str {
        match self {
            Self::FactualAccuracy => "Factual Accuracy",
            Self::LiteraryQuality => "Literary Quality",
            Self::Coherence => "Coherence",
            Self::Creativity => "Creativity",
            Self::RhythmAndSound => "Rhythm & Sound",
        }
    }
}

/// Points per criterion for one poem.
pub type Scorecard = BTreeMap<Criterion, u32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    A,
    B,
    Tie,
}

/// Free-text parts of a judge reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JudgmentNotes {
    pub justification: String,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub raw_text: String,
}

/// Validated evaluation of both poems.
///
/// Every criterion is present and within its maximum for both poems, and the
/// totals are always the sum of the criteria.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Judgment {
    scores_a: Scorecard,
    scores_b: Scorecard,
    total_a: u32,
    total_b: u32,
    winner: Winner,
    justification: String,
    strengths: Vec<String>,
    improvements: Vec<String>,
    raw_text: String,
}

impl Judgment {
    pub fn new(scores_a: Scorecard, scores_b: Scorecard, notes: JudgmentNotes) -> Result<Self, PoemError> {
        let total_a = checked_total("A", &scores_a)?;
        let total_b = checked_total("B", &scores_b)?;
        let winner = match total_a.cmp(&total_b) {
            std::cmp::Ordering::Greater => Winner::A,
            std::cmp::Ordering::Less => Winner::B,
            std::cmp::Ordering::Equal => Winner::Tie,
        };
        Ok(Self {
            scores_a,
            scores_b,
            total_a,
            total_b,
            winner,
            justification: notes.justification,
            strengths: notes.strengths,
            improvements: notes.improvements,
            raw_text: notes.raw_text,
        })
    }

    pub fn scores_a(&self) -> &Scorecard {
        &self.scores_a
    }

    pub fn scores_b(&self) -> &Scorecard {
        &self.scores_b
    }

    pub fn total_a(&self) -> u32 {
        self.total_a
    }

    pub fn total_b(&self) -> u32 {
        self.total_b
    }

    pub fn winner(&self) -> Winner {
        self.winner
    }

    pub fn justification(&self) -> &str {
        &self.justification
    }

    pub fn strengths(&self) -> &[String] {
        &self.strengths
    }

    pub fn improvements(&self) -> &[String] {
        &self.improvements
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }
}

fn checked_total(poem: &str, card: &Scorecard) -> Result<u32, PoemError> {
    let mut total = 0;
    for criterion in Criterion::ALL {
        let Some(&points) = card.get(&criterion) else {
            return Err(PoemError::MalformedJudgment(format!(
                "poem {poem} is missing a score for {}",
                criterion.label()
            )));
        };
        if points > criterion.max_points() {
            return Err(PoemError::MalformedJudgment(format!(
                "poem {poem} scored {points}/{} for {}",
                criterion.max_points(),
                criterion.label()
            )));
        }
        total += points;
    }
    Ok(total)
}

/// A piece of extracted document text plus where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub text: String,
    pub metadata: serde_json::Value,
}

/// Output of a document loader.
#[derive(Debug, Clone, Default)]
pub struct LoadedDocument {
    pub chunks: Vec<DocumentChunk>,
    /// Text was produced by a vision model describing an image.
    pub image_derived: bool,
}
