//! Scoring both poems against the rubric and parsing the judge's reply.

use std::sync::Arc;
use std::time::Duration;

use poemforge_core::{
    Criterion, Judgment, JudgmentNotes, PoemError, Retriever, Scorecard, Speaker, VerseTurn, Winner,
};
use once_cell::sync::Lazy;
use poemforge_logging::{RunEvent, RunEventLogger};
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::grounding::fetch_facts;
use crate::poet::Poet;
use crate::retry::RetryPolicy;
use crate::session_state::Session;
use crate::system_prompt::{judge_system_prompt, judge_user_prompt};
use crate::turn_loop::DEFAULT_CALL_TIMEOUT;

pub const DEFAULT_JUDGE_FACTS_K: usize = 3;

/// Extra judge calls allowed when the reply cannot be parsed.
const MALFORMED_RETRIES: u32 = 1;

static CRITERION_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:\d+[.)]\s*)?(factual\s+accuracy|literary\s+quality|coherence|creativity|rhythm\s*(?:&|and)\s*sound)\s*(?:\([^)]*\))?\s*[:\-]?\s*(\d+)\s*/\s*(\d+)",
    )
    .expect("static criterion regex")
});

static TOTAL_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^total\s*:?\s*(\d+)\s*/\s*100\b").expect("static total regex"));

static WINNER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^winner\s*:?\s*\[?\s*(?:poem\s+)?(a|b|tie)\b").expect("static winner regex")
});

/// A section header is the whole line, optionally followed by `: body`.
static SECTION_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:poem\s+(?P<poem>[ab])\s*[-:]?\s*scores?(?:\s*\([^)]*\))?|(?P<name>justification|strengths(?:\s+of\s+(?:the\s+)?winner)?|areas\s+for\s+improvement|improvements|source\s+facts(?:\s+used)?))\s*(?::\s*(?P<body>.*))?$",
    )
    .expect("static section header regex")
});

pub struct Judge {
    poet: Poet,
    retriever: Arc<dyn Retriever>,
    facts_k: usize,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl Judge {
    /// `poet` carries the judge's provider and sampling settings.
    pub fn new(poet: Poet, retriever: Arc<dyn Retriever>) -> Self {
        Self {
            poet,
            retriever,
            facts_k: DEFAULT_JUDGE_FACTS_K,
            retry: RetryPolicy::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_facts_k(mut self, k: usize) -> Self {
        self.facts_k = k;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn label(&self) -> &str {
        self.poet.label()
    }

    /// Judge a completed session. Incomplete sessions are rejected before any
    /// retrieval or model call.
    #[instrument(skip_all, fields(session_id = %session.id()))]
    pub async fn evaluate(
        &self,
        session: &Session,
        label_a: &str,
        label_b: &str,
    ) -> Result<Judgment, PoemError> {
        if !session.is_complete() {
            return Err(PoemError::PrematureJudgment {
                completed: session.turns().len(),
                target: session.target_verse_count(),
            });
        }

        let facts = fetch_facts(
            self.retriever.as_ref(),
            session.context(),
            self.facts_k,
            self.call_timeout,
        )
        .await?;

        let poem_a: Vec<&str> = session.verses_by(Speaker::ProviderA).map(VerseTurn::text).collect();
        let poem_b: Vec<&str> = session.verses_by(Speaker::ProviderB).map(VerseTurn::text).collect();
        let system = judge_system_prompt(&facts);
        let user = judge_user_prompt(label_a, &poem_a, label_b, &poem_b, session.context());
        let session_id = session.id().to_string();

        let mut malformed = 0;
        loop {
            let reply = self
                .poet
                .compose_retrying(&system, &user, self.call_timeout, &self.retry, &session_id, "judgment")
                .await?;

            match parse_judgment(&reply) {
                Ok(judgment) => {
                    info!(
                        total_a = judgment.total_a(),
                        total_b = judgment.total_b(),
                        winner = ?judgment.winner(),
                        "Judgment ready"
                    );
                    RunEventLogger::log_event(
                        &session_id,
                        RunEvent::JudgmentReady {
                            total_a: judgment.total_a(),
                            total_b: judgment.total_b(),
                            winner: format!("{:?}", judgment.winner()),
                        },
                    );
                    return Ok(judgment);
                }
                Err(PoemError::MalformedJudgment(reason)) if malformed < MALFORMED_RETRIES => {
                    malformed += 1;
                    warn!(%reason, "Judge reply unparseable, asking again");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Scores(Speaker),
    Justification,
    Strengths,
    Improvements,
    Other,
}

#[derive(Default)]
struct PoemScores {
    card: Scorecard,
    stated_total: Option<u32>,
}

/// Strip markdown headings, list markers and emphasis.
fn clean_line(line: &str) -> String {
    let trimmed = line.trim().trim_start_matches('#').trim();
    let rest = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("• "))
        .or_else(|| trimmed.strip_prefix("* "))
        .unwrap_or(trimmed);
    rest.replace("**", "").replace("__", "").trim().to_string()
}

/// The section a header line opens, plus any text after its colon.
fn header(line: &str) -> Option<(Section, Option<String>)> {
    let caps = SECTION_HEADER.captures(line)?;
    let section = if let Some(poem) = caps.name("poem") {
        match poem.as_str() {
            "a" | "A" => Section::Scores(Speaker::ProviderA),
            _ => Section::Scores(Speaker::ProviderB),
        }
    } else {
        let name = caps.name("name")?.as_str().to_ascii_lowercase();
        if name == "justification" {
            Section::Justification
        } else if name.starts_with("strengths") {
            Section::Strengths
        } else if name.starts_with("source") {
            Section::Other
        } else {
            Section::Improvements
        }
    };
    let body = caps
        .name("body")
        .map(|b| b.as_str().trim())
        .filter(|b| !b.is_empty())
        .map(str::to_string);
    Some((section, body))
}

fn parse_winner(raw: &str) -> Winner {
    match raw.to_ascii_lowercase().as_str() {
        "a" => Winner::A,
        "b" => Winner::B,
        _ => Winner::Tie,
    }
}

/// Parse a judge reply into a validated [`Judgment`].
///
/// Score sections are `POEM A SCORES:` / `POEM B SCORES:` followed by one
/// `Label: X/max` line per criterion. Markdown emphasis and headings are
/// ignored. Totals and the winner are always recomputed from the criteria;
/// stated values that disagree are only logged.
pub fn parse_judgment(text: &str) -> Result<Judgment, PoemError> {
    let mut section = Section::Preamble;
    let mut poem_a = PoemScores::default();
    let mut poem_b = PoemScores::default();
    let mut stated_winner = None;
    let mut justification: Vec<String> = Vec::new();
    let mut strengths = Vec::new();
    let mut improvements = Vec::new();

    for raw in text.lines() {
        let line = clean_line(raw);
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = WINNER_LINE.captures(&line) {
            stated_winner = Some(parse_winner(&caps[1]));
            section = Section::Other;
            continue;
        }
        if let Some((next, body)) = header(&line) {
            section = next;
            if let Some(body) = body {
                match section {
                    Section::Justification => justification.push(body),
                    Section::Strengths => strengths.push(body),
                    Section::Improvements => improvements.push(body),
                    _ => {}
                }
            }
            continue;
        }

        match section {
            Section::Scores(speaker) => {
                let scores = match speaker {
                    Speaker::ProviderA => &mut poem_a,
                    Speaker::ProviderB => &mut poem_b,
                };
                if let Some(caps) = TOTAL_LINE.captures(&line) {
                    scores.stated_total = caps[1].parse().ok();
                } else if let Some(caps) = CRITERION_LINE.captures(&line) {
                    record_score(scores, speaker, &caps)?;
                }
            }
            Section::Justification => justification.push(line),
            Section::Strengths => strengths.push(line),
            Section::Improvements => improvements.push(line),
            _ => {}
        }
    }

    let judgment = Judgment::new(
        poem_a.card,
        poem_b.card,
        JudgmentNotes {
            justification: justification.join(" "),
            strengths,
            improvements,
            raw_text: text.to_string(),
        },
    )?;

    for (poem, stated, actual) in [
        ("A", poem_a.stated_total, judgment.total_a()),
        ("B", poem_b.stated_total, judgment.total_b()),
    ] {
        if let Some(stated) = stated.filter(|s| *s != actual) {
            warn!(poem, stated, computed = actual, "Judge total disagrees with criteria");
        }
    }
    if let Some(stated) = stated_winner.filter(|w| *w != judgment.winner()) {
        warn!(stated = ?stated, computed = ?judgment.winner(), "Judge winner disagrees with totals");
    }

    Ok(judgment)
}

fn record_score(
    scores: &mut PoemScores,
    speaker: Speaker,
    caps: &regex::Captures<'_>,
) -> Result<(), PoemError> {
    let label = caps[1].to_ascii_lowercase();
    let criterion = match label.split_whitespace().next().unwrap_or_default() {
        "factual" => Criterion::FactualAccuracy,
        "literary" => Criterion::LiteraryQuality,
        "coherence" => Criterion::Coherence,
        "creativity" => Criterion::Creativity,
        _ => Criterion::RhythmAndSound,
    };
    let malformed = |msg: String| PoemError::MalformedJudgment(format!("poem {}: {msg}", speaker.label()));

    let points: u32 = caps[2].parse().map_err(|_| malformed(format!("bad score for {}", criterion.label())))?;
    let out_of: u32 = caps[3].parse().map_err(|_| malformed(format!("bad maximum for {}", criterion.label())))?;
    if out_of != criterion.max_points() {
        return Err(malformed(format!(
            "{} scored out of {out_of}, expected {}",
            criterion.label(),
            criterion.max_points()
        )));
    }
    if scores.card.insert(criterion, points).is_some() {
        return Err(malformed(format!("{} scored twice", criterion.label())));
    }
    Ok(())
}
