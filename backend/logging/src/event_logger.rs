//! Run Event Logger
//!
//! Structured pipeline events written through `tracing` on target `run_events`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_sensitive_data;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    VerseGenerated {
        turn: usize,
        speaker: String,
        provider: String,
        text: String,
    },
    RetryScheduled {
        operation: String,
        attempt: u32,
        delay_ms: u64,
        error: String,
    },
    JudgmentReady {
        total_a: u32,
        total_b: u32,
        winner: String,
    },
    RunFailed {
        kind: String,
        last_successful_turn: usize,
        error: String,
    },
    AudioSkipped {
        item: String,
        error: String,
    },
}

impl RunEvent {
    fn redact(&mut self) {
        match self {
            RunEvent::VerseGenerated { text, .. } => *text = redact_sensitive_data(text),
            RunEvent::RetryScheduled { error, .. }
            | RunEvent::RunFailed { error, .. }
            | RunEvent::AudioSkipped { error, .. } => *error = redact_sensitive_data(error),
            RunEvent::JudgmentReady { .. } => {}
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunEventEntry {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: RunEvent,
}

pub struct RunEventLogger;

impl RunEventLogger {
    /// Redacts and emits one event. Returns the entry that was logged.
    pub fn log_event(session_id: &str, mut event: RunEvent) -> RunEventEntry {
        event.redact();
        let entry = RunEventEntry {
            session_id: session_id.into(),
            timestamp: Utc::now(),
            event,
        };
        let json = serde_json::to_string(&entry).unwrap_or_else(|e| e.to_string());
        info!(target: "run_events", session_id = %entry.session_id, event = %json, "Run event");
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_redacted_before_logging() {
        let entry = RunEventLogger::log_event(
            "s-1",
            RunEvent::RunFailed {
                kind: "fatal_generation".into(),
                last_successful_turn: 2,
                error: "401 for key gsk_abcdefghijklmnopqrstuvwx".into(),
            },
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["event"]["type"], "run_failed");
        assert_eq!(json["event"]["last_successful_turn"], 2);
        assert!(!json["event"]["error"].as_str().unwrap().contains("gsk_"));
    }
}
