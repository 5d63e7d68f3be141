//! Verse turns followed by judging, as one call.

use poemforge_core::{DocumentChunk, Judgment, PoemError, Speaker};
use tracing::info;

use crate::assembly::{OutputRecord, RunMetadata, assemble};
use crate::judge::Judge;
use crate::session_state::Session;
use crate::turn_loop::{RunFailure, TurnOrchestrator, TurnState};

/// A finished run: every verse plus a validated judgment.
#[derive(Debug, Clone)]
pub struct CompletedRun {
    pub session: Session,
    pub judgment: Judgment,
}

impl CompletedRun {
    pub fn record<'a>(&'a self, metadata: &'a RunMetadata) -> OutputRecord<'a> {
        assemble(&self.session, &self.judgment, metadata)
    }
}

pub struct PoemPipeline {
    orchestrator: TurnOrchestrator,
    judge: Judge,
}

impl PoemPipeline {
    pub fn new(orchestrator: TurnOrchestrator, judge: Judge) -> Self {
        Self { orchestrator, judge }
    }

    pub fn poet_labels(&self) -> (&str, &str) {
        (
            self.orchestrator.poet(Speaker::ProviderA).label(),
            self.orchestrator.poet(Speaker::ProviderB).label(),
        )
    }

    /// Generate and judge. A judging failure is reported with the completed
    /// session attached and `failed_in` set to `Completed`.
    pub async fn run(&self, context: &str, verses: usize) -> Result<CompletedRun, RunFailure> {
        let session = self.orchestrator.run(context, verses).await?;
        let (label_a, label_b) = self.poet_labels();
        info!(judge = self.judge.label(), "Verses complete, judging");

        match self.judge.evaluate(&session, label_a, label_b).await {
            Ok(judgment) => Ok(CompletedRun { session, judgment }),
            Err(error) => Err(RunFailure::during(TurnState::Completed, session, error)),
        }
    }
}

/// Context for a run: the caller's text when given, else the first chunk.
pub fn derive_context(chunks: &[DocumentChunk], explicit: Option<&str>) -> Result<String, PoemError> {
    if let Some(text) = explicit.map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(text.to_string());
    }
    chunks
        .first()
        .map(|c| c.text.clone())
        .ok_or_else(|| PoemError::InvalidConfiguration("document produced no text to use as context".into()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::poet::Poet;
    use crate::retry::RetryPolicy;
    use crate::testing::{CountingRetriever, JUDGE_REPLY};
    use poemforge_core::{FailureKind, Winner};
    use poemforge_providers::MockProvider;

    fn pipeline(judge_reply: &str) -> PoemPipeline {
        let retriever = Arc::new(CountingRetriever::default());
        let a = Arc::new(MockProvider::new("gemini").with_response("a verse"));
        let b = Arc::new(MockProvider::new("groq").with_response("b verse"));
        let j = Arc::new(MockProvider::new("judge").with_response(judge_reply));
        PoemPipeline::new(
            TurnOrchestrator::new(Poet::new("Poet A", a, "a"), Poet::new("Poet B", b, "b"), retriever.clone())
                .with_retry_policy(RetryPolicy::immediate(1)),
            Judge::new(Poet::new("Judge", j, "j"), retriever).with_retry_policy(RetryPolicy::immediate(1)),
        )
    }

    #[tokio::test]
    async fn runs_verses_then_judgment() {
        let run = pipeline(JUDGE_REPLY).run("harbour", 6).await.unwrap();
        assert_eq!(run.session.turns().len(), 6);
        assert_eq!(run.judgment.winner(), Winner::B);

        let meta = RunMetadata::for_session(&run.session, "h.txt", false, "Poet A", "Poet B");
        let record = run.record(&meta);
        assert_eq!(record.poem_a.verses.len(), 3);
        assert_eq!(record.poem_b.agent, "Poet B");
    }

    #[tokio::test]
    async fn judging_failure_keeps_complete_session() {
        let failure = pipeline("unparseable").run("harbour", 2).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::MalformedJudgment);
        assert_eq!(failure.failed_in, TurnState::Completed);
        assert_eq!(failure.last_successful_turn, 2);
        assert!(failure.session.unwrap().is_complete());
    }

    #[tokio::test]
    async fn zero_verses_rejected_before_judging() {
        let failure = pipeline(JUDGE_REPLY).run("harbour", 0).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::InvalidConfiguration);
    }

    #[test]
    fn explicit_context_wins() {
        let chunks = vec![DocumentChunk { text: "first chunk".into(), metadata: serde_json::json!({}) }];
        assert_eq!(derive_context(&chunks, Some("  given ")).unwrap(), "given");
        assert_eq!(derive_context(&chunks, Some("   ")).unwrap(), "first chunk");
        assert_eq!(derive_context(&chunks, None).unwrap(), "first chunk");
    }

    #[test]
    fn no_chunks_no_context() {
        let err = derive_context(&[], None).unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidConfiguration);
    }
}
