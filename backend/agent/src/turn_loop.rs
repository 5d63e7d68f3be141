//! Alternating verse generation.
//!
//! The loop is an explicit state machine:
//!
//! ```text
//! Idle -> AwaitingFacts(1) -> AwaitingVerse(1) -> AwaitingFacts(2) -> ... -> AwaitingVerse(n) -> Completed
//!                        \________________ any failure ________________/-> Failed
//! ```
//!
//! Turns run strictly in sequence since each prompt carries every earlier verse.

use std::sync::Arc;
use std::time::Duration;

use poemforge_core::{FailureKind, GenerationError, PoemError, RetrievalError, Retriever, Speaker};
use poemforge_logging::{RunEvent, RunEventLogger};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::grounding::fetch_facts;
use crate::poet::Poet;
use crate::retry::RetryPolicy;
use crate::session_state::Session;
use crate::system_prompt::{verse_system_prompt, verse_user_prompt};

pub const DEFAULT_VERSE_FACTS_K: usize = 2;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingFacts(usize),
    AwaitingVerse(usize),
    Completed,
    Failed(FailureKind),
}

/// A run that stopped early. Turns appended before the failure are kept in
/// `session`, which is `None` only when the run was rejected before starting.
#[derive(Debug, Error)]
#[error("run failed in {failed_in:?} after {last_successful_turn} verse(s): {error}")]
pub struct RunFailure {
    pub kind: FailureKind,
    pub failed_in: TurnState,
    pub last_successful_turn: usize,
    pub session: Option<Session>,
    #[source]
    pub error: PoemError,
}

impl RunFailure {
    pub(crate) fn rejected(error: PoemError) -> Self {
        Self {
            kind: error.kind(),
            failed_in: TurnState::Idle,
            last_successful_turn: 0,
            session: None,
            error,
        }
    }

    pub(crate) fn during(failed_in: TurnState, session: Session, error: PoemError) -> Self {
        let kind = error.kind();
        RunEventLogger::log_event(
            &session.id().to_string(),
            RunEvent::RunFailed {
                kind: format!("{kind:?}"),
                last_successful_turn: session.last_successful_turn(),
                error: error.to_string(),
            },
        );
        Self {
            kind,
            failed_in,
            last_successful_turn: session.last_successful_turn(),
            session: Some(session),
            error,
        }
    }
}

/// The states the loop can actually be in while turns are pending.
#[derive(Debug, Clone, Copy)]
enum Step {
    Facts(usize),
    Verse(usize),
}

impl Step {
    fn state(self) -> TurnState {
        match self {
            Step::Facts(n) => TurnState::AwaitingFacts(n),
            Step::Verse(n) => TurnState::AwaitingVerse(n),
        }
    }
}

pub struct TurnOrchestrator {
    poet_a: Poet,
    poet_b: Poet,
    retriever: Arc<dyn Retriever>,
    facts_k: usize,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl TurnOrchestrator {
    pub fn new(poet_a: Poet, poet_b: Poet, retriever: Arc<dyn Retriever>) -> Self {
        Self {
            poet_a,
            poet_b,
            retriever,
            facts_k: DEFAULT_VERSE_FACTS_K,
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

    pub fn poet(&self, speaker: Speaker) -> &Poet {
        match speaker {
            Speaker::ProviderA => &self.poet_a,
            Speaker::ProviderB => &self.poet_b,
        }
    }

    /// Generate exactly `target_verse_count` verses over `context`.
    #[instrument(skip(self, context), fields(context_len = context.len()))]
    pub async fn run(&self, context: &str, target_verse_count: usize) -> Result<Session, RunFailure> {
        let mut session =
            Session::new(context, target_verse_count).map_err(RunFailure::rejected)?;
        info!(session_id = %session.id(), target = target_verse_count, "Starting verse turns");

        let mut step = Step::Facts(1);
        debug!(from = ?TurnState::Idle, to = ?step.state(), "Turn transition");
        let mut facts: Vec<String> = Vec::new();
        loop {
            let outcome = match step {
                Step::Facts(n) => self
                    .facts_for_turn(&mut session)
                    .await
                    .map(|f| {
                        facts = f;
                        Some(Step::Verse(n))
                    })
                    .map_err(PoemError::from),
                Step::Verse(n) => {
                    self.verse_turn(&mut session, n, &facts).await.map_err(PoemError::from)
                }
            };

            match outcome {
                Ok(Some(next)) => {
                    debug!(from = ?step.state(), to = ?next.state(), "Turn transition");
                    step = next;
                }
                Ok(None) => {
                    debug!(from = ?step.state(), to = ?TurnState::Completed, "Turn transition");
                    return Ok(session);
                }
                Err(error) => {
                    warn!(
                        from = ?step.state(),
                        to = ?TurnState::Failed(error.kind()),
                        error = %error,
                        "Turn transition"
                    );
                    return Err(RunFailure::during(step.state(), session, error));
                }
            }
        }
    }

    /// Facts for the next turn, served from the session cache when the same
    /// query was already issued.
    async fn facts_for_turn(
        &self,
        session: &mut Session,
    ) -> Result<Vec<String>, RetrievalError> {
        let query = session.retrieval_query();
        if let Some(cached) = session.cached_facts(&query) {
            debug!("Reusing cached facts");
            return Ok(cached.to_vec());
        }
        let facts = fetch_facts(self.retriever.as_ref(), &query, self.facts_k, self.call_timeout).await?;
        session.cache_facts(query, facts.clone());
        Ok(facts)
    }

    async fn verse_turn(
        &self,
        session: &mut Session,
        n: usize,
        facts: &[String],
    ) -> Result<Option<Step>, GenerationError> {
        let speaker = Speaker::for_turn(n);
        let poet = self.poet(speaker);
        let prior: Vec<&str> = session.turns().iter().map(|t| t.text()).collect();
        let system = verse_system_prompt(facts, &prior);
        let user = verse_user_prompt(session.context());

        let session_id = session.id().to_string();
        let text = poet
            .compose_retrying(
                &system,
                &user,
                self.call_timeout,
                &self.retry,
                &session_id,
                &format!("verse {n}"),
            )
            .await?;

        let text = session.push_turn(text).text().to_string();
        info!(turn = n, speaker = %speaker, poet = poet.label(), "Verse generated");
        RunEventLogger::log_event(
            &session_id,
            RunEvent::VerseGenerated {
                turn: n,
                speaker: speaker.label().to_string(),
                provider: poet.provider_name().to_string(),
                text,
            },
        );

        Ok((n < session.target_verse_count()).then_some(Step::Facts(n + 1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingRetriever, Sluggish};
    use poemforge_providers::MockProvider;

    fn orchestrator(
        a: Arc<MockProvider>,
        b: Arc<MockProvider>,
        retriever: Arc<CountingRetriever>,
    ) -> TurnOrchestrator {
        TurnOrchestrator::new(Poet::new("Poet A", a, "a"), Poet::new("Poet B", b, "b"), retriever)
            .with_retry_policy(RetryPolicy::immediate(3))
            .with_call_timeout(Duration::from_secs(5))
    }

    fn numbered_script(prefix: &str, n: usize) -> Vec<Result<String, GenerationError>> {
        (1..=n).map(|i| Ok(format!("{prefix} verse {i}"))).collect()
    }

    #[tokio::test]
    async fn produces_n_alternating_turns() {
        for n in 1..=7 {
            let a = Arc::new(MockProvider::new("a").with_script(numbered_script("A", 4)));
            let b = Arc::new(MockProvider::new("b").with_script(numbered_script("B", 3)));
            let session = orchestrator(a, b, Arc::new(CountingRetriever::default()))
                .run("the sea", n)
                .await
                .unwrap();

            assert_eq!(session.turns().len(), n);
            for (i, turn) in session.turns().iter().enumerate() {
                assert_eq!(turn.index(), i + 1);
                assert_eq!(turn.speaker(), Speaker::for_turn(i + 1));
            }
            assert!(session.is_complete());
        }
    }

    #[tokio::test]
    async fn odd_count_gives_a_one_more_verse() {
        let a = Arc::new(MockProvider::new("a").with_response("a line"));
        let b = Arc::new(MockProvider::new("b").with_response("b line"));
        let session = orchestrator(a.clone(), b.clone(), Arc::new(CountingRetriever::default()))
            .run("ctx", 7)
            .await
            .unwrap();
        assert_eq!(session.verses_by(Speaker::ProviderA).count(), 4);
        assert_eq!(session.verses_by(Speaker::ProviderB).count(), 3);
        assert_eq!((a.calls(), b.calls()), (4, 3));
    }

    #[tokio::test]
    async fn zero_verses_is_invalid_configuration() {
        let a = Arc::new(MockProvider::new("a"));
        let b = Arc::new(MockProvider::new("b"));
        let retriever = Arc::new(CountingRetriever::default());
        let failure = orchestrator(a.clone(), b, retriever.clone()).run("ctx", 0).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::InvalidConfiguration);
        assert!(failure.session.is_none());
        assert_eq!(failure.last_successful_turn, 0);
        assert_eq!((a.calls(), retriever.calls()), (0, 0));
    }

    #[tokio::test]
    async fn identical_queries_hit_the_cache() {
        // Same verse every turn: queries are ctx, ctx+v, ctx+v+v, then repeats
        let a = Arc::new(MockProvider::new("a").with_response("same"));
        let b = Arc::new(MockProvider::new("b").with_response("same"));
        let retriever = Arc::new(CountingRetriever::default());
        let session = orchestrator(a, b, retriever.clone()).run("ctx", 6).await.unwrap();
        assert_eq!(retriever.calls(), 3);
        assert_eq!(session.cached_queries(), 3);
        assert!(retriever.queries().iter().all(|(_, k)| *k == DEFAULT_VERSE_FACTS_K));
    }

    #[tokio::test]
    async fn each_prompt_carries_all_prior_verses() {
        let a = Arc::new(MockProvider::new("a").with_script(numbered_script("A", 2)));
        let b = Arc::new(MockProvider::new("b").with_script(numbered_script("B", 2)));
        orchestrator(a.clone(), b.clone(), Arc::new(CountingRetriever::default()))
            .run("ctx", 4)
            .await
            .unwrap();
        let last_a = &a.requests()[1].system_prompt;
        assert!(last_a.contains("Line 1: A verse 1\nLine 2: B verse 1"));
        let last_b = &b.requests()[1].system_prompt;
        assert!(last_b.contains("Line 3: A verse 2"));
        assert_eq!(b.requests()[0].user_prompt, "Create the next poetic line based on: ctx");
    }

    #[tokio::test]
    async fn transient_failure_on_turn_three_is_invisible_after_retry() {
        let clean = orchestrator(
            Arc::new(MockProvider::new("a").with_script(numbered_script("A", 3))),
            Arc::new(MockProvider::new("b").with_script(numbered_script("B", 3))),
            Arc::new(CountingRetriever::default()),
        )
        .run("ctx", 6)
        .await
        .unwrap();

        let mut script_a = numbered_script("A", 3);
        script_a.insert(1, Err(GenerationError::transient("a", "HTTP 429")));
        let flaky_a = Arc::new(MockProvider::new("a").with_script(script_a));
        let retried = orchestrator(
            flaky_a.clone(),
            Arc::new(MockProvider::new("b").with_script(numbered_script("B", 3))),
            Arc::new(CountingRetriever::default()),
        )
        .run("ctx", 6)
        .await
        .unwrap();

        assert_eq!(retried.turns(), clean.turns());
        assert_eq!(flaky_a.calls(), 4);
    }

    #[tokio::test]
    async fn fatal_failure_is_not_retried_and_keeps_partial_session() {
        let a = Arc::new(MockProvider::new("a").with_script(vec![
            Ok("A verse 1".into()),
            Err(GenerationError::fatal("a", "HTTP 401")),
        ]));
        let b = Arc::new(MockProvider::new("b").with_response("B verse"));
        let failure = orchestrator(a.clone(), b, Arc::new(CountingRetriever::default()))
            .run("ctx", 6)
            .await
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::FatalGeneration);
        assert_eq!(failure.failed_in, TurnState::AwaitingVerse(3));
        assert_eq!(failure.last_successful_turn, 2);
        assert_eq!(a.calls(), 2);
        let partial = failure.session.unwrap();
        assert_eq!(partial.turns().len(), 2);
        assert!(!partial.is_complete());
    }

    #[tokio::test]
    async fn transient_failures_surface_after_bound() {
        let errors = (0..4).map(|_| Err(GenerationError::transient("a", "HTTP 503"))).collect();
        let a = Arc::new(MockProvider::new("a").with_script(errors));
        let b = Arc::new(MockProvider::new("b"));
        let failure = orchestrator(a.clone(), b, Arc::new(CountingRetriever::default()))
            .run("ctx", 2)
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::TransientGeneration);
        assert_eq!(failure.last_successful_turn, 0);
        assert_eq!(a.calls(), 4);
    }

    #[tokio::test]
    async fn retrieval_is_retried_once() {
        let a = Arc::new(MockProvider::new("a").with_response("v"));
        let b = Arc::new(MockProvider::new("b").with_response("w"));
        let flaky = Arc::new(CountingRetriever::failing_first(1));
        let session = orchestrator(a.clone(), b.clone(), flaky.clone()).run("ctx", 1).await.unwrap();
        assert_eq!(session.turns().len(), 1);
        assert_eq!(flaky.calls(), 2);

        let broken = Arc::new(CountingRetriever::failing_first(2));
        let failure = orchestrator(a, b, broken.clone()).run("ctx", 1).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Retrieval);
        assert_eq!(failure.failed_in, TurnState::AwaitingFacts(1));
        assert_eq!(broken.calls(), 2);
    }

    #[tokio::test]
    async fn slow_retrieval_times_out_after_one_retry() {
        let a = Arc::new(MockProvider::new("a").with_response("v"));
        let b = Arc::new(MockProvider::new("b").with_response("w"));
        let slow = Arc::new(Sluggish::new(Duration::from_secs(5)));
        let failure = TurnOrchestrator::new(Poet::new("Poet A", a.clone(), "a"), Poet::new("Poet B", b, "b"), slow.clone())
            .with_retry_policy(RetryPolicy::immediate(3))
            .with_call_timeout(Duration::from_millis(100))
            .run("ctx", 2)
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::Retrieval);
        assert_eq!(failure.failed_in, TurnState::AwaitingFacts(1));
        assert!(failure.error.to_string().contains("timed out"));
        assert_eq!(slow.calls(), 2);
        assert_eq!(a.calls(), 0);
    }
}
