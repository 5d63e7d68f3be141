//! Test doubles shared by the orchestrator and judge tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use poemforge_core::{GenerationError, LlmProvider, LlmRequest, LlmResponse, RetrievalError, Retriever};

/// Echoes the query as a single fact and records every call. The first
/// `failures` calls fail.
#[derive(Default)]
pub(crate) struct CountingRetriever {
    failures: AtomicUsize,
    queries: Mutex<Vec<(String, usize)>>,
}

impl CountingRetriever {
    pub(crate) fn failing_first(failures: usize) -> Self {
        Self { failures: AtomicUsize::new(failures), ..Default::default() }
    }

    pub(crate) fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub(crate) fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for CountingRetriever {
    async fn query(&self, text: &str, k: usize) -> Result<Vec<String>, RetrievalError> {
        self.queries.lock().unwrap().push((text.to_string(), k));
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(RetrievalError("index unavailable".into()));
        }
        Ok(vec![format!("fact about {}", text.lines().next().unwrap_or(""))])
    }
}

/// Sleeps `delay` before answering, counting calls.
pub(crate) struct Sluggish {
    delay: Duration,
    calls: AtomicUsize,
}

impl Sluggish {
    pub(crate) fn new(delay: Duration) -> Self {
        Self { delay, calls: AtomicUsize::new(0) }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for Sluggish {
    fn name(&self) -> &str {
        "sluggish"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(LlmResponse {
            content: "too late".into(),
            provider: "sluggish".into(),
            model: request.model.clone(),
            tokens_used: 0,
            latency_ms: self.delay.as_millis() as u64,
        })
    }
}

#[async_trait]
impl Retriever for Sluggish {
    async fn query(&self, _text: &str, _k: usize) -> Result<Vec<String>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(vec!["too late".into()])
    }
}

/// A well-formed judge reply: A totals 80, B totals 82.
pub(crate) const JUDGE_REPLY: &str = "\
**POEM A SCORES:**
Factual Accuracy: 25/30
Literary Quality: 20/25
Coherence: 15/20
Creativity: 12/15
Rhythm & Sound: 8/10
TOTAL: 80/100

**POEM B SCORES:**
Factual Accuracy: 28/30
Literary Quality: 18/25
Coherence: 17/20
Creativity: 10/15
Rhythm & Sound: 9/10
TOTAL: 82/100

**WINNER:** Poem B

**JUSTIFICATION:**
Poem B stays closer to the source.
Its imagery is restrained.

**STRENGTHS OF WINNER:**
- Accurate detail
- Steady meter

**AREAS FOR IMPROVEMENT:**
- Bolder metaphors
";

/// A complete session whose verses are `verses`, in turn order.
pub(crate) fn session_with(context: &str, verses: &[&str]) -> crate::session_state::Session {
    let mut session = crate::session_state::Session::new(context, verses.len()).unwrap();
    for verse in verses {
        session.push_turn(verse.to_string());
    }
    session
}
