//! A model seat: one provider plus the sampling settings used for a role.

use std::sync::Arc;
use std::time::Duration;

use poemforge_core::{GenerationError, LlmProvider, LlmRequest};
use poemforge_logging::{RunEvent, RunEventLogger};
use tracing::{debug, warn};

use crate::retry::RetryPolicy;

#[derive(Clone)]
pub struct Poet {
    label: String,
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl Poet {
    pub fn new(label: impl Into<String>, provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            provider,
            model: model.into(),
            temperature: 0.8,
            max_tokens: 2048,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Display name used in prompts and output files.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// One completion under `timeout`. Blank replies count as transient
    /// failures; the text is trimmed.
    pub async fn compose(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        timeout: Duration,
    ) -> Result<String, GenerationError> {
        let request = LlmRequest {
            model: self.model.clone(),
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = tokio::time::timeout(timeout, self.provider.complete(&request))
            .await
            .map_err(|_| {
                GenerationError::transient(
                    self.provider.name(),
                    format!("no reply within {}s", timeout.as_secs_f32()),
                )
            })??;

        debug!(
            poet = %self.label,
            model = %response.model,
            tokens = response.tokens_used,
            latency_ms = response.latency_ms,
            "Completion received"
        );

        let text = response.content.trim();
        if text.is_empty() {
            return Err(GenerationError::transient(self.provider.name(), "empty completion"));
        }
        Ok(text.to_string())
    }
}

impl Poet {
    /// `compose`, retrying transient failures under `policy`. Each retry is
    /// logged as a run event tagged with `operation`.
    pub(crate) async fn compose_retrying(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        timeout: Duration,
        policy: &RetryPolicy,
        session_id: &str,
        operation: &str,
    ) -> Result<String, GenerationError> {
        let mut retries = 0;
        loop {
            match self.compose(system_prompt, user_prompt, timeout).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && policy.should_retry(retries) => {
                    retries += 1;
                    let delay = policy.delay_for(retries);
                    let delay_ms = delay.as_millis() as u64;
                    warn!(operation, attempt = retries, delay_ms, error = %e, "Retrying completion");
                    RunEventLogger::log_event(
                        session_id,
                        RunEvent::RetryScheduled {
                            operation: operation.to_string(),
                            attempt: retries,
                            delay_ms,
                            error: e.to_string(),
                        },
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl std::fmt::Debug for Poet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poet")
            .field("label", &self.label)
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Sluggish;
    use poemforge_providers::MockProvider;

    #[tokio::test]
    async fn reply_is_trimmed_and_settings_forwarded() {
        let mock = Arc::new(MockProvider::new("mock").with_response("  A heron waits.\n"));
        let poet = Poet::new("Heron", mock.clone(), "m-1").with_temperature(0.3).with_max_tokens(64);
        let text = poet.compose("sys", "user", Duration::from_secs(1)).await.unwrap();
        assert_eq!(text, "A heron waits.");
        let req = &mock.requests()[0];
        assert_eq!(req.model, "m-1");
        assert_eq!(req.max_tokens, 64);
        assert_eq!(req.system_prompt, "sys");
    }

    #[tokio::test]
    async fn blank_reply_is_transient() {
        let mock = Arc::new(MockProvider::new("mock").with_response("   "));
        let err = Poet::new("p", mock, "m")
            .compose("s", "u", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn slow_reply_times_out_as_transient_and_is_retried() {
        let slow = Arc::new(Sluggish::new(Duration::from_secs(5)));
        let poet = Poet::new("p", slow.clone(), "m");
        let err = poet.compose("s", "u", Duration::from_millis(100)).await.unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("no reply within"));

        let err = poet
            .compose_retrying("s", "u", Duration::from_millis(100), &RetryPolicy::immediate(2), "sid", "verse 1")
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(slow.calls(), 1 + 3);
    }

    #[tokio::test]
    async fn retrying_stops_at_fatal() {
        let mock = Arc::new(MockProvider::new("mock").with_script(vec![
            Err(GenerationError::transient("mock", "HTTP 500")),
            Err(GenerationError::fatal("mock", "HTTP 403")),
        ]));
        let err = Poet::new("p", mock.clone(), "m")
            .compose_retrying("s", "u", Duration::from_secs(1), &RetryPolicy::immediate(3), "sid", "verse 1")
            .await
            .unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(mock.calls(), 2);
    }
}
