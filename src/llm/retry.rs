//! Bounded exponential-backoff retry around a completion client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{CompletionOptions, LlmClient, LlmError, Message, TextStream};

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay unit. The wait before retry `n` (1-indexed) is `base_delay * 2^n`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait before the given retry (1 = first retry).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }

    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }
}

/// Retries transient failures of the wrapped client's `complete`.
///
/// Only one completion is ever retried, never a whole agent run. Streaming
/// requests pass through unchanged.
pub struct RetryingClient {
    inner: Arc<dyn LlmClient>,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn LlmClient>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl LlmClient for RetryingClient {
    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.inner.complete(messages, options).await {
                Ok(text) => return Ok(text),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        "Completion failed ({}, attempt {}/{}): {}. Retrying in {:.1}s",
                        err.kind(),
                        attempt,
                        max_attempts,
                        err,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_transient() {
                        tracing::error!(
                            "Completion failed after {} attempts: {}",
                            max_attempts,
                            err
                        );
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn stream(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<TextStream, LlmError> {
        self.inner.stream(messages, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedLlm;

    #[test]
    fn delays_double_from_first_retry() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let inner = Arc::new(ScriptedLlm::new(vec![
            Err(LlmError::RateLimited("429".into())),
            Err(LlmError::Timeout("slow".into())),
            Ok("done".into()),
        ]));
        let client = RetryingClient::new(inner.clone(), RetryPolicy::immediate(3));

        let reply = client
            .complete(&[Message::user("hi")], &CompletionOptions::default())
            .await
            .expect("third attempt succeeds");
        assert_eq!(reply, "done");
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test]
    async fn exhausted_attempts_return_last_error() {
        let inner = Arc::new(ScriptedLlm::new(vec![
            Err(LlmError::Timeout("one".into())),
            Err(LlmError::Timeout("two".into())),
            Err(LlmError::Api {
                status: 500,
                message: "three".into(),
            }),
            Ok("never reached".into()),
        ]));
        let client = RetryingClient::new(inner.clone(), RetryPolicy::immediate(3));

        let err = client
            .complete(&[Message::user("hi")], &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("three"));
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let inner = Arc::new(ScriptedLlm::new(vec![
            Err(LlmError::MissingApiKey),
            Ok("never reached".into()),
        ]));
        let client = RetryingClient::new(inner.clone(), RetryPolicy::immediate(3));

        let err = client
            .complete(&[Message::user("hi")], &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey));
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test]
    async fn backoff_sleeps_between_attempts() {
        let inner = Arc::new(ScriptedLlm::new(vec![
            Err(LlmError::RateLimited("429".into())),
            Ok("ok".into()),
        ]));
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
        };
        let client = RetryingClient::new(inner, policy);

        let started = std::time::Instant::now();
        client
            .complete(&[Message::user("hi")], &CompletionOptions::default())
            .await
            .expect("second attempt succeeds");
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
